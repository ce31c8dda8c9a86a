use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::path::PathBuf;

use serde::Deserialize;
use smart_default::SmartDefault;

make_log_macro!(debug, "config");

#[derive(Deserialize, Clone, Debug, SmartDefault)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct FadebrightConfig {
    /// Backlight control directory. Assumed pre-resolved to a single device;
    /// there is no discovery step.
    #[default(PathBuf::from(DEFAULT_DEVICE_PATH))]
    pub device_path: PathBuf,
}

impl FadebrightConfig {
    pub async fn new() -> Result<Self> {
        if let Some(config_path) = find_file("config", None, Some("toml")) {
            debug!("loading {}", config_path.display());
            deserialize_toml_file(config_path).await
        } else {
            debug!("no config file, using defaults");
            Ok(FadebrightConfig::default())
        }
    }
}
