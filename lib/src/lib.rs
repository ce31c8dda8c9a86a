#![warn(clippy::match_same_arms)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::unnecessary_wraps)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod util;
mod config;
mod consts;
mod device;
mod errors;
#[cfg(feature = "watch")]
mod watcher;

use std::path::Path;

#[cfg(feature = "watch")]
use futures::StreamExt as _;

pub use crate::config::FadebrightConfig;
pub use crate::device::Device;
pub use crate::errors::FadebrightError;
use crate::errors::*;
#[cfg(feature = "watch")]
pub use crate::watcher::BrightnessChanged;
#[cfg(feature = "watch")]
use crate::watcher::*;

make_log_macro!(debug, "fadebright");

/// Used to construct [`Fadebright`]
#[derive(Default)]
pub struct FadebrightBuilder<'a> {
    device_path: Option<&'a Path>,
    config: Option<FadebrightConfig>,
}

impl<'a> FadebrightBuilder<'a> {
    /// Create a new [`FadebrightBuilder`].
    pub fn new() -> Self {
        FadebrightBuilder::default()
    }

    /// Use the given backlight control directory instead of the configured
    /// one.
    pub fn with_device_path(mut self, device_path: &'a Path) -> Self {
        self.device_path = Some(device_path);
        self
    }

    /// Defaults to [`FadebrightConfig::new()`].
    pub fn with_config(mut self, config: FadebrightConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Returns the constructed [`Fadebright`] instance.
    pub async fn build(self) -> Result<Fadebright> {
        let config = match self.config {
            Some(config) => config,
            None => FadebrightConfig::new().await?,
        };

        let device_path = self.device_path.unwrap_or(&config.device_path);
        Fadebright::new(device_path).await
    }
}

/// A single backlight device plus, with the `watch` feature, a restartable
/// stream of de-duplicated brightness changes.
pub struct Fadebright {
    device: Device,
    #[cfg(feature = "watch")]
    inotify_watcher: INotifyWatcher,
    #[cfg(feature = "watch")]
    rx: Receiver<notify::Result<notify::Event>>,
    #[cfg(feature = "watch")]
    tracker: ChangeTracker,
}

impl Fadebright {
    pub(crate) async fn new(device_path: &Path) -> Result<Self> {
        if !Device::has_backlight(device_path) {
            return Err(FadebrightError::NoBacklight(
                device_path.display().to_string(),
            ));
        }
        let device = Device::new(device_path).await?;
        debug!(
            "{:?}: max_brightness {}",
            device.device_name.to_string_lossy(),
            device.max_brightness()
        );

        #[cfg(not(feature = "watch"))]
        {
            Ok(Fadebright { device })
        }

        #[cfg(feature = "watch")]
        {
            let (inotify_watcher, rx) = brightness_file_watcher()?;

            Ok(Fadebright {
                device,
                inotify_watcher,
                rx,
                tracker: ChangeTracker::new(),
            })
        }
    }

    /// Ramp the backlight to `percent`, recording `actor` as the requester.
    ///
    /// Runs until the device reaches the target or a newer call takes over.
    /// I/O errors abort the ramp mid-way and surface here; retrying the same
    /// request resumes from wherever the device currently sits.
    pub async fn set_brightness(&self, percent: f64, actor: Option<String>) -> Result<()> {
        self.device.set_brightness(percent, actor).await
    }

    /// Current brightness as a truncated percentage of the maximum.
    pub async fn get_current_brightness_percentage(&self) -> Result<u32> {
        self.device.current_percentage(None).await
    }

    #[cfg(feature = "watch")]
    #[cfg_attr(docsrs, doc(cfg(feature = "watch")))]
    /// Start observing the brightness file. The first value seen after a
    /// (re)start is always published.
    pub fn watch(&mut self) -> Result<()> {
        self.tracker.reset();
        self.inotify_watcher
            .watch(self.device.brightness_file(), RecursiveMode::NonRecursive)?;
        Ok(())
    }

    #[cfg(feature = "watch")]
    #[cfg_attr(docsrs, doc(cfg(feature = "watch")))]
    /// Stop observing. [`Fadebright::watch`] starts over cleanly afterwards.
    pub fn unwatch(&mut self) -> Result<()> {
        self.inotify_watcher.unwatch(self.device.brightness_file())?;
        Ok(())
    }

    #[cfg(feature = "watch")]
    #[cfg_attr(docsrs, doc(cfg(feature = "watch")))]
    /// Wait for the next distinct brightness value, whether one of our own
    /// ramp steps or an out-of-band change (e.g. physical brightness keys).
    ///
    /// Duplicate inotify events are suppressed, and a failed read simply
    /// skips that observation rather than ending the stream.
    pub async fn next_change(&mut self) -> Result<BrightnessChanged> {
        while let Some(res) = self.rx.next().await {
            let event = res?;
            debug!("{:?}", event);
            if !event.kind.is_modify() {
                continue;
            }
            let raw = match self.device.current_raw().await {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("skipping observation: {e}");
                    continue;
                }
            };
            if let Some(change) = self.tracker.observe(raw, &self.device) {
                return Ok(change);
            }
        }
        Err(FadebrightError::Other("Nothing to watch".into()))
    }
}
