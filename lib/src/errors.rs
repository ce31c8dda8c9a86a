use thiserror::Error;

/// Result type returned from functions that can have our `Error`s.
pub type Result<T, E = FadebrightError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FadebrightError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "watch")]
    #[error("{0}")]
    Notify(#[from] notify::Error),

    #[error("{0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("No backlight device at {0}")]
    NoBacklight(String),

    #[error("max_brightness must be a positive integer, got {0}")]
    InvalidMaxBrightness(u32),

    #[error("{0}")]
    Other(String),

    #[error("Unknown error")]
    Unknown,
}

pub(crate) trait ErrorContext<T> {
    fn error(self, message: &'static str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ErrorContext<T> for std::result::Result<T, E> {
    fn error(self, message: &'static str) -> Result<T> {
        self.map_err(|e| FadebrightError::Other(format!("{message}: {e}")))
    }
}
