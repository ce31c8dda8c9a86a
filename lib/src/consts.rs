use std::time::Duration;

/// Backlight control directory used when the config does not name one.
pub const DEFAULT_DEVICE_PATH: &str = "/sys/class/backlight/intel_backlight";

/// Filename for device's max brightness
pub const FILE_MAX_BRIGHTNESS: &str = "max_brightness";

/// Filename for the current (and requested) brightness level
pub const FILE_BRIGHTNESS: &str = "brightness";

/// Raw units written per ramp step.
pub const BRIGHTNESS_STEP: u32 = 25;

/// Pause between ramp steps, bounds the device-write rate.
pub const STEP_PAUSE: Duration = Duration::from_millis(20);

/// Requested percentages are clamped to this range rather than rejected;
/// repeated-press callers routinely overshoot.
pub const BRIGHTNESS_MIN_PERCENT: f64 = 1.0;
pub const BRIGHTNESS_MAX_PERCENT: f64 = 100.0;

/// Initial `last_published` marker, distinct from any valid raw value so the
/// first observed value always publishes.
pub const NO_VALUE_PUBLISHED: i64 = -1;
