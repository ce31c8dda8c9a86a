use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

make_log_macro!(debug, "device");

/// The most recent explicit brightness request, kept for attributing observed
/// changes back to whoever asked for them.
#[derive(Default)]
struct Request {
    target_raw: u32,
    actor: Option<String>,
}

/// State shared between in-flight ramps and the change watcher.
///
/// `generation` is the cancellation mechanism: every `set_brightness` call
/// claims a new generation before ramping, and a ramp loop gives up as soon
/// as its own generation is no longer current. Last writer wins; there is no
/// queue and no standalone cancel.
pub(crate) struct RampState {
    generation: AtomicU64,
    request: Mutex<Request>,
}

impl RampState {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            request: Mutex::new(Request::default()),
        }
    }

    /// Record the `(target, actor)` pair and claim a new generation,
    /// cancelling any ramp still running under an older one.
    pub(crate) fn begin(&self, target_raw: u32, actor: Option<String>) -> u64 {
        {
            let mut request = self.request.lock().unwrap();
            request.target_raw = target_raw;
            request.actor = actor;
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Actor to credit for an observed raw value. Once the observed value
    /// reaches the requested target the actor is cleared, so any later
    /// out-of-band change (keyboard buttons) reports as unattributed.
    pub(crate) fn attribute(&self, raw: u32) -> Option<String> {
        let mut request = self.request.lock().unwrap();
        let actor = request.actor.clone();
        if raw == request.target_raw {
            request.actor = None;
        }
        actor
    }
}

/// A single backlight device that can be ramped to a target brightness.
#[derive(Clone)]
pub struct Device {
    pub device_name: OsString,
    brightness_file: PathBuf,
    max_brightness: u32,
    ramp: Arc<RampState>,
}

impl Device {
    /// Whether `device_path` looks like a usable backlight control directory.
    /// Every other operation assumes this holds.
    pub fn has_backlight(device_path: &Path) -> bool {
        device_path.join(FILE_MAX_BRIGHTNESS).exists()
    }

    pub async fn new(device_path: &Path) -> Result<Self> {
        let max_brightness: u32 = read_file(device_path.join(FILE_MAX_BRIGHTNESS))
            .await
            .map_err(|_| FadebrightError::NoBacklight(device_path.display().to_string()))?
            .parse()?;
        if max_brightness == 0 {
            return Err(FadebrightError::InvalidMaxBrightness(max_brightness));
        }

        Ok(Self {
            device_name: device_path
                .file_name()
                .map(Into::into)
                .unwrap_or_else(|| device_path.as_os_str().into()),
            brightness_file: device_path.join(FILE_BRIGHTNESS),
            max_brightness,
            ramp: Arc::new(RampState::new()),
        })
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    pub(crate) fn brightness_file(&self) -> &Path {
        &self.brightness_file
    }

    pub(crate) fn ramp(&self) -> &RampState {
        &self.ramp
    }

    /// Clamp a requested percentage into `[1, 100]`. Out-of-range values are
    /// absorbed rather than rejected; repeated-press callers overshoot on
    /// purpose. Non-finite input is a caller bug.
    pub fn validate_and_sanitize(value: f64) -> f64 {
        assert!(value.is_finite(), "brightness must be a finite number");
        value.clamp(BRIGHTNESS_MIN_PERCENT, BRIGHTNESS_MAX_PERCENT)
    }

    pub fn percent_to_raw(&self, percent: f64) -> u32 {
        let validated = Self::validate_and_sanitize(percent);
        ((validated / 100.0) * self.max_brightness as f64) as u32
    }

    pub(crate) fn percentage_from_raw(&self, raw: u32) -> u32 {
        ((raw as f64 / self.max_brightness as f64) * 100.0) as u32
    }

    /// Live raw value from the brightness file. Opened per call so a device
    /// that goes away between steps surfaces as a transient error, never a
    /// stale cache.
    pub async fn current_raw(&self) -> Result<u32> {
        Ok(read_file(&self.brightness_file).await?.parse()?)
    }

    /// Current brightness as a truncated percentage. A positive `raw_hint`
    /// skips the device read when the caller already holds a fresh value.
    pub async fn current_percentage(&self, raw_hint: Option<u32>) -> Result<u32> {
        match raw_hint {
            Some(raw) if raw > 0 => Ok(self.percentage_from_raw(raw)),
            _ => Ok(self.percentage_from_raw(self.current_raw().await?)),
        }
    }

    /// Single write of a raw value. No retry; a failed write aborts whatever
    /// ramp issued it.
    async fn write_raw(&self, value: u32) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.brightness_file)
            .await
            .error("Could not open brightness file to write")?;
        file.write_all(value.to_string().as_bytes())
            .await
            .error("Could not write sysfs brightness")
    }

    /// Ramp the device to `percent`, stepping [`BRIGHTNESS_STEP`] raw units
    /// every [`STEP_PAUSE`] so the transition reads as gradual.
    ///
    /// A newer call supersedes an in-flight one: the older loop aborts at its
    /// next step and leaves the device wherever its last completed write put
    /// it. A call that is not superseded always ends with the device at
    /// exactly the requested target, closing any step-rounding gap with a
    /// final corrective write.
    pub async fn set_brightness(&self, percent: f64, actor: Option<String>) -> Result<()> {
        let target = self.percent_to_raw(percent);
        let generation = self.ramp.begin(target, actor);

        let mut brightness = self.current_raw().await?;
        debug!(
            "{:?}: ramping {brightness} -> {target}",
            self.device_name.to_string_lossy()
        );

        let delta = target as i64 - brightness as i64;
        let direction: i64 = if delta < 0 { -1 } else { 1 };
        let full_steps = delta.unsigned_abs() / BRIGHTNESS_STEP as u64;
        let remainder = delta.unsigned_abs() % BRIGHTNESS_STEP as u64;

        for _ in 0..full_steps {
            if !self.ramp.is_current(generation) {
                debug!("ramp to {target} superseded");
                return Ok(());
            }
            brightness = (brightness as i64 + direction * BRIGHTNESS_STEP as i64) as u32;
            self.write_raw(brightness).await?;
            sleep(STEP_PAUSE).await;
        }

        if self.ramp.is_current(generation) {
            brightness = (brightness as i64 + direction * remainder as i64) as u32;
            self.write_raw(brightness).await?;

            // Ensure brightness is correct at the end
            if brightness != target {
                self.write_raw(target).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tempfile::TempDir;

    async fn fake_backlight(max: u32, current: u32) -> (TempDir, Device) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(FILE_MAX_BRIGHTNESS), max.to_string()).unwrap();
        std::fs::write(dir.path().join(FILE_BRIGHTNESS), current.to_string()).unwrap();
        let device = Device::new(dir.path()).await.unwrap();
        (dir, device)
    }

    fn raw_on_disk(dir: &TempDir) -> u32 {
        std::fs::read_to_string(dir.path().join(FILE_BRIGHTNESS))
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    #[test]
    fn sanitize_clamps_out_of_range() {
        assert_eq!(Device::validate_and_sanitize(0.5), 1.0);
        assert_eq!(Device::validate_and_sanitize(-20.0), 1.0);
        assert_eq!(Device::validate_and_sanitize(150.0), 100.0);
        assert_eq!(Device::validate_and_sanitize(42.0), 42.0);
    }

    #[test]
    #[should_panic(expected = "finite")]
    fn sanitize_rejects_nan() {
        Device::validate_and_sanitize(f64::NAN);
    }

    #[tokio::test]
    async fn percent_to_raw_stays_in_bounds_and_is_monotonic() {
        let (_dir, device) = fake_backlight(4882, 0).await;
        assert_eq!(device.percent_to_raw(50.0), 2441);
        let mut previous = 0;
        for percent in 1..=100 {
            let raw = device.percent_to_raw(percent as f64);
            assert!(raw <= device.max_brightness());
            assert!(raw >= previous);
            previous = raw;
        }
    }

    #[tokio::test]
    async fn percentage_from_hint_skips_device_read() {
        let (dir, device) = fake_backlight(4882, 100).await;
        // A hint must win even when the file disagrees.
        std::fs::remove_file(dir.path().join(FILE_BRIGHTNESS)).unwrap();
        assert_eq!(device.current_percentage(Some(2441)).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn percentage_without_hint_reads_device() {
        let (_dir, device) = fake_backlight(4882, 2441).await;
        assert_eq!(device.current_percentage(None).await.unwrap(), 50);
        assert_eq!(device.current_percentage(Some(0)).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn missing_max_brightness_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(FILE_BRIGHTNESS), "10").unwrap();
        assert!(!Device::has_backlight(dir.path()));
        assert!(matches!(
            Device::new(dir.path()).await,
            Err(FadebrightError::NoBacklight(_))
        ));
    }

    #[tokio::test]
    async fn zero_max_brightness_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(FILE_MAX_BRIGHTNESS), "0").unwrap();
        std::fs::write(dir.path().join(FILE_BRIGHTNESS), "0").unwrap();
        assert!(matches!(
            Device::new(dir.path()).await,
            Err(FadebrightError::InvalidMaxBrightness(0))
        ));
    }

    #[tokio::test]
    async fn ramp_converges_exactly_and_is_idempotent() {
        let (dir, device) = fake_backlight(4882, 0).await;
        device.set_brightness(3.0, None).await.unwrap();
        // 3% of 4882 truncates to 146: five full steps plus a remainder.
        assert_eq!(raw_on_disk(&dir), 146);
        device.set_brightness(3.0, None).await.unwrap();
        assert_eq!(raw_on_disk(&dir), 146);
    }

    #[tokio::test]
    async fn ramp_converges_downward() {
        let (dir, device) = fake_backlight(200, 180).await;
        device.set_brightness(10.0, None).await.unwrap();
        assert_eq!(raw_on_disk(&dir), 20);
    }

    #[tokio::test]
    async fn within_one_step_goes_straight_to_target() {
        let (dir, device) = fake_backlight(200, 18).await;
        device.set_brightness(10.0, None).await.unwrap();
        assert_eq!(raw_on_disk(&dir), 20);
    }

    #[tokio::test]
    async fn newer_request_wins_over_in_flight_ramp() {
        let (dir, device) = fake_backlight(10000, 0).await;
        let device = std::sync::Arc::new(device);

        let slow = {
            let device = Arc::clone(&device);
            tokio::spawn(async move { device.set_brightness(100.0, None).await })
        };
        // Mid-way between the slow ramp's 20ms steps.
        tokio::time::sleep(Duration::from_millis(50)).await;
        device.set_brightness(10.0, None).await.unwrap();
        slow.await.unwrap().unwrap();

        assert_eq!(raw_on_disk(&dir), device.percent_to_raw(10.0));
    }

    #[tokio::test]
    async fn io_failure_aborts_the_ramp() {
        let (dir, device) = fake_backlight(4882, 0).await;
        // Device went away between construction and the request.
        std::fs::remove_file(dir.path().join(FILE_BRIGHTNESS)).unwrap();
        assert!(device.set_brightness(50.0, None).await.is_err());
    }

    #[tokio::test]
    async fn attribution_clears_once_target_is_reached() {
        let (_dir, device) = fake_backlight(200, 0).await;
        let ramp = device.ramp();
        ramp.begin(100, Some("alice".into()));
        assert_eq!(ramp.attribute(50), Some("alice".into()));
        assert_eq!(ramp.attribute(100), Some("alice".into()));
        // Target was reached above, later changes are nobody's doing.
        assert_eq!(ramp.attribute(120), None);
    }
}
