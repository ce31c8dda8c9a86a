pub(crate) use futures::channel::mpsc::Receiver;
use futures::{SinkExt, channel::mpsc::channel};
use notify::{Config, Event, Result};
pub(crate) use notify::{INotifyWatcher, RecursiveMode, Watcher};

use crate::consts::NO_VALUE_PUBLISHED;
use crate::device::Device;

/// Published when the device's raw value changes to something new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrightnessChanged {
    /// Truncated percentage of the maximum brightness.
    pub percentage: u32,
    /// Whoever asked for this level, if anyone did. External changes (e.g.
    /// physical brightness keys) come through as `None`.
    pub requesting_actor: Option<String>,
}

/// Set up the inotify plumbing for the brightness file. Nothing is watched
/// yet; the caller starts and stops the watch over its own lifecycle.
pub(crate) fn brightness_file_watcher() -> Result<(INotifyWatcher, Receiver<Result<Event>>)> {
    let (mut tx, rx) = channel(1);

    let config = Config::default().with_compare_contents(true); // crucial part for pseudo filesystems

    let inotify_watcher = INotifyWatcher::new(
        move |res: notify::Result<Event>| {
            futures::executor::block_on(async {
                tx.send(res).await.unwrap();
            });
        },
        config,
    )?;

    Ok((inotify_watcher, rx))
}

/// Turns the stream of observed raw values into at most one notification per
/// distinct value.
///
/// Inotify can fire several times for one logical write, and events may
/// arrive out of order with respect to our own ramp steps, so suppression
/// compares only against the last published value, never a sequence number.
pub(crate) struct ChangeTracker {
    last_published: i64,
}

impl ChangeTracker {
    pub(crate) fn new() -> Self {
        Self {
            last_published: NO_VALUE_PUBLISHED,
        }
    }

    /// Forget the last published value. A restarted watch publishes whatever
    /// it sees first.
    pub(crate) fn reset(&mut self) {
        self.last_published = NO_VALUE_PUBLISHED;
    }

    pub(crate) fn observe(&mut self, raw: u32, device: &Device) -> Option<BrightnessChanged> {
        if i64::from(raw) == self.last_published {
            return None;
        }

        let change = BrightnessChanged {
            percentage: device.percentage_from_raw(raw),
            requesting_actor: device.ramp().attribute(raw),
        };
        self.last_published = i64::from(raw);
        Some(change)
    }
}
