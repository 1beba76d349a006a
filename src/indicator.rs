//! Scan status indication.
//!
//! The scheduler switches the indicator on when a scan cycle starts and off
//! when it ends. Failures are logged and never interrupt scanning.

use log::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Something that can show whether a scan cycle is in progress.
pub trait StatusIndicator: Send {
    fn set_scanning(&mut self, scanning: bool);
}

/// Indicator that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set_scanning(&mut self, _scanning: bool) {}
}

/// Base directory of the Linux LED class.
const SYSFS_LEDS: &str = "/sys/class/leds";

/// An LED exposed by the kernel under `/sys/class/leds/<name>`.
#[derive(Debug, Clone)]
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    /// LED by its sysfs name, e.g. `led0` or `ACT`.
    pub fn new(name: &str) -> Self {
        Self::with_brightness_path(Path::new(SYSFS_LEDS).join(name).join("brightness"))
    }

    /// LED controlled through an explicit `brightness` file.
    pub fn with_brightness_path(brightness: impl Into<PathBuf>) -> Self {
        Self {
            brightness: brightness.into(),
        }
    }

    fn write(&self, scanning: bool) -> io::Result<()> {
        fs::write(&self.brightness, if scanning { "1" } else { "0" })
    }
}

impl StatusIndicator for SysfsLed {
    fn set_scanning(&mut self, scanning: bool) {
        if let Err(e) = self.write(scanning) {
            warn!(
                "Failed to set status LED {}: {}",
                self.brightness.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysfs_path_from_name() {
        let led = SysfsLed::new("led0");
        assert_eq!(
            led.brightness,
            PathBuf::from("/sys/class/leds/led0/brightness")
        );
    }

    #[test]
    fn test_sysfs_led_writes_brightness() {
        let path = std::env::temp_dir().join(format!(
            "atc-listener-led-{}-brightness",
            std::process::id()
        ));
        let mut led = SysfsLed::with_brightness_path(&path);

        led.set_scanning(true);
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
        led.set_scanning(false);
        assert_eq!(fs::read_to_string(&path).unwrap(), "0");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_sysfs_led_failure_is_not_fatal() {
        let mut led = SysfsLed::with_brightness_path("/nonexistent/atc-listener/brightness");
        led.set_scanning(true);
        led.set_scanning(false);
    }
}
