//! BLE discovery backends.
//!
//! Each backend turns the radio stack's discovery events into owned
//! [`Advertisement`] records and forwards them, one per discovery, over a
//! channel. Classification happens on the receiving side.

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

use crate::advertisement::Advertisement;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Channel buffer size for discovered advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 256;

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    #[value(alias = "bluez")]
    Bluer,
    /// Raw HCI socket backend (direct kernel access, no daemon required)
    #[cfg(feature = "hci")]
    #[value(alias = "raw")]
    Hci,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        return Backend::Bluer;
        #[cfg(all(feature = "hci", not(feature = "bluer")))]
        return Backend::Hci;
        #[cfg(not(any(feature = "bluer", feature = "hci")))]
        compile_error!("At least one backend feature must be enabled");
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
            #[cfg(not(any(feature = "bluer", feature = "hci")))]
            _ => unreachable!("Backend enum has no variants when no backend features are enabled"),
        }
    }
}

/// Errors returned when validating [`ScanParameters`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanParametersError {
    #[error("scan {0} must be between 2.5ms and 10.24s")]
    OutOfRange(&'static str),
    #[error("scan window ({window:?}) must not exceed scan interval ({interval:?})")]
    WindowExceedsInterval { window: Duration, interval: Duration },
}

/// Radio scan timing.
///
/// The controller listens for `window` out of every `interval`. Only the HCI
/// backend applies these; BlueZ picks its own timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParameters {
    interval: Duration,
    window: Duration,
    active: bool,
}

/// Length of one HCI scan timing unit.
const HCI_TIME_UNIT_MICROS: u128 = 625;
/// Valid HCI range for interval and window, in 0.625 ms units.
const HCI_TIME_UNITS: std::ops::RangeInclusive<u128> = 0x0004..=0x4000;

impl ScanParameters {
    pub fn new(
        interval: Duration,
        window: Duration,
        active: bool,
    ) -> Result<Self, ScanParametersError> {
        if !HCI_TIME_UNITS.contains(&to_hci_units(interval)) {
            return Err(ScanParametersError::OutOfRange("interval"));
        }
        if !HCI_TIME_UNITS.contains(&to_hci_units(window)) {
            return Err(ScanParametersError::OutOfRange("window"));
        }
        if window > interval {
            return Err(ScanParametersError::WindowExceedsInterval { window, interval });
        }
        Ok(Self {
            interval,
            window,
            active,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether to request scan responses from advertisers.
    pub fn active(&self) -> bool {
        self.active
    }

    /// Interval in 0.625 ms units.
    pub fn interval_units(&self) -> u16 {
        // Range checked in `new`
        to_hci_units(self.interval) as u16
    }

    /// Window in 0.625 ms units.
    pub fn window_units(&self) -> u16 {
        to_hci_units(self.window) as u16
    }
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            window: Duration::from_millis(99),
            active: false,
        }
    }
}

fn to_hci_units(duration: Duration) -> u128 {
    duration.as_micros() / HCI_TIME_UNIT_MICROS
}

/// Start discovering advertisements using the specified backend.
///
/// # Arguments
/// * `backend` - The scanner backend to use
/// * `parameters` - Radio scan timing, applied where the backend supports it
///
/// # Returns
/// A receiver yielding one record per discovered advertisement.
pub async fn start_scan(
    backend: Backend,
    parameters: ScanParameters,
) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan(parameters).await,
        #[cfg(feature = "hci")]
        Backend::Hci => hci::start_scan(parameters).await,
    }
}
