//! `atc-listener` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup and
//! process exit codes. Advertisement classification and payload decoding live in
//! [`crate::classifier`] and [`crate::decoder`]; the scan scheduler that drives
//! them lives in [`crate::app`] where it can be tested deterministically with an
//! injected scanner and injected output streams.

pub mod advertisement;
pub mod app;
pub mod classifier;
pub mod cycle;
pub mod decoder;
pub mod duration;
pub mod indicator;
pub mod mac_address;
pub mod output;
pub mod reading;
pub mod scanner;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use advertisement::Advertisement;
pub use classifier::{Classification, Classifier, NameFilter, Rejection, SensorMatch};
pub use cycle::CycleSummary;
pub use decoder::{MIN_PAYLOAD_LEN, PayloadError, ServicePayload, decode};
pub use mac_address::MacAddress;
pub use output::console::ConsoleFormatter;
pub use output::influxdb::InfluxDbFormatter;
pub use output::{OutputFormat, OutputFormatter};
pub use reading::{SensorReading, TemperatureUnit};
pub use scanner::{Backend, ScanError, ScanParameters};
