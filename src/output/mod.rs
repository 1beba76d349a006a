//! Output formatters for sensor readings.
//!
//! This module provides a trait for formatting matched advertisements and
//! implementations for the supported formats: a human-readable console line
//! and InfluxDB line protocol for Telegraf's `execd` input.

pub mod console;
pub mod influxdb;

use crate::classifier::SensorMatch;
use crate::cycle::CycleSummary;

/// Trait for formatting readings into output lines.
pub trait OutputFormatter: Send + Sync {
    /// Format one matched advertisement.
    fn format(&self, sensor: &SensorMatch) -> String;

    /// Format the end-of-cycle summary.
    ///
    /// Formats whose consumers only expect readings return `None`.
    fn format_summary(&self, _summary: &CycleSummary) -> Option<String> {
        None
    }
}

/// Available output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per reading, plus a summary per scan cycle
    #[default]
    Console,
    /// InfluxDB line protocol
    Influxdb,
}

impl OutputFormat {
    /// Build the formatter for this format.
    pub fn formatter(self, influxdb_measurement: &str) -> Box<dyn OutputFormatter> {
        match self {
            OutputFormat::Console => Box::new(console::ConsoleFormatter),
            OutputFormat::Influxdb => Box::new(influxdb::InfluxDbFormatter::new(
                influxdb_measurement.to_string(),
            )),
        }
    }
}

/// Lowercase hex dump of `bytes` without separators.
pub fn hex_dump(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[]), "");
        assert_eq!(hex_dump(&[0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
    }

    #[test]
    fn test_console_formatter_reports_summary() {
        let formatter = OutputFormat::Console.formatter("unused");
        let summary = CycleSummary {
            discovered: 3,
            matched: 1,
        };
        assert_eq!(
            formatter.format_summary(&summary).as_deref(),
            Some("scan complete: discovered=3 matched=1")
        );
    }

    #[test]
    fn test_influxdb_formatter_omits_summary() {
        let formatter = OutputFormat::Influxdb.formatter("atc");
        assert_eq!(formatter.format_summary(&CycleSummary::default()), None);
    }
}
