//! Advertisement classification.
//!
//! Decides whether a broadcast record comes from a sensor we care about and,
//! if so, decodes its first service data payload. Records that don't qualify
//! are a normal outcome and are reported as a [`Rejection`], never as an error.

use crate::advertisement::Advertisement;
use crate::decoder::{self, PayloadError, ServicePayload};
use crate::mac_address::MacAddress;
use crate::reading::{SensorReading, TemperatureUnit};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use thiserror::Error;

/// Default name filter: the custom firmware advertises as `ATC_XXXXXX`.
pub const DEFAULT_NAME_FILTER: &str = "ATC_";

/// Errors returned when building a [`NameFilter`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameFilterError {
    #[error("name filter must not be empty")]
    Empty,
}

/// Substring that an advertised name must contain to be considered.
///
/// The match is a containment test, not a prefix test: `"XATC_1234"`
/// matches the filter `"ATC_"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter(String);

impl NameFilter {
    pub fn new(pattern: impl Into<String>) -> Result<Self, NameFilterError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(NameFilterError::Empty);
        }
        Ok(Self(pattern))
    }

    pub fn matches(&self, name: &str) -> bool {
        name.contains(self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self(DEFAULT_NAME_FILTER.to_string())
    }
}

impl FromStr for NameFilter {
    type Err = NameFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A record that passed classification, together with its decoded reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorMatch {
    pub address: MacAddress,
    pub name: String,
    /// Copy of the service data payload the reading was decoded from
    pub raw: Vec<u8>,
    pub reading: SensorReading,
    pub received_at: SystemTime,
}

/// Why a record was not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingName,
    MissingServiceData,
    NameMismatch(String),
    PayloadTooShort { name: String, len: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingName => write!(f, "no advertised name"),
            Rejection::MissingServiceData => write!(f, "no service data"),
            Rejection::NameMismatch(name) => write!(f, "name '{name}' does not match filter"),
            Rejection::PayloadTooShort { name, len } => {
                write!(f, "'{name}': service data too short ({len} bytes)")
            }
        }
    }
}

/// Outcome of classifying one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Match(SensorMatch),
    Reject(Rejection),
}

impl Classification {
    pub fn is_match(&self) -> bool {
        matches!(self, Classification::Match(_))
    }

    /// The decoded match, discarding the rejection reason.
    pub fn into_match(self) -> Option<SensorMatch> {
        match self {
            Classification::Match(m) => Some(m),
            Classification::Reject(_) => None,
        }
    }
}

/// Filters records by name and decodes the first service data payload.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    filter: NameFilter,
    unit: TemperatureUnit,
}

impl Classifier {
    pub fn new(filter: NameFilter, unit: TemperatureUnit) -> Self {
        Self { filter, unit }
    }

    /// Classify one record.
    ///
    /// A record qualifies only when it carries both a name and service data,
    /// the name contains the filter, and service data payload 0 holds at least
    /// [`decoder::MIN_PAYLOAD_LEN`] bytes. Further payloads are ignored.
    pub fn classify(&self, record: &Advertisement) -> Classification {
        let name = match (record.name(), record.has_service_data()) {
            (None, _) => return Classification::Reject(Rejection::MissingName),
            (Some(_), false) => return Classification::Reject(Rejection::MissingServiceData),
            (Some(name), true) => name,
        };

        if !self.filter.matches(name) {
            return Classification::Reject(Rejection::NameMismatch(name.to_string()));
        }

        let Some(data) = record.service_data(0) else {
            return Classification::Reject(Rejection::MissingServiceData);
        };

        let payload = match ServicePayload::try_from(data) {
            Ok(payload) => payload,
            Err(PayloadError::TooShort(len)) => {
                return Classification::Reject(Rejection::PayloadTooShort {
                    name: name.to_string(),
                    len,
                });
            }
        };

        Classification::Match(SensorMatch {
            address: record.address,
            name: name.to_string(),
            raw: payload.as_bytes().to_vec(),
            reading: decoder::decode(&payload, self.unit),
            received_at: record.received_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_MAC, record, reference_payload, test_time};

    fn classifier() -> Classifier {
        Classifier::new(NameFilter::new("ATC_").unwrap(), TemperatureUnit::Celsius)
    }

    #[test]
    fn test_name_filter_rejects_empty() {
        assert_eq!(NameFilter::new(""), Err(NameFilterError::Empty));
        assert_eq!("".parse::<NameFilter>(), Err(NameFilterError::Empty));
        assert_eq!(NameFilter::default().as_str(), "ATC_");
    }

    #[test]
    fn test_name_filter_is_substring_match() {
        let filter = NameFilter::new("ATC_").unwrap();
        assert!(filter.matches("ATC_A1B2C3"));
        assert!(filter.matches("XATC_1234"));
        assert!(!filter.matches("LYWSD03MMC"));
        assert!(!filter.matches("atc_a1b2c3"));
    }

    #[test]
    fn test_reference_record_matches() {
        let r = record(Some("ATC_A1B2C3"), vec![reference_payload()]);
        let m = classifier().classify(&r).into_match().unwrap();

        assert_eq!(m.address, TEST_MAC);
        assert_eq!(m.name, "ATC_A1B2C3");
        assert_eq!(m.raw, reference_payload());
        assert_eq!(m.received_at, test_time());
        assert_eq!(m.reading.temperature, 10.0);
        assert_eq!(m.reading.humidity, 100.0);
        assert_eq!(m.reading.battery_voltage, 2.932);
        assert_eq!(m.reading.battery_percent, 100);
    }

    #[test]
    fn test_name_contained_not_prefixed_matches() {
        let r = record(Some("XATC_1234"), vec![reference_payload()]);
        assert!(classifier().classify(&r).is_match());
    }

    #[test]
    fn test_missing_name_rejected() {
        let r = record(None, vec![reference_payload()]);
        assert_eq!(
            classifier().classify(&r),
            Classification::Reject(Rejection::MissingName)
        );
    }

    #[test]
    fn test_missing_service_data_rejected() {
        let r = record(Some("ATC_A1B2C3"), vec![]);
        assert_eq!(
            classifier().classify(&r),
            Classification::Reject(Rejection::MissingServiceData)
        );
    }

    #[test]
    fn test_name_mismatch_rejected() {
        let r = record(Some("Mi Band 4"), vec![reference_payload()]);
        assert_eq!(
            classifier().classify(&r),
            Classification::Reject(Rejection::NameMismatch("Mi Band 4".to_string()))
        );
    }

    #[test]
    fn test_payload_length_boundary() {
        let mut short = reference_payload();
        short.truncate(12);
        let r = record(Some("ATC_A1B2C3"), vec![short]);
        assert_eq!(
            classifier().classify(&r),
            Classification::Reject(Rejection::PayloadTooShort {
                name: "ATC_A1B2C3".to_string(),
                len: 12
            })
        );

        let r = record(Some("ATC_A1B2C3"), vec![reference_payload()]);
        assert!(classifier().classify(&r).is_match());
    }

    #[test]
    fn test_only_first_payload_is_used() {
        // A valid second payload does not rescue a short first one
        let r = record(Some("ATC_A1B2C3"), vec![vec![0x01, 0x02], reference_payload()]);
        assert!(!classifier().classify(&r).is_match());

        let mut other = reference_payload();
        other[12] = 0x05;
        let r = record(Some("ATC_A1B2C3"), vec![reference_payload(), other]);
        let m = classifier().classify(&r).into_match().unwrap();
        assert_eq!(m.reading.battery_percent, 100);
    }

    #[test]
    fn test_unit_is_applied() {
        let c = Classifier::new(NameFilter::default(), TemperatureUnit::Fahrenheit);
        let r = record(Some("ATC_A1B2C3"), vec![reference_payload()]);
        let m = c.classify(&r).into_match().unwrap();
        assert_eq!(m.reading.temperature, 50.0);
        assert_eq!(m.reading.unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn test_rejection_display() {
        assert_eq!(format!("{}", Rejection::MissingName), "no advertised name");
        assert_eq!(
            format!(
                "{}",
                Rejection::PayloadTooShort {
                    name: "ATC_1".to_string(),
                    len: 3
                }
            ),
            "'ATC_1': service data too short (3 bytes)"
        );
    }
}
