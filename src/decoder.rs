//! Decoder for the ATC/pvvx custom advertising format.
//!
//! The service data payload carries fixed-offset little-endian fields:
//!
//! | offset | field           | encoding                |
//! |--------|-----------------|-------------------------|
//! | 0-5    | device address  | opaque                  |
//! | 6-7    | temperature     | i16, 0.01 °C            |
//! | 8-9    | humidity        | i16, 0.01 %RH           |
//! | 10-11  | battery voltage | i16, 1 mV               |
//! | 12     | battery level   | u8, percent             |
//!
//! Anything after byte 12 (measurement counter, flags) is ignored.
//! See: https://github.com/pvvx/ATC_MiThermometer#custom-format-all-data-little-endian

use crate::reading::{SensorReading, TemperatureUnit};
use thiserror::Error;

/// Minimum number of service data bytes needed to decode a reading.
pub const MIN_PAYLOAD_LEN: usize = 13;

/// Errors returned when building a [`ServicePayload`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload too short: {0} bytes, need at least {MIN_PAYLOAD_LEN}")]
    TooShort(usize),
}

/// Service data that is known to be long enough to decode.
///
/// The decoded fields live in `head`, a fixed-size array, so every field offset
/// is checked at compile time rather than at runtime.
#[derive(Debug, Clone, Copy)]
pub struct ServicePayload<'a> {
    head: &'a [u8; MIN_PAYLOAD_LEN],
    raw: &'a [u8],
}

impl<'a> ServicePayload<'a> {
    /// All bytes of the payload, including any trailing bytes the decoder ignores.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    #[inline]
    fn signed16(&self, offset: usize) -> i16 {
        i16::from_le_bytes([self.head[offset], self.head[offset + 1]])
    }
}

impl<'a> TryFrom<&'a [u8]> for ServicePayload<'a> {
    type Error = PayloadError;

    fn try_from(raw: &'a [u8]) -> Result<Self, Self::Error> {
        let head = raw
            .first_chunk::<MIN_PAYLOAD_LEN>()
            .ok_or(PayloadError::TooShort(raw.len()))?;
        Ok(ServicePayload { head, raw })
    }
}

const TEMPERATURE_OFFSET: usize = 6;
const HUMIDITY_OFFSET: usize = 8;
const BATTERY_VOLTAGE_OFFSET: usize = 10;
const BATTERY_PERCENT_OFFSET: usize = 12;

/// Decode a payload into a [`SensorReading`].
///
/// # Unit Conversions
/// - Temperature: centidegrees → degrees Celsius, then into `unit`
/// - Humidity: hundredths of a percent → percent
/// - Battery voltage: millivolts → Volts (divide by 1000)
pub fn decode(payload: &ServicePayload<'_>, unit: TemperatureUnit) -> SensorReading {
    let celsius = f64::from(payload.signed16(TEMPERATURE_OFFSET)) / 100.0;

    SensorReading {
        temperature: unit.convert(celsius),
        unit,
        humidity: f64::from(payload.signed16(HUMIDITY_OFFSET)) / 100.0,
        battery_voltage: f64::from(payload.signed16(BATTERY_VOLTAGE_OFFSET)) / 1000.0,
        battery_percent: payload.head[BATTERY_PERCENT_OFFSET],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::reference_payload;

    fn with_bytes(overrides: &[(usize, u8)]) -> Vec<u8> {
        let mut data = vec![0u8; MIN_PAYLOAD_LEN];
        for &(offset, value) in overrides {
            data[offset] = value;
        }
        data
    }

    fn decode_celsius(data: &[u8]) -> SensorReading {
        let payload = ServicePayload::try_from(data).unwrap();
        decode(&payload, TemperatureUnit::Celsius)
    }

    #[test]
    fn test_payload_length_boundary() {
        assert_eq!(
            ServicePayload::try_from(&[0u8; 12][..]).unwrap_err(),
            PayloadError::TooShort(12)
        );
        assert!(ServicePayload::try_from(&[0u8; 13][..]).is_ok());
        assert_eq!(
            ServicePayload::try_from(&[0u8; 0][..]).unwrap_err(),
            PayloadError::TooShort(0)
        );
    }

    #[test]
    fn test_payload_keeps_trailing_bytes() {
        let data = [0u8; 15];
        let payload = ServicePayload::try_from(&data[..]).unwrap();
        assert_eq!(payload.as_bytes().len(), 15);
    }

    #[test]
    fn test_decode_reference_payload() {
        let reading = decode_celsius(&reference_payload());
        assert_eq!(reading.temperature, 10.0);
        assert_eq!(reading.humidity, 100.0);
        assert_eq!(reading.battery_voltage, 2.932);
        assert_eq!(reading.battery_percent, 100);
        assert_eq!(reading.unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_decode_small_positive_temperature() {
        let data = with_bytes(&[(6, 0x10), (7, 0x00)]);
        assert_eq!(decode_celsius(&data).temperature, 0.16);
    }

    #[test]
    fn test_decode_fahrenheit() {
        let data = with_bytes(&[(6, 0x10), (7, 0x00)]);
        let payload = ServicePayload::try_from(&data[..]).unwrap();
        let reading = decode(&payload, TemperatureUnit::Fahrenheit);
        assert!((reading.temperature - 32.288).abs() < 1e-9);
        assert_eq!(reading.unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn test_decode_negative_temperature() {
        let data = with_bytes(&[(6, 0xF0), (7, 0xFF)]);
        assert_eq!(decode_celsius(&data).temperature, -0.16);
    }

    #[test]
    fn test_decode_negative_battery_voltage() {
        // 0xFF38 read unsigned would be 65.336 V
        let data = with_bytes(&[(10, 0x38), (11, 0xFF)]);
        assert_eq!(decode_celsius(&data).battery_voltage, -0.2);
    }

    #[test]
    fn test_humidity_wraps_above_signed_range() {
        // 0x8000 = 327.68 %RH is outside the signed range of the wire format
        let data = with_bytes(&[(8, 0x00), (9, 0x80)]);
        assert_eq!(decode_celsius(&data).humidity, -327.68);
    }

    #[test]
    fn test_battery_percent_is_unsigned() {
        let data = with_bytes(&[(12, 0xFF)]);
        assert_eq!(decode_celsius(&data).battery_percent, 255);
    }

    #[test]
    fn test_ignores_address_and_trailing_bytes() {
        let mut a = reference_payload();
        let mut b = reference_payload();
        a[..6].copy_from_slice(&[0xFF; 6]);
        b.extend_from_slice(&[0x2A, 0x05]);
        assert_eq!(decode_celsius(&a), decode_celsius(&b));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let data = reference_payload();
        let first = decode_celsius(&data);
        let second = decode_celsius(&data);
        assert_eq!(first.temperature.to_bits(), second.temperature.to_bits());
        assert_eq!(first.humidity.to_bits(), second.humidity.to_bits());
        assert_eq!(
            first.battery_voltage.to_bits(),
            second.battery_voltage.to_bits()
        );
        assert_eq!(first.battery_percent, second.battery_percent);
    }
}
