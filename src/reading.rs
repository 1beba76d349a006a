//! Decoded sensor reading and the temperature unit it is expressed in.

use std::fmt;

/// Unit the decoder reports temperatures in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TemperatureUnit {
    /// Degrees Celsius, as broadcast by the sensor
    #[default]
    Celsius,
    /// Degrees Fahrenheit
    Fahrenheit,
}

impl TemperatureUnit {
    /// Express a Celsius value in this unit.
    #[inline]
    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Unit symbol used in console output.
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => write!(f, "celsius"),
            TemperatureUnit::Fahrenheit => write!(f, "fahrenheit"),
        }
    }
}

/// A single reading decoded from one advertisement.
///
/// - Temperature in the configured [`TemperatureUnit`]
/// - Humidity in percent
/// - Battery voltage in Volts
/// - Battery level in percent (0-100 from a healthy sensor, raw byte otherwise)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f64,
    pub unit: TemperatureUnit,
    pub humidity: f64,
    pub battery_voltage: f64,
    pub battery_percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celsius_is_identity() {
        assert_eq!(TemperatureUnit::Celsius.convert(21.5), 21.5);
    }

    #[test]
    fn test_fahrenheit_conversion() {
        assert_eq!(TemperatureUnit::Fahrenheit.convert(0.0), 32.0);
        assert_eq!(TemperatureUnit::Fahrenheit.convert(100.0), 212.0);
        assert_eq!(TemperatureUnit::Fahrenheit.convert(-40.0), -40.0);
    }

    #[test]
    fn test_unit_display_and_symbol() {
        assert_eq!(TemperatureUnit::default(), TemperatureUnit::Celsius);
        assert_eq!(format!("{}", TemperatureUnit::Fahrenheit), "fahrenheit");
        assert_eq!(TemperatureUnit::Celsius.symbol(), "°C");
        assert_eq!(TemperatureUnit::Fahrenheit.symbol(), "°F");
    }
}
