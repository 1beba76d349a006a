//! Human-readable console output.

use crate::classifier::SensorMatch;
use crate::cycle::CycleSummary;
use crate::output::{OutputFormatter, hex_dump};

/// Formats readings as a single line:
///
/// `ATC_A1B2C3 (A4:C1:38:A1:B2:C3) data=0011...64 temperature=10.00°C humidity=100.00% battery=2.9320V battery_level=100%`
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleFormatter;

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, sensor: &SensorMatch) -> String {
        let r = &sensor.reading;
        format!(
            "{} ({}) data={} temperature={:.2}{} humidity={:.2}% battery={:.4}V battery_level={:.0}%",
            sensor.name,
            sensor.address,
            hex_dump(&sensor.raw),
            r.temperature,
            r.unit.symbol(),
            r.humidity,
            r.battery_voltage,
            f64::from(r.battery_percent),
        )
    }

    fn format_summary(&self, summary: &CycleSummary) -> Option<String> {
        Some(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{SensorReading, TemperatureUnit};
    use crate::test_utils::{TEST_MAC, reference_payload, test_time};

    fn sensor(reading: SensorReading) -> SensorMatch {
        SensorMatch {
            address: TEST_MAC,
            name: "ATC_A1B2C3".to_string(),
            raw: reference_payload(),
            reading,
            received_at: test_time(),
        }
    }

    #[test]
    fn test_format_reference_reading() {
        let line = ConsoleFormatter.format(&sensor(SensorReading {
            temperature: 10.0,
            unit: TemperatureUnit::Celsius,
            humidity: 100.0,
            battery_voltage: 2.932,
            battery_percent: 100,
        }));

        assert_eq!(
            line,
            "ATC_A1B2C3 (A4:C1:38:A1:B2:C3) data=001122334455e8031027740b64 \
             temperature=10.00°C humidity=100.00% battery=2.9320V battery_level=100%"
        );
    }

    #[test]
    fn test_format_fahrenheit_and_negative_values() {
        let line = ConsoleFormatter.format(&sensor(SensorReading {
            temperature: -4.5,
            unit: TemperatureUnit::Fahrenheit,
            humidity: 45.678,
            battery_voltage: 3.1,
            battery_percent: 7,
        }));

        assert!(line.contains("temperature=-4.50°F"));
        assert!(line.contains("humidity=45.68%"));
        assert!(line.contains("battery=3.1000V"));
        assert!(line.ends_with("battery_level=7%"));
    }
}
