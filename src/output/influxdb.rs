//! InfluxDB line protocol output formatter.

use crate::classifier::SensorMatch;
use crate::output::OutputFormatter;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Field values for InfluxDB line protocol
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(num) => write!(f, "{num}"),
            FieldValue::Integer(num) => write!(f, "{num}i"),
        }
    }
}

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<String, String>,
    pub field_set: BTreeMap<String, FieldValue>,
    pub timestamp: Option<SystemTime>,
}

/// Escape commas, equals signs and spaces in tag values.
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn fmt_tags(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (key, value) in data_point.tag_set.iter() {
        write!(fmt, ",{}={}", key, escape_tag(value))?;
    }
    Ok(())
}

fn fmt_fields(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    let mut first = true;
    for (key, value) in data_point.field_set.iter() {
        if first {
            first = false;
        } else {
            write!(fmt, ",")?;
        }
        write!(fmt, "{}={}", key, value)?;
    }
    Ok(())
}

fn fmt_timestamp(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    // Timestamps before the epoch are dropped and InfluxDB assigns the write time
    if let Some(since_epoch) = data_point
        .timestamp
        .and_then(|time| time.duration_since(SystemTime::UNIX_EPOCH).ok())
    {
        write!(fmt, " {}", since_epoch.as_nanos())?;
    }
    Ok(())
}

impl fmt::Display for DataPoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.measurement)?;
        fmt_tags(self, fmt)?;
        write!(fmt, " ")?;
        fmt_fields(self, fmt)?;
        fmt_timestamp(self, fmt)
    }
}

/// InfluxDB line protocol formatter.
///
/// Tags each point with the advertiser's address and advertised name.
pub struct InfluxDbFormatter {
    /// The measurement name in InfluxDB
    measurement_name: String,
}

impl InfluxDbFormatter {
    /// Create a new InfluxDB formatter.
    ///
    /// # Arguments
    /// * `measurement_name` - The measurement name to use in the line protocol
    pub fn new(measurement_name: String) -> Self {
        Self { measurement_name }
    }

    fn tag_set(&self, sensor: &SensorMatch) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        tags.insert("mac".to_string(), sensor.address.to_string());
        tags.insert("name".to_string(), sensor.name.clone());
        tags
    }

    fn field_set(&self, sensor: &SensorMatch) -> BTreeMap<String, FieldValue> {
        let r = &sensor.reading;
        let mut fields = BTreeMap::new();
        fields.insert("temperature".into(), FieldValue::Float(r.temperature));
        fields.insert("humidity".into(), FieldValue::Float(r.humidity));
        fields.insert(
            "battery_potential".into(),
            FieldValue::Float(r.battery_voltage),
        );
        fields.insert(
            "battery_level".into(),
            FieldValue::Integer(i64::from(r.battery_percent)),
        );
        fields
    }

    fn to_data_point(&self, sensor: &SensorMatch) -> DataPoint {
        DataPoint {
            measurement: self.measurement_name.clone(),
            tag_set: self.tag_set(sensor),
            field_set: self.field_set(sensor),
            timestamp: Some(sensor.received_at),
        }
    }
}

impl OutputFormatter for InfluxDbFormatter {
    fn format(&self, sensor: &SensorMatch) -> String {
        format!("{}", self.to_data_point(sensor))
    }
}
