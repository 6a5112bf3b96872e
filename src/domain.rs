//! ==============================================================================
//! domain.rs - readings, sensors and the per-sensor current state
//! ==============================================================================
//!
//! purpose:
//!     the record shapes shared by the store, the handlers and the json api.
//!     field names on the wire are camelCase so existing field devices and
//!     the client app keep working unchanged.
//!
//! relationships:
//!     - used by: store/ (persistence), ingest.rs, registry.rs, latest.rs, history.rs
//!     - serialized by: web.rs (json responses)
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// upper temperature bound applied to sensors that were never configured
pub const DEFAULT_ALERT_THRESHOLD: f64 = 5.0;

/// lower voltage bound applied to sensors that were never configured
pub const DEFAULT_VOLTAGE_THRESHOLD: f64 = 4.2;

/// current time truncated to whole milliseconds
///
/// both backends persist millisecond precision, so every timestamp we mint
/// is truncated up front and compares equal after a round trip.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

// ==============================================================================
// reading - immutable fact
// ==============================================================================

/// one timestamped temperature/voltage sample from a device
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// hardware id of the reporting device
    pub sensor_id: String,
    /// temperature in celsius
    pub temperature_c: f64,
    /// supply voltage in volts
    pub voltage_v: f64,
    /// ingestion time
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// a reading stamped with the current (ingestion) time
    pub fn new(sensor_id: impl Into<String>, temperature_c: f64, voltage_v: f64) -> Self {
        Self::at(sensor_id, temperature_c, voltage_v, now_millis())
    }

    pub fn at(
        sensor_id: impl Into<String>,
        temperature_c: f64,
        voltage_v: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            temperature_c,
            voltage_v,
            timestamp,
        }
    }
}

// ==============================================================================
// sensor - mutable registry entry
// ==============================================================================

/// per-device configuration, keyed by hardware id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub hardware_id: String,
    /// display label for the client app
    pub friendly_name: String,
    /// temperature above this raises a temperature alert
    pub alert_threshold: f64,
    /// voltage below this raises a battery alert
    pub voltage_threshold: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// values used when a sensor is created implicitly by ingestion
#[derive(Clone, Debug, PartialEq)]
pub struct SensorDefaults {
    pub friendly_name: String,
    pub alert_threshold: f64,
    pub voltage_threshold: f64,
}

impl SensorDefaults {
    /// schema defaults for a device: its own id as the display name
    pub fn for_hardware(hardware_id: &str) -> Self {
        Self {
            friendly_name: hardware_id.to_string(),
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            voltage_threshold: DEFAULT_VOLTAGE_THRESHOLD,
        }
    }

    pub fn into_sensor(self, hardware_id: &str, now: DateTime<Utc>) -> Sensor {
        Sensor {
            hardware_id: hardware_id.to_string(),
            friendly_name: self.friendly_name,
            alert_threshold: self.alert_threshold,
            voltage_threshold: self.voltage_threshold,
            created_at: now,
            updated_at: now,
        }
    }
}

/// fields of an explicit configuration update; `None` means "leave as is"
/// on an existing sensor and "use the schema default" on a new one
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorPatch {
    pub friendly_name: Option<String>,
    pub alert_threshold: Option<f64>,
    pub voltage_threshold: Option<f64>,
}

impl SensorPatch {
    /// the sensor this patch creates when no record exists yet
    pub fn create(&self, hardware_id: &str, now: DateTime<Utc>) -> Sensor {
        let defaults = SensorDefaults::for_hardware(hardware_id);
        SensorDefaults {
            friendly_name: self.friendly_name.clone().unwrap_or(defaults.friendly_name),
            alert_threshold: self.alert_threshold.unwrap_or(defaults.alert_threshold),
            voltage_threshold: self.voltage_threshold.unwrap_or(defaults.voltage_threshold),
        }
        .into_sensor(hardware_id, now)
    }

    /// overwrite only the provided fields
    pub fn apply(&self, sensor: &mut Sensor, now: DateTime<Utc>) {
        if let Some(name) = &self.friendly_name {
            sensor.friendly_name = name.clone();
        }
        if let Some(threshold) = self.alert_threshold {
            sensor.alert_threshold = threshold;
        }
        if let Some(threshold) = self.voltage_threshold {
            sensor.voltage_threshold = threshold;
        }
        sensor.updated_at = now;
    }
}

// ==============================================================================
// sensor state - registry entry joined with its most recent reading
// ==============================================================================

/// one row of the `/api/latest` view
///
/// the reading fields are `null` on the wire for a sensor that has never
/// reported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorState {
    pub sensor_id: String,
    pub friendly_name: String,
    pub alert_threshold: f64,
    pub voltage_threshold: f64,
    pub temperature_c: Option<f64>,
    pub voltage_v: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SensorState {
    pub fn new(sensor: Sensor, latest: Option<Reading>) -> Self {
        Self {
            sensor_id: sensor.hardware_id,
            friendly_name: sensor.friendly_name,
            alert_threshold: sensor.alert_threshold,
            voltage_threshold: sensor.voltage_threshold,
            temperature_c: latest.as_ref().map(|r| r.temperature_c),
            voltage_v: latest.as_ref().map(|r| r.voltage_v),
            timestamp: latest.map(|r| r.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_creates_with_schema_defaults() {
        let now = now_millis();
        let patch = SensorPatch {
            alert_threshold: Some(7.0),
            ..Default::default()
        };
        let sensor = patch.create("HELADERA-01", now);
        assert_eq!(sensor.friendly_name, "HELADERA-01");
        assert_eq!(sensor.alert_threshold, 7.0);
        assert_eq!(sensor.voltage_threshold, DEFAULT_VOLTAGE_THRESHOLD);
        assert_eq!(sensor.created_at, now);
    }

    #[test]
    fn patch_overwrites_only_given_fields() {
        let created = now_millis();
        let mut sensor = SensorDefaults {
            friendly_name: "Cocina".into(),
            alert_threshold: 4.0,
            voltage_threshold: 3.9,
        }
        .into_sensor("X", created);
        let later = created + chrono::Duration::seconds(5);
        SensorPatch {
            alert_threshold: Some(7.0),
            ..Default::default()
        }
        .apply(&mut sensor, later);

        assert_eq!(sensor.friendly_name, "Cocina");
        assert_eq!(sensor.alert_threshold, 7.0);
        assert_eq!(sensor.voltage_threshold, 3.9);
        assert_eq!(sensor.created_at, created);
        assert_eq!(sensor.updated_at, later);
    }

    #[test]
    fn state_without_reading_serializes_nulls() {
        let sensor = SensorDefaults::for_hardware("X").into_sensor("X", now_millis());
        let json = serde_json::to_value(SensorState::new(sensor, None)).unwrap();
        assert_eq!(json["sensorId"], "X");
        assert_eq!(json["alertThreshold"], 5.0);
        assert!(json["temperatureC"].is_null());
        assert!(json["voltageV"].is_null());
        assert!(json["timestamp"].is_null());
    }

    #[test]
    fn reading_uses_camel_case_wire_names() {
        let json = serde_json::to_value(Reading::new("X", 3.2, 4.5)).unwrap();
        assert_eq!(json["sensorId"], "X");
        assert_eq!(json["temperatureC"], 3.2);
        assert_eq!(json["voltageV"], 4.5);
        assert!(json["timestamp"].is_string());
    }
}
