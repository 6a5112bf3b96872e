//! ==============================================================================
//! alerts.rs - threshold evaluation for freshly ingested readings
//! ==============================================================================
//!
//! detection only: alerts are written to the log on target "alerts" and
//! handed back to the caller. they never block or undo persistence.
//!
//! ==============================================================================

use crate::domain::{Reading, Sensor};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Alert {
    /// temperature above the sensor's `alert_threshold`
    Temperature {
        sensor_id: String,
        friendly_name: String,
        temperature_c: f64,
        threshold: f64,
    },
    /// voltage below the sensor's `voltage_threshold`
    Battery {
        sensor_id: String,
        friendly_name: String,
        voltage_v: f64,
        threshold: f64,
    },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::Temperature { sensor_id, friendly_name, temperature_c, threshold } => write!(
                f,
                "temperature alert: {} ({}) at {:.1}°C exceeds {:.1}°C",
                friendly_name, sensor_id, temperature_c, threshold
            ),
            Alert::Battery { sensor_id, friendly_name, voltage_v, threshold } => write!(
                f,
                "battery alert: {} ({}) at {:.2}V is below {:.2}V",
                friendly_name, sensor_id, voltage_v, threshold
            ),
        }
    }
}

/// alerts raised by `reading` under `sensor`'s configuration
pub fn evaluate(sensor: &Sensor, reading: &Reading) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if reading.temperature_c > sensor.alert_threshold {
        alerts.push(Alert::Temperature {
            sensor_id: sensor.hardware_id.clone(),
            friendly_name: sensor.friendly_name.clone(),
            temperature_c: reading.temperature_c,
            threshold: sensor.alert_threshold,
        });
    }
    if reading.voltage_v < sensor.voltage_threshold {
        alerts.push(Alert::Battery {
            sensor_id: sensor.hardware_id.clone(),
            friendly_name: sensor.friendly_name.clone(),
            voltage_v: reading.voltage_v,
            threshold: sensor.voltage_threshold,
        });
    }
    alerts
}

/// publish alerts on the operational channel
pub fn emit(alerts: &[Alert]) {
    for alert in alerts {
        log::warn!(target: "alerts", "{}", alert);
    }
}
