//! ==============================================================================
//! ingest.rs - reading ingestion
//! ==============================================================================
//!
//! purpose:
//!     accept one reading from a field device.
//!
//! flow:
//!     1. validate the raw submission (id present, numbers finite)
//!     2. register the device if this is its first contact (insert-only: an
//!        existing configuration is never touched here)
//!     3. append the reading
//!     4. evaluate alerts against the device's configuration
//!
//! there is no transaction around 2 and 3. if the reading write fails the
//! registration stays, and the device simply resubmits.
//!
//! relationships:
//!     - called by: web.rs (GET/POST /api/data)
//!     - uses: store/ (SensorRegistry, ReadingStore), alerts.rs, validate.rs
//!
//! ==============================================================================

use crate::alerts::{self, Alert};
use crate::domain::{Reading, Sensor, SensorDefaults};
use crate::error::ServiceError;
use crate::store::Store;
use crate::validate::{required_text, NumericInput};

use serde::Deserialize;

/// a reading as submitted, before validation
///
/// accepts the field names the firmware sends (`temp`, `voltage`) as well as
/// the stored names.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Submission {
    #[serde(rename = "sensorId")]
    pub sensor_id: Option<String>,
    #[serde(rename = "tempC", alias = "temp", alias = "temperatureC")]
    pub temp_c: Option<NumericInput>,
    #[serde(rename = "voltageV", alias = "voltage")]
    pub voltage_v: Option<NumericInput>,
}

impl Submission {
    #[cfg(test)]
    pub fn new(
        sensor_id: &str,
        temp_c: impl Into<NumericInput>,
        voltage_v: impl Into<NumericInput>,
    ) -> Self {
        Self {
            sensor_id: Some(sensor_id.to_string()),
            temp_c: Some(temp_c.into()),
            voltage_v: Some(voltage_v.into()),
        }
    }

    /// fill the gaps in `self` from `fallback`, field by field
    pub fn or(self, fallback: Submission) -> Self {
        Self {
            sensor_id: self.sensor_id.or(fallback.sensor_id),
            temp_c: self.temp_c.or(fallback.temp_c),
            voltage_v: self.voltage_v.or(fallback.voltage_v),
        }
    }

    /// a timestamped reading, or the first validation failure
    pub fn validate(&self) -> Result<Reading, ServiceError> {
        let sensor_id = required_text(self.sensor_id.as_deref(), "sensorId")?;
        let temp_c = self
            .temp_c
            .as_ref()
            .ok_or_else(|| ServiceError::validation("tempC is required"))?
            .finite("tempC")?;
        let voltage_v = self
            .voltage_v
            .as_ref()
            .ok_or_else(|| ServiceError::validation("voltageV is required"))?
            .finite("voltageV")?;
        Ok(Reading::new(sensor_id, temp_c, voltage_v))
    }
}

/// what a successful ingestion produced
#[derive(Clone, Debug, PartialEq)]
pub struct Ingested {
    pub reading: Reading,
    /// configuration the reading was evaluated against
    pub sensor: Sensor,
    pub alerts: Vec<Alert>,
}

impl Ingested {
    /// plain-text acknowledgement sent back to the device
    pub const ACK: &'static str = "reading received and stored";
}

/// validate, register, persist and evaluate one reading
pub async fn ingest(store: &dyn Store, submission: &Submission) -> Result<Ingested, ServiceError> {
    let reading = submission.validate()?;

    let sensor = store
        .upsert_insert_only(&reading.sensor_id, &SensorDefaults::for_hardware(&reading.sensor_id))
        .await
        .map_err(ServiceError::internal("register sensor"))?;

    store
        .insert_reading(&reading)
        .await
        .map_err(ServiceError::internal("store reading"))?;

    let alerts = alerts::evaluate(&sensor, &reading);
    alerts::emit(&alerts);

    Ok(Ingested { reading, sensor, alerts })
}
