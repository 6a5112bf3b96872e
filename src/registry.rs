//! explicit sensor configuration updates (`POST /api/sensors/config`)
//!
//! unlike ingestion this is a full upsert: provided fields overwrite, omitted
//! fields keep their current value (or take the schema default on creation).

use crate::domain::{Sensor, SensorPatch};
use crate::error::ServiceError;
use crate::store::Store;
use crate::validate::{optional_finite, required_text, NumericInput};

use serde::Deserialize;

/// configuration change as posted by the client app
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub hardware_id: Option<String>,
    pub friendly_name: Option<String>,
    pub alert_threshold: Option<NumericInput>,
    pub voltage_threshold: Option<NumericInput>,
}

impl ConfigUpdate {
    /// the target hardware id and the validated patch
    pub fn validate(&self) -> Result<(String, SensorPatch), ServiceError> {
        let hardware_id = required_text(self.hardware_id.as_deref(), "hardwareId")?;
        let friendly_name = match self.friendly_name.as_deref().map(str::trim) {
            Some("") => return Err(ServiceError::validation("friendlyName must not be blank")),
            other => other.map(str::to_string),
        };
        let patch = SensorPatch {
            friendly_name,
            alert_threshold: optional_finite(self.alert_threshold.as_ref(), "alertThreshold")?,
            voltage_threshold: optional_finite(self.voltage_threshold.as_ref(), "voltageThreshold")?,
        };
        Ok((hardware_id, patch))
    }
}

/// create or update one sensor's configuration
pub async fn update_config(store: &dyn Store, update: &ConfigUpdate) -> Result<Sensor, ServiceError> {
    let (hardware_id, patch) = update.validate()?;
    let sensor = store
        .upsert_full(&hardware_id, &patch)
        .await
        .map_err(ServiceError::internal("update sensor configuration"))?;
    log::info!(
        "sensor {} configured: name={:?} alert>{} battery<{}",
        sensor.hardware_id,
        sensor.friendly_name,
        sensor.alert_threshold,
        sensor.voltage_threshold
    );
    Ok(sensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SensorDefaults;
    use crate::store::failing::FailingStore;
    use crate::store::{MemoryStore, SensorRegistry};

    fn update(hardware_id: &str) -> ConfigUpdate {
        ConfigUpdate {
            hardware_id: Some(hardware_id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn creates_missing_sensor_with_defaults() {
        let store = MemoryStore::new();
        let sensor = update_config(
            &store,
            &ConfigUpdate {
                friendly_name: Some("Heladera Barra".into()),
                ..update("NEW")
            },
        )
        .await
        .unwrap();
        assert_eq!(sensor.friendly_name, "Heladera Barra");
        assert_eq!(sensor.alert_threshold, 5.0);
        assert_eq!(sensor.voltage_threshold, 4.2);
    }

    #[tokio::test]
    async fn changes_only_given_fields() {
        let store = MemoryStore::new();
        let before = store
            .upsert_insert_only(
                "X",
                &SensorDefaults {
                    friendly_name: "Cocina".into(),
                    alert_threshold: 5.0,
                    voltage_threshold: 3.8,
                },
            )
            .await
            .unwrap();

        let after = update_config(
            &store,
            &ConfigUpdate {
                alert_threshold: Some(7.0.into()),
                ..update("X")
            },
        )
        .await
        .unwrap();
        assert_eq!(after.alert_threshold, 7.0);
        assert_eq!(after.friendly_name, before.friendly_name);
        assert_eq!(after.voltage_threshold, before.voltage_threshold);
        assert_eq!(store.all_sensors().await.unwrap(), vec![after]);
    }

    #[tokio::test]
    async fn accepts_numeric_strings() {
        let store = MemoryStore::new();
        let sensor = update_config(
            &store,
            &ConfigUpdate {
                voltage_threshold: Some("3.9".into()),
                ..update("X")
            },
        )
        .await
        .unwrap();
        assert_eq!(sensor.voltage_threshold, 3.9);
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let store = MemoryStore::new();
        let cases = [
            ConfigUpdate::default(),
            update(" "),
            ConfigUpdate { friendly_name: Some("  ".into()), ..update("X") },
            ConfigUpdate { alert_threshold: Some("hot".into()), ..update("X") },
        ];
        for case in &cases {
            let err = update_config(&store, case).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{case:?}");
        }
        assert!(store.all_sensors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_internal() {
        let store = FailingStore { registry: true, inner: MemoryStore::new() };
        let err = update_config(&store, &update("X")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal { .. }));
    }
}
