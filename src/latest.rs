//! ==============================================================================
//! latest.rs - current state per registered sensor
//! ==============================================================================
//!
//! the registry decides which sensors exist; the reading log only supplies
//! each one's most recent sample. this is a left join:
//!
//!     registry ──┬── sensor A ── latest_for(A) ── Some(reading) ─> filled row
//!                ├── sensor B ── latest_for(B) ── None          ─> null row
//!                └── ...
//!
//! readings from devices that never made it into the registry are not
//! listed; ingestion registers every device before storing its reading.
//!
//! ==============================================================================

use crate::domain::SensorState;
use crate::error::ServiceError;
use crate::store::Store;

/// one row per registered sensor, in registration order
pub async fn latest_states(store: &dyn Store) -> Result<Vec<SensorState>, ServiceError> {
    let sensors = store
        .all_sensors()
        .await
        .map_err(ServiceError::internal("list sensors"))?;

    let mut states = Vec::with_capacity(sensors.len());
    for sensor in sensors {
        let latest = store
            .latest_for(&sensor.hardware_id)
            .await
            .map_err(ServiceError::internal("load latest readings"))?;
        states.push(SensorState::new(sensor, latest));
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReadingStore;
    use crate::domain::{Reading, SensorDefaults, SensorPatch};
    use crate::store::failing::FailingStore;
    use crate::store::{MemoryStore, SqliteStore};
    use chrono::{DateTime, Duration};

    async fn register(store: &dyn Store, id: &str) {
        store
            .upsert_insert_only(id, &SensorDefaults::for_hardware(id))
            .await
            .unwrap();
    }

    async fn one_row_per_sensor(store: &dyn Store) {
        let t0 = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        register(store, "A").await;
        register(store, "SILENT").await;
        store
            .upsert_full(
                "A",
                &SensorPatch {
                    friendly_name: Some("Heladera A".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        for (i, temp) in [2.0, 4.0, 3.0].into_iter().enumerate() {
            let at = t0 + Duration::minutes(i as i64);
            store.insert_reading(&Reading::at("A", temp, 4.4, at)).await.unwrap();
        }
        // out-of-order arrival of an older sample must not win
        store
            .insert_reading(&Reading::at("A", 9.9, 4.4, t0 - Duration::hours(1)))
            .await
            .unwrap();

        let states = latest_states(store).await.unwrap();
        assert_eq!(states.len(), 2);

        let a = &states[0];
        assert_eq!(a.sensor_id, "A");
        assert_eq!(a.friendly_name, "Heladera A");
        assert_eq!(a.temperature_c, Some(3.0));
        assert_eq!(a.voltage_v, Some(4.4));
        assert_eq!(a.timestamp, Some(t0 + Duration::minutes(2)));

        let silent = &states[1];
        assert_eq!(silent.sensor_id, "SILENT");
        assert_eq!(silent.alert_threshold, 5.0);
        assert_eq!(silent.temperature_c, None);
        assert_eq!(silent.voltage_v, None);
        assert_eq!(silent.timestamp, None);
    }

    #[tokio::test]
    async fn one_row_per_sensor_in_memory() {
        one_row_per_sensor(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn one_row_per_sensor_in_sqlite() {
        one_row_per_sensor(&SqliteStore::open_in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_view() {
        let store = MemoryStore::new();
        // readings alone do not make a sensor
        store.insert_reading(&Reading::new("ORPHAN", 1.0, 4.5)).await.unwrap();
        assert!(latest_states(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reading_store_failure_is_internal() {
        let store = FailingStore { registry: false, inner: MemoryStore::new() };
        register(&store, "A").await;
        let err = latest_states(&store).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal { action: "load latest readings", .. }));
    }
}
