//! ==============================================================================
//! store/ - persistence interface and backends
//! ==============================================================================
//!
//! purpose:
//!     the sensor registry and the reading log, as seen by the handlers.
//!     the handlers only ever hold an `Arc<dyn Store>`; which backend sits
//!     behind it is decided once at startup from `[store] backend`.
//!
//! backends:
//!     - sqlite.rs: durable, rusqlite on a blocking thread
//!     - memory.rs: process-local, used by tests and `backend = "memory"`
//!
//! ordering contract:
//!     `find_readings` and `latest_for` order by timestamp descending; among
//!     equal timestamps the most recently inserted reading comes first.
//!
//! ==============================================================================

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::{Reading, Sensor, SensorDefaults, SensorPatch};
use crate::error::StoreError;

use async_trait::async_trait;
use std::sync::Arc;

/// selection for `find_readings`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadingFilter {
    /// only readings from this device; `None` matches every device
    pub sensor_id: Option<String>,
}

impl ReadingFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn sensor(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: Some(sensor_id.into()),
        }
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        self.sensor_id
            .as_deref()
            .map_or(true, |id| id == reading.sensor_id)
    }
}

/// mutable per-device configuration records
#[async_trait]
pub trait SensorRegistry: Send + Sync {
    /// create the sensor from `defaults` if absent; an existing record is
    /// returned untouched
    async fn upsert_insert_only(
        &self,
        hardware_id: &str,
        defaults: &SensorDefaults,
    ) -> Result<Sensor, StoreError>;

    /// create the sensor if absent (schema defaults for omitted fields),
    /// otherwise overwrite the fields present in `patch`
    async fn upsert_full(&self, hardware_id: &str, patch: &SensorPatch) -> Result<Sensor, StoreError>;

    /// every registered sensor, in registration order
    async fn all_sensors(&self) -> Result<Vec<Sensor>, StoreError>;
}

/// append-only log of readings
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError>;

    /// matching readings, newest first, at most `limit`
    async fn find_readings(
        &self,
        filter: &ReadingFilter,
        limit: usize,
    ) -> Result<Vec<Reading>, StoreError>;

    /// the newest reading of one device, if it ever reported
    async fn latest_for(&self, sensor_id: &str) -> Result<Option<Reading>, StoreError>;
}

/// the full store client handed to the web layer
pub trait Store: SensorRegistry + ReadingStore {}

impl<T: SensorRegistry + ReadingStore> Store for T {}

/// construct the configured backend
pub fn open(config: &StoreConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.path)?;
            log::info!("opened sqlite store at {}", config.path.display());
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            log::warn!("using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

// ==============================================================================
// test support
// ==============================================================================


/// behaviour every backend must show; run from each backend's tests
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use crate::domain::{DEFAULT_ALERT_THRESHOLD, DEFAULT_VOLTAGE_THRESHOLD};
    use chrono::{DateTime, Duration, Utc};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    pub async fn insert_only_upsert_keeps_existing(store: &dyn Store) {
        let created = store
            .upsert_insert_only("A", &SensorDefaults::for_hardware("A"))
            .await
            .unwrap();
        assert_eq!(created.friendly_name, "A");
        assert_eq!(created.alert_threshold, DEFAULT_ALERT_THRESHOLD);
        assert_eq!(created.voltage_threshold, DEFAULT_VOLTAGE_THRESHOLD);

        let other = SensorDefaults {
            friendly_name: "ignored".into(),
            alert_threshold: 99.0,
            voltage_threshold: 0.0,
        };
        let again = store.upsert_insert_only("A", &other).await.unwrap();
        assert_eq!(again, created);
        assert_eq!(store.all_sensors().await.unwrap().len(), 1);
    }

    pub async fn full_upsert_creates_then_patches(store: &dyn Store) {
        let patch = SensorPatch {
            friendly_name: Some("Cocina".into()),
            ..Default::default()
        };
        let created = store.upsert_full("B", &patch).await.unwrap();
        assert_eq!(created.friendly_name, "Cocina");
        assert_eq!(created.alert_threshold, DEFAULT_ALERT_THRESHOLD);
        assert_eq!(created.voltage_threshold, DEFAULT_VOLTAGE_THRESHOLD);

        let patch = SensorPatch {
            alert_threshold: Some(7.0),
            ..Default::default()
        };
        let updated = store.upsert_full("B", &patch).await.unwrap();
        assert_eq!(updated.friendly_name, "Cocina");
        assert_eq!(updated.alert_threshold, 7.0);
        assert_eq!(updated.voltage_threshold, DEFAULT_VOLTAGE_THRESHOLD);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    pub async fn find_orders_newest_first_and_limits(store: &dyn Store) {
        for i in 0..5 {
            let reading = Reading::at("S", i as f64, 4.5, t0() + Duration::seconds(i));
            store.insert_reading(&reading).await.unwrap();
        }
        store
            .insert_reading(&Reading::at("T", 9.0, 4.5, t0() + Duration::seconds(10)))
            .await
            .unwrap();

        let found = store.find_readings(&ReadingFilter::sensor("S"), 2).await.unwrap();
        let temps: Vec<f64> = found.iter().map(|r| r.temperature_c).collect();
        assert_eq!(temps, vec![4.0, 3.0]);
        assert!(found[0].timestamp > found[1].timestamp);

        let all = store.find_readings(&ReadingFilter::any(), 50).await.unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].sensor_id, "T");

        let none = store.find_readings(&ReadingFilter::sensor("nope"), 10).await.unwrap();
        assert!(none.is_empty());
    }

    pub async fn latest_breaks_ties_by_insertion(store: &dyn Store) {
        assert_eq!(store.latest_for("S").await.unwrap(), None);

        let at = t0();
        store.insert_reading(&Reading::at("S", 1.0, 4.5, at)).await.unwrap();
        store.insert_reading(&Reading::at("S", 2.0, 4.5, at)).await.unwrap();
        store
            .insert_reading(&Reading::at("S", 0.5, 4.5, at - Duration::seconds(1)))
            .await
            .unwrap();

        let latest = store.latest_for("S").await.unwrap().unwrap();
        assert_eq!(latest.temperature_c, 2.0);
        assert_eq!(latest.timestamp, at);

        let found = store.find_readings(&ReadingFilter::sensor("S"), 1).await.unwrap();
        assert_eq!(found[0].temperature_c, 2.0);
    }

    pub async fn concurrent_first_contact_registers_once(store: Arc<dyn Store>) {
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store
                    .upsert_insert_only("HELADERA-09", &SensorDefaults::for_hardware("HELADERA-09"))
                    .await
                    .unwrap()
            }));
        }
        let mut created = Vec::new();
        for task in tasks {
            created.push(task.await.unwrap());
        }
        assert!(created.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(store.all_sensors().await.unwrap().len(), 1);
    }

    pub async fn sensors_listed_in_registration_order(store: &dyn Store) {
        for id in ["Z", "M", "A"] {
            store
                .upsert_insert_only(id, &SensorDefaults::for_hardware(id))
                .await
                .unwrap();
        }
        let ids: Vec<String> = store
            .all_sensors()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.hardware_id)
            .collect();
        assert_eq!(ids, vec!["Z", "M", "A"]);
    }
}
