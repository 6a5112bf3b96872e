//! process-local store backend
//!
//! keeps the registry and the reading log behind one `tokio::sync::RwLock`,
//! so each upsert is atomic with respect to concurrent ingestion.

use super::{ReadingFilter, ReadingStore, SensorRegistry};
use crate::domain::{now_millis, Reading, Sensor, SensorDefaults, SensorPatch};
use crate::error::StoreError;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// registration order
    sensors: Vec<Sensor>,
    /// hardware id -> index into `sensors`
    index: HashMap<String, usize>,
    /// insertion order
    readings: Vec<Reading>,
}

impl Inner {
    fn sensor_mut(&mut self, hardware_id: &str) -> Option<&mut Sensor> {
        let slot = *self.index.get(hardware_id)?;
        self.sensors.get_mut(slot)
    }

    fn register(&mut self, sensor: Sensor) -> Sensor {
        self.index.insert(sensor.hardware_id.clone(), self.sensors.len());
        self.sensors.push(sensor.clone());
        sensor
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SensorRegistry for MemoryStore {
    async fn upsert_insert_only(
        &self,
        hardware_id: &str,
        defaults: &SensorDefaults,
    ) -> Result<Sensor, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.sensor_mut(hardware_id) {
            return Ok(existing.clone());
        }
        let sensor = defaults.clone().into_sensor(hardware_id, now_millis());
        log::info!("registered new sensor {} with default configuration", hardware_id);
        Ok(inner.register(sensor))
    }

    async fn upsert_full(&self, hardware_id: &str, patch: &SensorPatch) -> Result<Sensor, StoreError> {
        let mut inner = self.inner.write().await;
        let now = now_millis();
        if let Some(existing) = inner.sensor_mut(hardware_id) {
            patch.apply(existing, now);
            return Ok(existing.clone());
        }
        Ok(inner.register(patch.create(hardware_id, now)))
    }

    async fn all_sensors(&self) -> Result<Vec<Sensor>, StoreError> {
        Ok(self.inner.read().await.sensors.clone())
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        self.inner.write().await.readings.push(reading.clone());
        Ok(())
    }

    async fn find_readings(
        &self,
        filter: &ReadingFilter,
        limit: usize,
    ) -> Result<Vec<Reading>, StoreError> {
        let inner = self.inner.read().await;
        // newest insertion first, then a stable sort keeps that order on ties
        let mut matching: Vec<&Reading> = inner
            .readings
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    async fn latest_for(&self, sensor_id: &str) -> Result<Option<Reading>, StoreError> {
        let inner = self.inner.read().await;
        // max_by_key yields the last of equal maxima, i.e. the latest insert
        Ok(inner
            .readings
            .iter()
            .filter(|r| r.sensor_id == sensor_id)
            .max_by_key(|r| r.timestamp)
            .cloned())
    }
}
