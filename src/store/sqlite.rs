//! ==============================================================================
//! store/sqlite.rs - durable store backend
//! ==============================================================================
//!
//! one rusqlite connection shared behind `Arc<Mutex<_>>`. every call hops to
//! a blocking thread so the http tasks never stall on disk io.
//!
//! the two upserts map onto sqlite's native conflict clause:
//!     - insert-only: INSERT ... ON CONFLICT(hardware_id) DO NOTHING
//!     - full:        INSERT ... ON CONFLICT(hardware_id) DO UPDATE SET col = COALESCE(new, col)
//!
//! timestamps are stored as unix milliseconds.
//!
//! ==============================================================================

use super::{ReadingFilter, ReadingStore, SensorRegistry};
use crate::domain::{
    now_millis, Reading, Sensor, SensorDefaults, SensorPatch, DEFAULT_ALERT_THRESHOLD,
    DEFAULT_VOLTAGE_THRESHOLD,
};
use crate::error::StoreError;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const SENSOR_COLUMNS: &str =
    "hardware_id, friendly_name, alert_threshold, voltage_threshold, created_at, updated_at";

const READING_COLUMNS: &str = "sensor_id, temperature_c, voltage_v, timestamp_ms";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// open (or create) the database file and apply the schema
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database {}", path.display()))?;
        // wal lets the client app read while devices keep writing
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_schema(conn)
    }

    /// a private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA).context("failed to apply schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// run `f` against the connection on a blocking thread
    async fn call<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut *guard).map_err(StoreError::from)
        })
        .await?
    }
}

// ==============================================================================
// row mapping
// ==============================================================================

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn sensor_from_row(row: &Row) -> rusqlite::Result<Sensor> {
    Ok(Sensor {
        hardware_id: row.get(0)?,
        friendly_name: row.get(1)?,
        alert_threshold: row.get(2)?,
        voltage_threshold: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}

fn reading_from_row(row: &Row) -> rusqlite::Result<Reading> {
    Ok(Reading {
        sensor_id: row.get(0)?,
        temperature_c: row.get(1)?,
        voltage_v: row.get(2)?,
        timestamp: timestamp(row, 3)?,
    })
}

/// newest-first reading query; the per-sensor form stays on
/// `idx_readings_sensor_time`, the unfiltered one on `idx_readings_time`
fn find_sql(by_sensor: bool) -> String {
    let (filter, limit) = if by_sensor { ("WHERE sensor_id = ?1", "?2") } else { ("", "?1") };
    format!(
        "SELECT {READING_COLUMNS} FROM readings {filter}
         ORDER BY timestamp_ms DESC, id DESC
         LIMIT {limit}"
    )
}

fn select_sensor(conn: &Connection, hardware_id: &str) -> rusqlite::Result<Sensor> {
    conn.query_row(
        &format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE hardware_id = ?1"),
        [hardware_id],
        sensor_from_row,
    )
}

// ==============================================================================
// sensor registry
// ==============================================================================

#[async_trait]
impl SensorRegistry for SqliteStore {
    async fn upsert_insert_only(
        &self,
        hardware_id: &str,
        defaults: &SensorDefaults,
    ) -> Result<Sensor, StoreError> {
        let hardware_id = hardware_id.to_string();
        let defaults = defaults.clone();
        let now = now_millis().timestamp_millis();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                &format!(
                    "INSERT INTO sensors ({SENSOR_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(hardware_id) DO NOTHING"
                ),
                params![
                    hardware_id,
                    defaults.friendly_name,
                    defaults.alert_threshold,
                    defaults.voltage_threshold,
                    now
                ],
            )?;
            let sensor = select_sensor(&tx, &hardware_id)?;
            tx.commit()?;
            if inserted > 0 {
                log::info!("registered new sensor {} with default configuration", hardware_id);
            }
            Ok(sensor)
        })
        .await
    }

    async fn upsert_full(&self, hardware_id: &str, patch: &SensorPatch) -> Result<Sensor, StoreError> {
        let hardware_id = hardware_id.to_string();
        let patch = patch.clone();
        let now = now_millis().timestamp_millis();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO sensors ({SENSOR_COLUMNS})
                     VALUES (?1, COALESCE(?2, ?1), COALESCE(?3, ?6), COALESCE(?4, ?7), ?5, ?5)
                     ON CONFLICT(hardware_id) DO UPDATE SET
                         friendly_name = COALESCE(?2, friendly_name),
                         alert_threshold = COALESCE(?3, alert_threshold),
                         voltage_threshold = COALESCE(?4, voltage_threshold),
                         updated_at = ?5"
                ),
                params![
                    hardware_id,
                    patch.friendly_name,
                    patch.alert_threshold,
                    patch.voltage_threshold,
                    now,
                    DEFAULT_ALERT_THRESHOLD,
                    DEFAULT_VOLTAGE_THRESHOLD
                ],
            )?;
            let sensor = select_sensor(&tx, &hardware_id)?;
            tx.commit()?;
            Ok(sensor)
        })
        .await
    }

    async fn all_sensors(&self) -> Result<Vec<Sensor>, StoreError> {
        self.call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SENSOR_COLUMNS} FROM sensors ORDER BY rowid"
            ))?;
            let sensors = stmt
                .query_map([], sensor_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sensors)
        })
        .await
    }
}

// ==============================================================================
// reading log
// ==============================================================================

#[async_trait]
impl ReadingStore for SqliteStore {
    async fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let reading = reading.clone();
        self.call(move |conn| {
            conn.execute(
                &format!("INSERT INTO readings ({READING_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
                params![
                    reading.sensor_id,
                    reading.temperature_c,
                    reading.voltage_v,
                    reading.timestamp.timestamp_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_readings(
        &self,
        filter: &ReadingFilter,
        limit: usize,
    ) -> Result<Vec<Reading>, StoreError> {
        let sensor_id = filter.sensor_id.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(&find_sql(sensor_id.is_some()))?;
            let rows = match &sensor_id {
                Some(id) => stmt.query_map(params![id, limit], reading_from_row)?,
                None => stmt.query_map(params![limit], reading_from_row)?,
            };
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn latest_for(&self, sensor_id: &str) -> Result<Option<Reading>, StoreError> {
        let sensor_id = sensor_id.to_string();
        self.call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {READING_COLUMNS} FROM readings
                     WHERE sensor_id = ?1
                     ORDER BY timestamp_ms DESC, id DESC
                     LIMIT 1"
                ),
                [sensor_id],
                reading_from_row,
            )
            .optional()
        })
        .await
    }
}
