//! bounded, newest-first reading queries
//!
//! - `history`: one sensor, `limit` defaults to 200
//! - `recent`:  every sensor, `limit` defaults to 50

use crate::domain::Reading;
use crate::error::ServiceError;
use crate::store::{ReadingFilter, Store};
use crate::validate::{required_text, LimitPolicy};

/// the newest readings of one sensor
pub async fn history(
    store: &dyn Store,
    sensor_id: Option<&str>,
    limit: Option<&str>,
    policy: LimitPolicy,
) -> Result<Vec<Reading>, ServiceError> {
    let sensor_id = required_text(sensor_id, "sensorId")?;
    let limit = policy.resolve(limit)?;
    store
        .find_readings(&ReadingFilter::sensor(sensor_id), limit)
        .await
        .map_err(ServiceError::internal("load reading history"))
}

/// the newest readings across all sensors
pub async fn recent(
    store: &dyn Store,
    limit: Option<&str>,
    policy: LimitPolicy,
) -> Result<Vec<Reading>, ServiceError> {
    let limit = policy.resolve(limit)?;
    store
        .find_readings(&ReadingFilter::any(), limit)
        .await
        .map_err(ServiceError::internal("load recent readings"))
}
