//! ==============================================================================
//! web.rs - http api
//! ==============================================================================
//!
//! purpose:
//!     the compatibility surface for field devices and the client app.
//!
//! routes:
//!     GET|POST /api/data            ingest one reading (plain-text ack)
//!     POST     /api/sensors/config  create/update a sensor's configuration
//!     GET      /api/latest          one current-state row per registered sensor
//!     GET      /api/history         newest readings of one sensor
//!     GET      /api/recent          newest readings of all sensors
//!     GET      /api/temperaturas    legacy alias of /api/recent
//!     GET      /api/sensors/ids     the fixed hardware-id list from host.toml
//!
//! relationships:
//!     - used by: main.rs (serve)
//!     - calls: ingest.rs, registry.rs, latest.rs, history.rs
//!     - errors: error.rs (ServiceError -> status code)
//!
//! ==============================================================================

use crate::config::{HostConfig, QueryConfig};
use crate::domain::{Reading, Sensor, SensorState};
use crate::error::ServiceError;
use crate::ingest::{self, Ingested, Submission};
use crate::registry::{self, ConfigUpdate};
use crate::store::Store;
use crate::{history, latest};

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// ==============================================================================
// shared state
// ==============================================================================
// everything a handler needs, constructed once in main. the store is the
// only thing with state of its own; nothing here is cached between requests.

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// served verbatim by /api/sensors/ids
    pub known_ids: Arc<Vec<String>>,
    pub queries: QueryConfig,
    pub show_sensor_data: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &HostConfig) -> Self {
        Self {
            store,
            known_ids: Arc::new(config.sensors.known_ids.clone()),
            queries: config.queries.clone(),
            show_sensor_data: config.logging.show_sensor_data,
        }
    }
}

// ==============================================================================
// router
// ==============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/data", get(ingest_query_handler).post(ingest_body_handler))
        .route("/api/sensors/config", post(config_handler))
        .route("/api/sensors/ids", get(ids_handler))
        .route("/api/latest", get(latest_handler))
        .route("/api/history", get(history_handler))
        .route("/api/recent", get(recent_handler))
        .route("/api/temperaturas", get(recent_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// bind and serve until ctrl-c
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    log::info!("[STARTUP] ✓ API live at http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("[SHUTDOWN] ctrl-c received, draining connections");
}

// ==============================================================================
// ingestion
// ==============================================================================

/// GET /api/data?sensorId=..&temp=..&voltage=..
/// the shape the device firmware sends
async fn ingest_query_handler(
    State(state): State<AppState>,
    query: Result<Query<Submission>, QueryRejection>,
) -> Result<&'static str, ServiceError> {
    let Query(submission) = query.map_err(|e| ServiceError::validation(e.body_text()))?;
    accept(&state, submission).await
}

/// POST /api/data
/// fields may come in the query string, a json body or a form body;
/// body fields win over query fields
async fn ingest_body_handler(
    State(state): State<AppState>,
    query: Result<Query<Submission>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ServiceError> {
    let Query(from_query) = query.map_err(|e| ServiceError::validation(e.body_text()))?;
    let from_body = parse_body(&headers, &body)?;
    accept(&state, from_body.or(from_query)).await
}

fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Submission, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Submission::default());
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let looks_like_json = body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');

    if content_type.starts_with("application/json") || looks_like_json {
        serde_json::from_slice(body)
            .map_err(|e| ServiceError::validation(format!("invalid json body: {}", e)))
    } else {
        serde_urlencoded::from_bytes(body)
            .map_err(|e| ServiceError::validation(format!("invalid form body: {}", e)))
    }
}

async fn accept(state: &AppState, submission: Submission) -> Result<&'static str, ServiceError> {
    let ingested = ingest::ingest(state.store.as_ref(), &submission).await?;

    let level = if state.show_sensor_data { log::Level::Info } else { log::Level::Debug };
    let Reading { sensor_id, temperature_c, voltage_v, .. } = &ingested.reading;
    log::log!(
        level,
        "[DATA] {} | Temp: {:.1}°C | Volt: {:.2}V | alerts: {}",
        sensor_id,
        temperature_c,
        voltage_v,
        ingested.alerts.len()
    );

    Ok(Ingested::ACK)
}

// ==============================================================================
// configuration
// ==============================================================================

#[derive(Serialize)]
struct ConfigSaved {
    message: &'static str,
    sensor: Sensor,
}

/// POST /api/sensors/config  {hardwareId, friendlyName?, alertThreshold?, voltageThreshold?}
async fn config_handler(
    State(state): State<AppState>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<ConfigSaved>, ServiceError> {
    let Json(update) = body.map_err(|e| ServiceError::validation(e.body_text()))?;
    let sensor = registry::update_config(state.store.as_ref(), &update).await?;
    Ok(Json(ConfigSaved { message: "sensor configuration saved", sensor }))
}

/// GET /api/sensors/ids
async fn ids_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.known_ids.as_ref().clone())
}

// ==============================================================================
// queries
// ==============================================================================

/// GET /api/latest
async fn latest_handler(State(state): State<AppState>) -> Result<Json<Vec<SensorState>>, ServiceError> {
    Ok(Json(latest::latest_states(state.store.as_ref()).await?))
}

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(rename = "sensorId")]
    sensor_id: Option<String>,
    limit: Option<String>,
}

/// GET /api/history?sensorId=..&limit=..
async fn history_handler(
    State(state): State<AppState>,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<Reading>>, ServiceError> {
    let Query(params) = query.map_err(|e| ServiceError::validation(e.body_text()))?;
    let readings = history::history(
        state.store.as_ref(),
        params.sensor_id.as_deref(),
        params.limit.as_deref(),
        state.queries.history(),
    )
    .await?;
    Ok(Json(readings))
}

#[derive(Deserialize)]
struct RecentParams {
    limit: Option<String>,
}

/// GET /api/recent?limit=..
async fn recent_handler(
    State(state): State<AppState>,
    query: Result<Query<RecentParams>, QueryRejection>,
) -> Result<Json<Vec<Reading>>, ServiceError> {
    let Query(params) = query.map_err(|e| ServiceError::validation(e.body_text()))?;
    let readings =
        history::recent(state.store.as_ref(), params.limit.as_deref(), state.queries.recent()).await?;
    Ok(Json(readings))
}
