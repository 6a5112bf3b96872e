//! ==============================================================================
//! main.rs - cold-chain telemetry host entry point
//! ==============================================================================
//!
//! purpose:
//!     this is the backend the refrigeration-unit sensors report to.
//!     each device periodically sends its temperature and supply voltage over
//!     http; the host stores the reading, registers unknown devices, raises
//!     alerts, and serves current/historical views to the client app.
//!
//! responsibilities:
//!     - load configuration (config/host.toml)
//!     - initialize logging
//!     - open the store (sqlite file or in-memory)
//!     - serve the http api until ctrl-c
//!
//! relationships:
//!     - uses: config.rs (host.toml schema)
//!     - uses: store/ (sensor registry + reading log backends)
//!     - uses: web.rs (router, handlers, server loop)
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                     │
//!     │                                                              │
//!     │   field devices ──GET/POST /api/data──┐                      │
//!     │                                       ▼                      │
//!     │                              ┌────────────────┐              │
//!     │   client app ──GET /api/*──▶ │  web server    │ <- web.rs    │
//!     │                              │  (port 3000)   │              │
//!     │                              └───────┬────────┘              │
//!     │           ┌───────────────┬──────────┼─────────────┐         │
//!     │           ▼               ▼          ▼             ▼         │
//!     │      ┌─────────┐   ┌──────────┐ ┌─────────┐ ┌──────────┐     │
//!     │      │ ingest  │   │ registry │ │ latest  │ │ history  │     │
//!     │      └────┬────┘   └────┬─────┘ └────┬────┘ └────┬─────┘     │
//!     │           └─────────────┴─────┬──────┴───────────┘           │
//!     │                               ▼                              │
//!     │                    ┌─────────────────────┐                   │
//!     │                    │  Arc<dyn Store>     │ <- store/         │
//!     │                    │  sensors + readings │                   │
//!     │                    └─────────────────────┘                   │
//!     └──────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

mod alerts;
mod config;
mod domain;
mod error;
mod history;
mod ingest;
mod latest;
mod registry;
mod store;
mod validate;
mod web;

use anyhow::Result;

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration (logged once logging is up)
    let (config, origin) = config::HostConfig::load_or_default();

    // step 2: logging - RUST_LOG wins over host.toml
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("===========================================================");
    log::info!("  Cold-Chain Telemetry Host");
    log::info!("===========================================================");
    config.log_summary(&origin);

    // step 3: open the store
    let store = match store::open(&config.store) {
        Ok(s) => {
            log::info!("[STARTUP] ✓ Store ready");
            s
        }
        Err(e) => {
            log::error!("[ERROR] Fatal: failed to open store: {:#}", e);
            return Err(e);
        }
    };

    // step 4: serve until ctrl-c
    let state = web::AppState::new(store, &config);
    web::serve(&config.server.bind, state).await?;

    log::info!("[SHUTDOWN] ✓ Stopped");
    Ok(())
}
