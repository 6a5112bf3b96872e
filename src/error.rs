//! ==============================================================================
//! error.rs - error taxonomy and http mapping
//! ==============================================================================
//!
//! two kinds of failure reach a caller:
//!     - validation: malformed or missing input, reported back verbatim (400)
//!     - internal:   the store failed, logged here and reported generically (500)
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// failure of a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("blocking store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("store connection lock poisoned")]
    Poisoned,
}

/// failure of a service operation
#[derive(Debug, Error)]
pub enum ServiceError {
    /// user-correctable input problem; the message is shown to the caller
    #[error("{0}")]
    Validation(String),

    /// store failure; `action` is the only part the caller gets to see
    #[error("failed to {action}: {source}")]
    Internal {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// adapter for `map_err` on store calls
    pub fn internal(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Internal { action, source }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ServiceError::Internal { action, source } => {
                log::error!("failed to {}: {}", action, source);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to {}", action)).into_response()
            }
        }
    }
}
