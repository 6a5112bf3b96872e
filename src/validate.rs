//! input normalisation shared by the handlers
//!
//! field devices send everything as query-string text, the client app sends
//! json; both shapes end up here before anything touches the store.

use crate::error::ServiceError;
use serde::Deserialize;

/// a numeric field as it arrived: a json number or text to be parsed
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        NumericInput::Number(value)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

impl NumericInput {
    /// finite `f64`; blank, unparseable, NaN and infinite values are rejected
    pub fn finite(&self, field: &str) -> Result<f64, ServiceError> {
        let value = match self {
            NumericInput::Number(n) => *n,
            NumericInput::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                ServiceError::validation(format!("{field} must be a number, got {text:?}"))
            })?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ServiceError::validation(format!("{field} must be a finite number")))
        }
    }
}

/// required, non-empty (after trimming) text field
pub fn required_text(value: Option<&str>, field: &str) -> Result<String, ServiceError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ServiceError::validation(format!("{field} is required"))),
    }
}

/// optional finite number; absent stays absent
pub fn optional_finite(value: Option<&NumericInput>, field: &str) -> Result<Option<f64>, ServiceError> {
    value.map(|v| v.finite(field)).transpose()
}

/// bounds for a `limit` query parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimitPolicy {
    pub default: usize,
    pub max: usize,
}

impl LimitPolicy {
    /// absent -> default; non-numeric, zero or negative -> validation error;
    /// anything above `max` is clamped
    pub fn resolve(&self, raw: Option<&str>) -> Result<usize, ServiceError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(self.default.min(self.max));
        };
        match raw.parse::<i64>() {
            Ok(n) if n > 0 => Ok(usize::try_from(n).unwrap_or(usize::MAX).min(self.max)),
            _ => Err(ServiceError::validation(format!(
                "limit must be a positive integer, got {raw:?}"
            ))),
        }
    }
}
