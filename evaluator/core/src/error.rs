//! Evaluation Errors
//!
//! Only configuration-level problems surface to callers. Everything that can
//! go wrong inside a single dimension is absorbed by the execution engine and
//! reported through `fallbacks_used` instead.

use thiserror::Error;

/// Errors returned by [`crate::Evaluator::evaluate`]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvaluationError {
    /// No scoring backend is registered, so nothing can be dispatched
    #[error("request {request_id}: no scoring backends are registered")]
    NoBackends {
        /// Request that could not start
        request_id: String,
    },

    /// The request is structurally invalid
    #[error("request {request_id}: invalid `{field}`: {reason}")]
    InvalidRequest {
        /// Request that failed validation
        request_id: String,
        /// Name of the violating field
        field: &'static str,
        /// Human-readable explanation
        reason: String,
    },
}

impl EvaluationError {
    /// Request id the error refers to
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::NoBackends { request_id } | Self::InvalidRequest { request_id, .. } => {
                request_id
            }
        }
    }

    /// Violating field, if the error is a validation failure
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::NoBackends { .. } => None,
            Self::InvalidRequest { field, .. } => Some(field),
        }
    }
}
