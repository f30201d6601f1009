//! Error types for records access
//!
//! `TransportError` is what a [`Transport`](crate::transport::Transport) reports.
//! `RecordsError` is what the registry, schema cache and dispatcher return to
//! callers; transport failures are wrapped, never reinterpreted.

use thiserror::Error;

use crate::dispatcher::ApiErrorEntry;

/// Errors raised by a transport implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-success status
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded into the requested shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

impl TransportError {
    /// HTTP status of the failure, when the service produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors returned by the registry, the schema cache and the dispatcher
#[derive(Error, Debug)]
pub enum RecordsError {
    /// Entity (or the endpoint role it needs) is not in the registry.
    /// Raised locally; no transport call was issued.
    #[error("Unknown entity '{entity}': {reason}")]
    UnknownEntity { entity: String, reason: String },

    /// The discovery call failed or returned an unusable payload
    #[error("Entity discovery failed: {0}")]
    Discovery(#[source] TransportError),

    /// Fetching an entity's schema failed
    #[error("Failed to describe '{entity}': {source}")]
    SchemaFetch {
        entity: String,
        #[source]
        source: TransportError,
    },

    /// Pass-through failure of a CRUD call
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service accepted the request but rejected the mutation
    #[error("Mutation rejected: {}", format_api_errors(.0))]
    Application(Vec<ApiErrorEntry>),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for records operations
pub type RecordsResult<T> = Result<T, RecordsError>;

impl RecordsError {
    pub(crate) fn unknown_entity(entity: &str, reason: impl Into<String>) -> Self {
        RecordsError::UnknownEntity {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure was a local registry miss
    pub fn is_unknown_entity(&self) -> bool {
        matches!(self, RecordsError::UnknownEntity { .. })
    }
}

fn format_api_errors(errors: &[ApiErrorEntry]) -> String {
    if errors.is_empty() {
        return "no error details reported".to_string();
    }
    errors
        .iter()
        .map(|e| match &e.error_code {
            Some(code) => format!("{}: {}", code, e.message),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
