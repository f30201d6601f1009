//! Transport abstraction
//!
//! Defines the Transport trait consumed by the registry, the schema cache and
//! the dispatcher, and its implementations:
//! - ApiTransport: HTTP API over reqwest (default, feature `api-backend`)
//! - MockTransport: scripted in-memory responses (tests and offline use)

use async_trait::async_trait;
use serde_json::Value;

pub use crate::error::TransportError;

/// Ordered query parameters attached to a request
pub type QueryParams = Vec<(String, String)>;

/// Trait for transports
///
/// Implementations handle authentication, body serialization and response
/// decoding. URIs are either absolute or relative to the transport's
/// instance URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read a resource
    async fn get(&self, uri: &str, params: &QueryParams) -> Result<Value, TransportError>;

    /// Create a resource
    async fn post(
        &self,
        uri: &str,
        params: &QueryParams,
        body: &Value,
    ) -> Result<Value, TransportError>;

    /// Partially update a resource. `None` means the service sent no body.
    async fn patch(
        &self,
        uri: &str,
        params: &QueryParams,
        body: &Value,
    ) -> Result<Option<Value>, TransportError>;

    /// Delete a resource
    async fn delete(&self, uri: &str, params: &QueryParams) -> Result<(), TransportError>;
}

/// HTTP verb of a transport call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[cfg(feature = "api-backend")]
pub mod api;

pub mod mock;
