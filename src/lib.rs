//! Records SDK - typed access layer for schema-described records APIs
//!
//! Provides:
//! - Entity discovery and endpoint templates (registry)
//! - Memoized entity schemas and all-fields projections (schema cache)
//! - CRUD and external-id upserts against entity endpoints (dispatcher)
//! - A transport abstraction with an HTTP implementation

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod schema;
pub mod transport;

// Re-export commonly used types
pub use config::ClientConfig;
pub use dispatcher::{ApiErrorEntry, CrudDispatcher, MutationResult};
pub use error::{RecordsError, RecordsResult, TransportError};
pub use registry::{EntityMap, EntityMetadata, EntityUrlSet, UrlRole, UrlTemplate, UrlTemplateRegistry};
pub use schema::{EntityDescription, FieldDescriptor, SchemaCache};
#[cfg(feature = "api-backend")]
pub use transport::api::ApiTransport;
pub use transport::mock::MockTransport;
pub use transport::{Method, QueryParams, Transport};
