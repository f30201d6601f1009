//! CRUD dispatcher
//!
//! Turns a logical operation on an entity into exactly one transport call.
//! Records are addressed either by primary id, through the entity's row
//! template, or by an external-id field, through a path composed under the
//! entity's collection URL.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{RecordsError, RecordsResult, TransportError};
use crate::registry::{EntityMap, UrlRole, UrlTemplateRegistry};
use crate::schema::{EntityDescription, SchemaCache};
use crate::transport::{QueryParams, Transport};

/// One error reported by the service for a rejected mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorEntry {
    #[serde(default)]
    pub message: String,
    #[serde(
        default,
        rename = "errorCode",
        alias = "statusCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_code: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<String>,
}

/// Outcome of a create or upsert.
///
/// A transport-level success can still carry `success: false` with errors;
/// check both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "error", deserialize_with = "null_as_default")]
    pub errors: Vec<ApiErrorEntry>,
    /// Set by upserts that created a new record
    #[serde(default)]
    pub created: bool,
}

impl MutationResult {
    /// Whether the service accepted the mutation
    pub fn is_success(&self) -> bool {
        self.success && self.errors.is_empty()
    }

    /// The affected record id, or the service's errors as `RecordsError::Application`
    pub fn into_result(self) -> RecordsResult<String> {
        if self.is_success() {
            Ok(self.id)
        } else {
            Err(RecordsError::Application(self.errors))
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn field_params(fields: &[&str]) -> QueryParams {
    if fields.is_empty() {
        Vec::new()
    } else {
        vec![("fields".to_string(), fields.join(","))]
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> RecordsResult<T> {
    serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()).into())
}

fn encode<B: Serialize + ?Sized>(body: &B) -> RecordsResult<Value> {
    serde_json::to_value(body).map_err(|e| TransportError::Encode(e.to_string()).into())
}

/// Dispatches CRUD and upsert operations against entity endpoints.
///
/// Every operation resolves the entity through the registry first; an
/// unregistered entity fails with `RecordsError::UnknownEntity` before any
/// transport call.
pub struct CrudDispatcher {
    transport: Arc<dyn Transport>,
    registry: Arc<UrlTemplateRegistry>,
    schema: Arc<SchemaCache>,
}

impl CrudDispatcher {
    /// Create a dispatcher over existing caches
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<UrlTemplateRegistry>,
        schema: Arc<SchemaCache>,
    ) -> Self {
        Self {
            transport,
            registry,
            schema,
        }
    }

    /// Build the registry and schema cache for `config` and run discovery
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use records_sdk::{ClientConfig, CrudDispatcher};
    /// # use records_sdk::transport::api::ApiTransport;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ClientConfig::new("https://example.my.salesforce.com")
    ///     .with_access_token("token");
    /// let transport = Arc::new(ApiTransport::from_config(&config)?);
    /// let records = CrudDispatcher::connect(transport, &config).await?;
    ///
    /// let account: serde_json::Value = records.read("001xx", "Account", &["Name"]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(transport: Arc<dyn Transport>, config: &ClientConfig) -> RecordsResult<Self> {
        config.validate()?;

        let registry = Arc::new(UrlTemplateRegistry::from_config(transport.clone(), config));
        registry.ensure_loaded().await?;
        let schema = Arc::new(SchemaCache::new(transport.clone(), registry.clone()));

        Ok(Self::new(transport, registry, schema))
    }

    pub fn registry(&self) -> &Arc<UrlTemplateRegistry> {
        &self.registry
    }

    pub fn schema(&self) -> &Arc<SchemaCache> {
        &self.schema
    }

    fn row_uri(&self, entity: &str, id: &str) -> RecordsResult<String> {
        Ok(self.registry.url_for(entity, UrlRole::RowTemplate)?.render(id))
    }

    fn collection_uri(&self, entity: &str) -> RecordsResult<String> {
        Ok(self
            .registry
            .url_for(entity, UrlRole::Collection)?
            .as_str()
            .to_string())
    }

    fn external_uri(&self, entity: &str, external_field: &str, id: &str) -> RecordsResult<String> {
        Ok(format!(
            "{}/{}/{}",
            self.collection_uri(entity)?,
            external_field,
            id
        ))
    }

    /// Describe one entity (memoized)
    pub async fn describe(&self, entity: &str) -> RecordsResult<Arc<EntityDescription>> {
        self.schema.describe(entity).await
    }

    /// Every registered entity
    pub async fn describe_all(&self) -> RecordsResult<Arc<EntityMap>> {
        self.registry.list_all().await
    }

    /// Read a record by primary id. An empty `fields` returns the service's default set.
    pub async fn read<T: DeserializeOwned>(
        &self,
        id: &str,
        entity: &str,
        fields: &[&str],
    ) -> RecordsResult<T> {
        let uri = self.row_uri(entity, id)?;
        debug!("Reading {} {}", entity, id);
        let value = self.transport.get(&uri, &field_params(fields)).await?;
        decode(value)
    }

    /// Create a record
    pub async fn insert<B: Serialize + ?Sized>(
        &self,
        entity: &str,
        body: &B,
    ) -> RecordsResult<MutationResult> {
        let uri = self.collection_uri(entity)?;
        let body = encode(body)?;
        debug!("Inserting {}", entity);
        let value = self.transport.post(&uri, &Vec::new(), &body).await?;
        decode(value)
    }

    /// Partially update a record by primary id
    pub async fn update<B: Serialize + ?Sized>(
        &self,
        id: &str,
        entity: &str,
        body: &B,
    ) -> RecordsResult<()> {
        let uri = self.row_uri(entity, id)?;
        let body = encode(body)?;
        debug!("Updating {} {}", entity, id);
        self.transport.patch(&uri, &Vec::new(), &body).await?;
        Ok(())
    }

    /// Delete a record by primary id
    pub async fn delete(&self, id: &str, entity: &str) -> RecordsResult<()> {
        let uri = self.row_uri(entity, id)?;
        debug!("Deleting {} {}", entity, id);
        self.transport.delete(&uri, &Vec::new()).await?;
        Ok(())
    }

    /// Read a record by the value of an external-id field
    pub async fn read_by_external_id<T: DeserializeOwned>(
        &self,
        id: &str,
        external_field: &str,
        entity: &str,
        fields: &[&str],
    ) -> RecordsResult<T> {
        let uri = self.external_uri(entity, external_field, id)?;
        debug!("Reading {} by {}={}", entity, external_field, id);
        let value = self.transport.get(&uri, &field_params(fields)).await?;
        decode(value)
    }

    /// Create or update a record matched by an external-id field.
    ///
    /// The service answers an update of an existing record without a body;
    /// that reply becomes a successful result with `created: false` and no id.
    pub async fn upsert_by_external_id<B: Serialize + ?Sized>(
        &self,
        id: &str,
        external_field: &str,
        entity: &str,
        body: &B,
    ) -> RecordsResult<MutationResult> {
        let uri = self.external_uri(entity, external_field, id)?;
        let body = encode(body)?;
        debug!("Upserting {} by {}={}", entity, external_field, id);
        match self.transport.patch(&uri, &Vec::new(), &body).await? {
            Some(value) => decode(value),
            None => Ok(MutationResult {
                success: true,
                ..Default::default()
            }),
        }
    }

    /// Delete a record matched by an external-id field
    pub async fn delete_by_external_id(
        &self,
        id: &str,
        external_field: &str,
        entity: &str,
    ) -> RecordsResult<()> {
        let uri = self.external_uri(entity, external_field, id)?;
        debug!("Deleting {} by {}={}", entity, external_field, id);
        self.transport.delete(&uri, &Vec::new()).await?;
        Ok(())
    }
}
