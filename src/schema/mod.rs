//! Schema cache
//!
//! Lazily fetches and memoizes each entity's field schema together with its
//! all-fields projection. Describing is a full round trip, so it happens at
//! most once per entity until the entry is invalidated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{RecordsError, RecordsResult, TransportError};
use crate::registry::{UrlRole, UrlTemplateRegistry};
use crate::transport::Transport;

/// Field type that cannot be requested in a flat field list
pub const LOCATION_TYPE: &str = "location";

/// One field of an entity schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default)]
    pub nillable: bool,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub updateable: bool,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub external_id: bool,
}

impl FieldDescriptor {
    /// Create a descriptor with only a name and a type
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            label: None,
            length: None,
            nillable: false,
            createable: false,
            updateable: false,
            custom: false,
            external_id: false,
        }
    }

    /// Whether the field is a compound location
    pub fn is_location(&self) -> bool {
        self.field_type == LOCATION_TYPE
    }
}

/// Comma-joined names of every field that can be selected flatly, in schema order
pub fn all_fields(fields: &[FieldDescriptor]) -> String {
    fields
        .iter()
        .filter(|f| !f.is_location())
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full schema of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescription {
    pub name: String,
    pub label: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    /// Projection of every selectable field, see [`all_fields`]
    pub all_fields: String,
}

impl EntityDescription {
    /// Build a description, deriving the projection from `fields`
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let all_fields = all_fields(&fields);
        Self {
            name: name.into(),
            label: None,
            fields,
            all_fields,
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields flagged as external ids, usable for upserts
    pub fn external_id_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.external_id)
    }

    /// Query text selecting every selectable field
    pub fn select_all_query(&self) -> String {
        format!("SELECT {} FROM {}", self.all_fields, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct WireDescription {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    fields: Vec<FieldDescriptor>,
}

/// A describe response is either a bare field list or an object wrapping one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescribePayload {
    Fields(Vec<FieldDescriptor>),
    Object(WireDescription),
}

/// Parse a describe response for `entity`
pub fn parse_description(
    entity: &str,
    payload: serde_json::Value,
) -> Result<EntityDescription, TransportError> {
    let payload: DescribePayload =
        serde_json::from_value(payload).map_err(|e| TransportError::Decode(e.to_string()))?;

    Ok(match payload {
        DescribePayload::Fields(fields) => EntityDescription::new(entity, fields),
        DescribePayload::Object(wire) => {
            let mut description =
                EntityDescription::new(wire.name.unwrap_or_else(|| entity.to_string()), wire.fields);
            description.label = wire.label;
            description
        }
    })
}

type Slot = Arc<OnceCell<Arc<EntityDescription>>>;

/// Memoized entity descriptions.
///
/// Each entity gets its own `OnceCell`, so concurrent first requests for the
/// same entity share one fetch while different entities load independently.
pub struct SchemaCache {
    transport: Arc<dyn Transport>,
    registry: Arc<UrlTemplateRegistry>,
    entries: Mutex<HashMap<String, Slot>>,
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<UrlTemplateRegistry>) -> Self {
        Self {
            transport,
            registry,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn slot(&self, entity: &str) -> Slot {
        Arc::clone(self.entries().entry(entity.to_string()).or_default())
    }

    /// The memoized description, without fetching
    pub fn cached(&self, entity: &str) -> Option<Arc<EntityDescription>> {
        self.entries()
            .get(entity)
            .and_then(|slot| slot.get().cloned())
    }

    /// Names of every entity currently described
    pub fn cached_entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Describe `entity`, fetching its schema on first use
    pub async fn describe(&self, entity: &str) -> RecordsResult<Arc<EntityDescription>> {
        if let Some(description) = self.cached(entity) {
            debug!("Schema cache hit for {}", entity);
            return Ok(description);
        }

        let uri = self.registry.url_for(entity, UrlRole::Describe)?;
        let slot = self.slot(entity);
        slot.get_or_try_init(|| self.fetch(entity, uri.as_str()))
            .await
            .cloned()
    }

    async fn fetch(&self, entity: &str, uri: &str) -> RecordsResult<Arc<EntityDescription>> {
        let schema_error = |source| RecordsError::SchemaFetch {
            entity: entity.to_string(),
            source,
        };

        let payload = self
            .transport
            .get(uri, &Vec::new())
            .await
            .map_err(schema_error)?;
        let description = parse_description(entity, payload).map_err(schema_error)?;

        info!(
            "Described {} ({} fields)",
            entity,
            description.fields.len()
        );
        Ok(Arc::new(description))
    }

    /// Drop one entity so its next `describe` fetches again
    pub fn invalidate(&self, entity: &str) -> bool {
        let removed = self.entries().remove(entity).is_some();
        if removed {
            debug!("Invalidated schema for {}", entity);
        }
        removed
    }

    /// Drop every cached description
    pub fn clear(&self) {
        self.entries().clear();
        info!("Schema cache cleared");
    }
}
