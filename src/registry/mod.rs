//! URL template registry
//!
//! Knows, for every entity the service exposes, where its describe, row and
//! collection endpoints live. Filled by one discovery call and read by every
//! CRUD call afterwards.

mod template;

pub use template::{UrlRole, UrlTemplate};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{RecordsError, RecordsResult, TransportError};
use crate::transport::Transport;

/// Endpoint templates of one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityUrlSet {
    pub describe: Option<UrlTemplate>,
    pub row_template: Option<UrlTemplate>,
    pub collection: Option<UrlTemplate>,
}

impl EntityUrlSet {
    /// Template for a role, if advertised
    pub fn get(&self, role: UrlRole) -> Option<&UrlTemplate> {
        match role {
            UrlRole::Describe => self.describe.as_ref(),
            UrlRole::RowTemplate => self.row_template.as_ref(),
            UrlRole::Collection => self.collection.as_ref(),
        }
    }

    fn set(&mut self, role: UrlRole, template: UrlTemplate) {
        match role {
            UrlRole::Describe => self.describe = Some(template),
            UrlRole::RowTemplate => self.row_template = Some(template),
            UrlRole::Collection => self.collection = Some(template),
        }
    }
}

/// Coarse descriptor of one entity, as reported by discovery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityMetadata {
    pub name: String,
    pub label: Option<String>,
    pub key_prefix: Option<String>,
    pub custom: bool,
    pub createable: bool,
    pub updateable: bool,
    pub deletable: bool,
    pub queryable: bool,
    pub urls: EntityUrlSet,
}

impl EntityMetadata {
    /// Create metadata with no endpoints
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attach an endpoint template
    pub fn with_url(mut self, role: UrlRole, template: UrlTemplate) -> Self {
        self.urls.set(role, template);
        self
    }
}

/// Entity name → metadata
pub type EntityMap = HashMap<String, EntityMetadata>;

#[derive(Debug, Default, Deserialize)]
struct WireUrls {
    #[serde(default)]
    describe: Option<String>,
    #[serde(default, rename = "rowTemplate", alias = "row-template")]
    row_template: Option<String>,
    #[serde(default, rename = "sobject", alias = "collection")]
    collection: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    key_prefix: Option<String>,
    #[serde(default)]
    custom: bool,
    #[serde(default)]
    createable: bool,
    #[serde(default)]
    updateable: bool,
    #[serde(default)]
    deletable: bool,
    #[serde(default)]
    queryable: bool,
    #[serde(default)]
    urls: WireUrls,
}

impl WireEntity {
    fn into_metadata(self, name: String, placeholder: &str) -> EntityMetadata {
        let parse = |raw: Option<String>| raw.map(|r| UrlTemplate::parse(r, placeholder));
        EntityMetadata {
            name,
            label: self.label,
            key_prefix: self.key_prefix,
            custom: self.custom,
            createable: self.createable,
            updateable: self.updateable,
            deletable: self.deletable,
            queryable: self.queryable,
            urls: EntityUrlSet {
                describe: parse(self.urls.describe),
                row_template: parse(self.urls.row_template),
                collection: parse(self.urls.collection),
            },
        }
    }
}

/// The two discovery shapes: the service's native listing, or a plain
/// name-keyed mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DiscoveryPayload {
    Listing { sobjects: Vec<WireEntity> },
    Mapping(HashMap<String, WireEntity>),
}

/// Parse a discovery response into an entity map
pub fn parse_discovery(payload: serde_json::Value, placeholder: &str) -> RecordsResult<EntityMap> {
    let payload: DiscoveryPayload = serde_json::from_value(payload)
        .map_err(|e| RecordsError::Discovery(TransportError::Decode(e.to_string())))?;

    let mut entities = EntityMap::new();
    match payload {
        DiscoveryPayload::Listing { sobjects } => {
            for entity in sobjects {
                let name = entity.name.clone().ok_or_else(|| {
                    RecordsError::Discovery(TransportError::Decode(
                        "Entity listing entry without a name".to_string(),
                    ))
                })?;
                entities.insert(name.clone(), entity.into_metadata(name, placeholder));
            }
        }
        DiscoveryPayload::Mapping(map) => {
            for (key, entity) in map {
                entities.insert(key.clone(), entity.into_metadata(key, placeholder));
            }
        }
    }

    Ok(entities)
}

/// Registry of per-entity endpoint templates.
///
/// Population goes through a single `OnceCell`, so concurrent first callers
/// share one discovery request. A failed discovery leaves the cell empty.
pub struct UrlTemplateRegistry {
    transport: Arc<dyn Transport>,
    discovery_uri: String,
    id_placeholder: String,
    entities: RwLock<Arc<OnceCell<Arc<EntityMap>>>>,
}

impl UrlTemplateRegistry {
    /// Create an empty registry
    pub fn new(
        transport: Arc<dyn Transport>,
        discovery_uri: impl Into<String>,
        id_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            discovery_uri: discovery_uri.into(),
            id_placeholder: id_placeholder.into(),
            entities: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    /// Create an empty registry from client settings
    pub fn from_config(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self::new(transport, config.discovery_uri(), config.id_placeholder.clone())
    }

    /// Create a registry that is already populated
    pub fn from_metadata(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        entities: impl IntoIterator<Item = EntityMetadata>,
    ) -> Self {
        let map: EntityMap = entities
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect();
        let mut registry = Self::from_config(transport, config);
        registry.entities = RwLock::new(Arc::new(OnceCell::new_with(Some(Arc::new(map)))));
        registry
    }

    /// Token marking the id slot in row templates
    pub fn id_placeholder(&self) -> &str {
        &self.id_placeholder
    }

    fn current(&self) -> Arc<OnceCell<Arc<EntityMap>>> {
        match self.entities.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn loaded(&self) -> Option<Arc<EntityMap>> {
        self.current().get().cloned()
    }

    /// Whether discovery has completed
    pub fn is_loaded(&self) -> bool {
        self.loaded().is_some()
    }

    /// Run discovery unless it already succeeded.
    ///
    /// A successful discovery that lists no entities still counts as loaded;
    /// call `reset` to discover again.
    pub async fn ensure_loaded(&self) -> RecordsResult<Arc<EntityMap>> {
        let cell = self.current();
        cell.get_or_try_init(|| self.discover()).await.cloned()
    }

    async fn discover(&self) -> RecordsResult<Arc<EntityMap>> {
        debug!("Discovering entities from {}", self.discovery_uri);
        let payload = self
            .transport
            .get(&self.discovery_uri, &Vec::new())
            .await
            .map_err(RecordsError::Discovery)?;

        let entities = parse_discovery(payload, &self.id_placeholder)?;
        info!("Discovered {} entities", entities.len());
        Ok(Arc::new(entities))
    }

    /// Every registered entity, discovering first if needed
    pub async fn list_all(&self) -> RecordsResult<Arc<EntityMap>> {
        self.ensure_loaded().await
    }

    /// Metadata for one entity, if registered
    pub fn metadata(&self, entity: &str) -> Option<EntityMetadata> {
        self.loaded().and_then(|map| map.get(entity).cloned())
    }

    /// Template for `role` of `entity`.
    ///
    /// Never triggers discovery: an unloaded registry knows no entities.
    pub fn url_for(&self, entity: &str, role: UrlRole) -> RecordsResult<UrlTemplate> {
        let map = self
            .loaded()
            .ok_or_else(|| RecordsError::unknown_entity(entity, "entity registry is not loaded"))?;

        let metadata = map
            .get(entity)
            .ok_or_else(|| RecordsError::unknown_entity(entity, "not registered"))?;

        metadata.urls.get(role).cloned().ok_or_else(|| {
            RecordsError::unknown_entity(entity, format!("no {} endpoint advertised", role))
        })
    }

    /// Forget discovered entities; the next `ensure_loaded` discovers again
    pub fn reset(&self) {
        let mut slot = match self.entities.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Arc::new(OnceCell::new());
        info!("Entity registry reset");
    }
}
