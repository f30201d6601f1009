//! Client configuration
//!
//! Connection settings for a records service: where it lives, which API
//! version to discover against, and how row templates mark the id slot.

use serde::{Deserialize, Serialize};

use crate::error::{RecordsError, RecordsResult};

/// Configuration for connecting to a records service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the service instance
    pub instance_url: String,

    /// API version used to build the default discovery path
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub access_token: Option<String>,

    /// Token marking the id slot in row templates
    #[serde(default = "default_id_placeholder")]
    pub id_placeholder: String,

    /// Override for the discovery endpoint path
    #[serde(default)]
    pub discovery_path: Option<String>,

    /// Request timeout in seconds (applied by the HTTP transport)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_version() -> String {
    "59.0".to_string()
}

fn default_id_placeholder() -> String {
    "{ID}".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            instance_url: String::new(),
            api_version: default_api_version(),
            access_token: None,
            id_placeholder: default_id_placeholder(),
            discovery_path: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ClientConfig {
    /// Create a config for an instance with default settings
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            ..Default::default()
        }
    }

    /// Set the access token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the API version
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the id placeholder token
    pub fn with_id_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.id_placeholder = placeholder.into();
        self
    }

    /// Override the discovery path
    pub fn with_discovery_path(mut self, path: impl Into<String>) -> Self {
        self.discovery_path = Some(path.into());
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// URI of the discovery endpoint
    pub fn discovery_uri(&self) -> String {
        match &self.discovery_path {
            Some(path) => path.clone(),
            None => format!("/services/data/v{}/sobjects", self.api_version),
        }
    }

    /// Check the settings the registry and transports rely on
    pub fn validate(&self) -> RecordsResult<()> {
        if self.instance_url.trim().is_empty() {
            return Err(RecordsError::Config(
                "Instance URL cannot be empty".to_string(),
            ));
        }
        if self.id_placeholder.is_empty() {
            return Err(RecordsError::Config(
                "Id placeholder cannot be empty".to_string(),
            ));
        }
        if self.discovery_path.is_none() && self.api_version.trim().is_empty() {
            return Err(RecordsError::Config(
                "API version is required when no discovery path is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a config from TOML text
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(content: &str) -> RecordsResult<Self> {
        let config: ClientConfig = toml::from_str(content)
            .map_err(|e| RecordsError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> RecordsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecordsError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://example.my.salesforce.com");
        assert_eq!(config.api_version, "59.0");
        assert_eq!(config.id_placeholder, "{ID}");
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.discovery_uri(), "/services/data/v59.0/sobjects");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("https://example.com")
            .with_access_token("token")
            .with_api_version("61.0")
            .with_timeout(5);
        assert_eq!(config.access_token.as_deref(), Some("token"));
        assert_eq!(config.discovery_uri(), "/services/data/v61.0/sobjects");
        assert_eq!(config.timeout_seconds, 5);

        let config = config.with_discovery_path("/api/entities");
        assert_eq!(config.discovery_uri(), "/api/entities");
    }

    #[test]
    fn test_validate_rejects_empty_values() {
        assert!(matches!(
            ClientConfig::new("  ").validate(),
            Err(RecordsError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::new("https://example.com")
                .with_id_placeholder("")
                .validate(),
            Err(RecordsError::Config(_))
        ));
        assert!(
            ClientConfig::new("https://example.com")
                .with_api_version("")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"instance_url":"https://example.com"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("https://example.com"));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "instance_url = \"https://example.com\"\naccess_token = \"abc\"\nid_placeholder = \"{{id}}\""
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.id_placeholder, "{id}");
        assert_eq!(config.api_version, "59.0");
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_from_toml_str_invalid() {
        assert!(matches!(
            ClientConfig::from_toml_str("instance_url = 3"),
            Err(RecordsError::Config(_))
        ));
    }
}
