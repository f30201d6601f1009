//! API transport
//!
//! Implements Transport for a records service reachable over HTTP.
//! Relative URIs (the form the discovery endpoint hands out) are joined onto
//! the instance URL; absolute URIs are used as-is.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Method, QueryParams, Transport, TransportError};
use crate::config::ClientConfig;
use crate::error::RecordsResult;

/// Transport that talks to the records service over HTTP
pub struct ApiTransport {
    instance_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl ApiTransport {
    /// Create a new API transport
    ///
    /// # Arguments
    ///
    /// * `instance_url` - Base URL of the service (e.g., "https://example.my.salesforce.com")
    /// * `access_token` - Optional bearer token for authentication
    ///
    /// # Example
    ///
    /// ```rust
    /// use records_sdk::transport::api::ApiTransport;
    ///
    /// let transport = ApiTransport::new(
    ///     "https://example.my.salesforce.com",
    ///     Some("bearer_token_here".to_string()),
    /// );
    /// ```
    pub fn new(instance_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// Create a transport from a validated client configuration
    pub fn from_config(config: &ClientConfig) -> RecordsResult<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                crate::error::RecordsError::Config(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            instance_url: config.instance_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    /// Get the instance URL
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn resolve(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else if uri.starts_with('/') {
            format!("{}{}", self.instance_url, uri)
        } else {
            format!("{}/{}", self.instance_url, uri)
        }
    }

    /// Build a request with authentication headers
    fn build_request(
        &self,
        method: Method,
        uri: &str,
        params: &QueryParams,
    ) -> reqwest::RequestBuilder {
        let url = self.resolve(uri);
        let verb = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        debug!("{} {}", method, url);
        let mut request = self.client.request(verb, &url);

        if !params.is_empty() {
            request = request.query(params);
        }

        if let Some(ref token) = self.access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(text)
    }
}

/// Pull the service's message out of an error body.
///
/// The service reports failures as a JSON list of `{ message, errorCode }`;
/// anything else is passed through untouched.
fn error_message(body: &str) -> String {
    let first = serde_json::from_str::<Value>(body).ok().and_then(|v| match v {
        Value::Array(items) => items.into_iter().next(),
        other => Some(other),
    });

    first
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
        .unwrap_or_else(|| body.trim().to_string())
}

fn parse_body(text: &str) -> Result<Option<Value>, TransportError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl Transport for ApiTransport {
    async fn get(&self, uri: &str, params: &QueryParams) -> Result<Value, TransportError> {
        let text = self.send(self.build_request(Method::Get, uri, params)).await?;
        Ok(parse_body(&text)?.unwrap_or(Value::Null))
    }

    async fn post(
        &self,
        uri: &str,
        params: &QueryParams,
        body: &Value,
    ) -> Result<Value, TransportError> {
        let request = self.build_request(Method::Post, uri, params).json(body);
        let text = self.send(request).await?;
        Ok(parse_body(&text)?.unwrap_or(Value::Null))
    }

    async fn patch(
        &self,
        uri: &str,
        params: &QueryParams,
        body: &Value,
    ) -> Result<Option<Value>, TransportError> {
        let request = self.build_request(Method::Patch, uri, params).json(body);
        let text = self.send(request).await?;
        parse_body(&text)
    }

    async fn delete(&self, uri: &str, params: &QueryParams) -> Result<(), TransportError> {
        self.send(self.build_request(Method::Delete, uri, params))
            .await?;
        Ok(())
    }
}
