//! In-memory transport
//!
//! Serves scripted responses keyed by method and URI and records every call,
//! so callers can assert exactly which requests were issued.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Method, QueryParams, Transport, TransportError};

/// A call observed by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub uri: String,
    pub params: QueryParams,
    pub body: Option<Value>,
}

type Scripted = Result<Option<Value>, TransportError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Transport serving scripted responses.
///
/// Responses for the same method and URI are served in order; the last one
/// keeps being served once the queue is down to it. Unscripted requests fail
/// with a 404 status error.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Option<Duration>,
}

impl MockTransport {
    /// Create a transport with nothing scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, so concurrent callers overlap in flight
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Script a successful response with a body
    pub fn respond(&self, method: Method, uri: impl Into<String>, body: Value) -> &Self {
        self.push(method, uri.into(), Ok(Some(body)))
    }

    /// Script a successful response without a body
    pub fn respond_empty(&self, method: Method, uri: impl Into<String>) -> &Self {
        self.push(method, uri.into(), Ok(None))
    }

    /// Script a failure
    pub fn fail(&self, method: Method, uri: impl Into<String>, error: TransportError) -> &Self {
        self.push(method, uri.into(), Err(error))
    }

    fn push(&self, method: Method, uri: String, response: Scripted) -> &Self {
        lock(&self.responses)
            .entry((method, uri))
            .or_default()
            .push_back(response);
        self
    }

    /// All calls issued so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls issued so far
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of calls issued for a method and URI
    pub fn calls_to(&self, method: Method, uri: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.method == method && call.uri == uri)
            .count()
    }

    /// The most recent call, if any
    pub fn last_call(&self) -> Option<RecordedCall> {
        lock(&self.calls).last().cloned()
    }

    async fn serve(
        &self,
        method: Method,
        uri: &str,
        params: &QueryParams,
        body: Option<&Value>,
    ) -> Scripted {
        lock(&self.calls).push(RecordedCall {
            method,
            uri: uri.to_string(),
            params: params.clone(),
            body: body.cloned(),
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut responses = lock(&self.responses);
        match responses.get_mut(&(method, uri.to_string())) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(not_scripted(method, uri))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(not_scripted(method, uri))),
            None => Err(not_scripted(method, uri)),
        }
    }
}

fn not_scripted(method: Method, uri: &str) -> TransportError {
    TransportError::Status {
        status: 404,
        message: format!("no response scripted for {} {}", method, uri),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, uri: &str, params: &QueryParams) -> Result<Value, TransportError> {
        Ok(self.serve(Method::Get, uri, params, None).await?.unwrap_or(Value::Null))
    }

    async fn post(
        &self,
        uri: &str,
        params: &QueryParams,
        body: &Value,
    ) -> Result<Value, TransportError> {
        Ok(self
            .serve(Method::Post, uri, params, Some(body))
            .await?
            .unwrap_or(Value::Null))
    }

    async fn patch(
        &self,
        uri: &str,
        params: &QueryParams,
        body: &Value,
    ) -> Result<Option<Value>, TransportError> {
        self.serve(Method::Patch, uri, params, Some(body)).await
    }

    async fn delete(&self, uri: &str, params: &QueryParams) -> Result<(), TransportError> {
        self.serve(Method::Delete, uri, params, None).await.map(|_| ())
    }
}
