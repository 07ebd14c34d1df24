//! The HTTP seam of the client.
//!
//! [`Transport`] sends one JSON request and returns the status plus the
//! decoded body without judging success; callers decide what a failure is
//! (runtime actions, for example, look at the envelope and not the status).

use std::time::Duration;

use async_trait::async_trait;
use nativedoc_core::action::ActionMethod;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: ActionMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: ActionMethod::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, method: ActionMethod, body: Value) -> Self {
        self.method = method;
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Decoded JSON body. An empty body is `null`; a non-JSON error body is
    /// kept as a JSON string.
    pub body: Value,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body of a 2xx response, or [`ClientError::Api`].
    pub fn into_success(self) -> ClientResult<Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        let body = match self.body {
            Value::String(text) => text,
            other => other.to_string(),
        };
        Err(ClientError::Api {
            status: self.status,
            body,
        })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> ClientResult<TransportResponse>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// [`Transport`] over a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn reqwest_method(method: ActionMethod) -> reqwest::Method {
    match method {
        ActionMethod::Get => reqwest::Method::GET,
        ActionMethod::Post => reqwest::Method::POST,
        ActionMethod::Put => reqwest::Method::PUT,
        ActionMethod::Patch => reqwest::Method::PATCH,
        ActionMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> ClientResult<TransportResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "Platform request");

        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url)
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(err) if status.is_success() => {
                    return Err(ClientError::Decode(err.to_string()));
                }
                Err(_) => Value::String(text),
            }
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}
