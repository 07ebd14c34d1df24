//! In-memory [`Transport`] for tests, here and in dependent crates
//! (`features = ["testing"]`).

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientResult;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Answers by URL suffix and records every request it sees.
///
/// Unmatched URLs answer `200 null`.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(String, u16, Value)>>,
    requests: Mutex<Vec<TransportRequest>>,
    delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, url_suffix: &str, status: u16, body: Value) {
        lock(&self.routes).push((url_suffix.to_string(), status, body));
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> ClientResult<TransportResponse> {
        lock(&self.requests).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let routes = lock(&self.routes).clone();
        let (status, body) = routes
            .into_iter()
            .rev()
            .find(|(suffix, _, _)| request.url.ends_with(suffix.as_str()))
            .map(|(_, status, body)| (status, body))
            .unwrap_or((200, Value::Null));
        Ok(TransportResponse { status, body })
    }
}
