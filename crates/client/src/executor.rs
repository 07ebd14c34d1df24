//! Runtime action execution.
//!
//! `<METHOD> {api_url}/<docKey>/<recordId>/actions/<actionId>` with the
//! payload as JSON body. Success is decided by the response envelope, not
//! the HTTP status: the backend reports some failures with `200` and an
//! `error` key. The executor never touches local state; the caller re-fetches
//! after a success.

use serde_json::Value;

use nativedoc_core::action::{envelope_data, envelope_error, ActionMethod, ActionRequest};

use crate::client::PlatformClient;
use crate::error::{ClientError, ClientResult};
use crate::transport::TransportRequest;

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    client: PlatformClient,
}

impl ActionExecutor {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    /// Validate the context and run the action with its configured method.
    ///
    /// A missing doc key, record id or action id fails with
    /// [`ClientError::Precondition`] before any request is sent.
    pub async fn execute(
        &self,
        doc_key: Option<&str>,
        record_id: Option<&str>,
        action_id: Option<&str>,
        method: ActionMethod,
        payload: Value,
    ) -> ClientResult<Value> {
        let request = ActionRequest::new(doc_key, record_id, action_id, payload)
            .map_err(|e| ClientError::Precondition(e.to_string()))?
            .with_method(method);
        self.run(request).await
    }

    /// Run an already validated request.
    pub async fn run(&self, request: ActionRequest) -> ClientResult<Value> {
        let url = self.client.runtime_url(&[
            request.doc_key.as_str(),
            request.record_id.as_str(),
            "actions",
            request.action_id.as_str(),
        ])?;
        tracing::info!(
            endpoint = %request.endpoint(),
            method = %request.method,
            "Executing runtime action",
        );

        let response = self
            .client
            .transport()
            .send(TransportRequest::get(url).with_body(request.method, request.payload))
            .await?;

        if let Some(message) = envelope_error(&response.body) {
            tracing::warn!(action = %request.action_id, error = %message, "Runtime action failed");
            return Err(ClientError::Envelope { message });
        }
        // A non-2xx answer only counts when it still carries a JSON envelope.
        if !response.is_success() && !response.body.is_object() {
            let body = match &response.body {
                Value::Null => String::new(),
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            tracing::warn!(action = %request.action_id, status = response.status, "Runtime action failed");
            return Err(ClientError::Api {
                status: response.status,
                body,
            });
        }
        Ok(envelope_data(response.body))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::MockTransport;

    fn executor(mock: &Arc<MockTransport>) -> ActionExecutor {
        ActionExecutor::new(PlatformClient::with_transport(
            mock.clone(),
            ClientConfig::default(),
        ))
    }

    #[tokio::test]
    async fn missing_record_id_fails_before_any_request() {
        let mock = Arc::new(MockTransport::default());
        let err = executor(&mock)
            .execute(Some("invoice"), None, Some("approve"), ActionMethod::Post, json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Precondition(ref m) if m.contains("Missing doc/action context"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn posts_to_action_endpoint() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("invoice/7/actions/approve", 200, json!({"data": {"status": "Approved"}}));
        let data = executor(&mock)
            .execute(
                Some("invoice"),
                Some("7"),
                Some("approve"),
                ActionMethod::Post,
                json!({"note": "ok"}),
            )
            .await
            .unwrap();
        assert_eq!(data, json!({"status": "Approved"}));

        let request = &mock.requests()[0];
        assert_eq!(request.url, "http://localhost:8000/invoice/7/actions/approve");
        assert_eq!(request.method, ActionMethod::Post);
        assert_eq!(request.body, Some(json!({"note": "ok"})));
    }

    #[tokio::test]
    async fn error_envelope_with_200_is_a_failure() {
        let mock = Arc::new(MockTransport::default());
        mock.respond(
            "invoice/7/actions/approve",
            200,
            json!({"error": true, "message": "Already approved"}),
        );
        let err = executor(&mock)
            .execute(Some("invoice"), Some("7"), Some("approve"), ActionMethod::Post, json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Envelope { ref message } if message == "Already approved");
    }

    #[tokio::test]
    async fn accepted_without_error_key_is_a_success() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("invoice/7/actions/ping", 202, json!({"queued": true}));
        let data = executor(&mock)
            .execute(Some("invoice"), Some("7"), Some("ping"), ActionMethod::Put, json!({}))
            .await
            .unwrap();
        assert_eq!(data, json!({"queued": true}));
        assert_eq!(mock.requests()[0].method, ActionMethod::Put);
    }

    #[tokio::test]
    async fn non_2xx_envelope_without_error_key_is_a_success() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("invoice/7/actions/ping", 409, json!({"data": {"state": "Draft"}}));
        let data = executor(&mock)
            .execute(Some("invoice"), Some("7"), Some("ping"), ActionMethod::Post, json!({}))
            .await
            .unwrap();
        assert_eq!(data, json!({"state": "Draft"}));
    }

    #[tokio::test]
    async fn non_2xx_without_envelope_is_an_api_error() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("invoice/7/actions/approve", 502, json!("<html>Bad Gateway</html>"));
        let err = executor(&mock)
            .execute(Some("invoice"), Some("7"), Some("approve"), ActionMethod::Post, json!({}))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ClientError::Api { status: 502, ref body } if body.contains("Bad Gateway")
        );

        mock.respond("invoice/7/actions/approve", 500, Value::Null);
        let err = executor(&mock)
            .execute(Some("invoice"), Some("7"), Some("approve"), ActionMethod::Post, json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Api { status: 500, .. });
    }
}
