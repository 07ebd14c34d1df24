//! Typed wrappers over the platform backend.
//!
//! URL conventions:
//!
//! ```text
//! {api_url}/{api_prefix}/platform/...          catalog sources
//! {api_url}/{api_prefix}/docs/meta/{doc}       per-doc metadata
//! {api_url}/{doc}[/{id}]                       record CRUD
//! {api_url}/{doc}/{id}/actions/{action}        runtime actions
//! {native_files_url}/api/native-doc-files      doc definition files
//! ```
//!
//! Doc keys, record ids and action ids are percent-encoded as single path
//! segments.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use nativedoc_core::action::{envelope_data, ActionMethod};
use nativedoc_core::bundle::NativeFiles;
use nativedoc_core::catalog::{unwrap_data, CatalogSnapshot, CatalogSource, DocMeta, DEFAULT_APP, DEFAULT_BUNDLE};
use nativedoc_core::hierarchy::HierarchyKey;
use nativedoc_core::list::unwrap_rows;
use nativedoc_core::types::FormRecord;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{HttpTransport, Transport, TransportRequest};

/// `GET /api/native-doc-files` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeDocPayload {
    #[serde(default)]
    pub doc: Value,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub actions: Value,
    #[serde(default)]
    pub runtime: Value,
    #[serde(default)]
    pub base_path: String,
}

impl NativeDocPayload {
    pub fn files(&self) -> NativeFiles {
        NativeFiles {
            doc: self.doc.clone(),
            schema: self.schema.clone(),
            actions: self.actions.clone(),
        }
    }
}

/// Blobs for `POST /api/native-doc-files`; `None` blobs are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeFilesUpdate {
    pub doc: Option<Value>,
    pub schema: Option<Value>,
    pub actions: Option<Value>,
}

/// HTTP client for the platform backend and the native doc files server.
#[derive(Clone)]
pub struct PlatformClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    /// Client over a fresh [`HttpTransport`].
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    // ---- URLs ----

    fn platform_url(&self, segments: &[&str]) -> ClientResult<String> {
        let mut path: Vec<&str> = self.config.api_prefix.split('/').collect();
        path.extend_from_slice(segments);
        join_url(&self.config.api_url, &path)
    }

    pub(crate) fn runtime_url(&self, segments: &[&str]) -> ClientResult<String> {
        join_url(&self.config.api_url, segments)
    }

    fn native_files_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/native-doc-files{}",
            self.config.native_files_url.trim_end_matches('/'),
            suffix
        )
    }

    async fn fetch(&self, request: TransportRequest) -> ClientResult<Value> {
        self.transport.send(request).await?.into_success()
    }

    // ---- catalog ----

    fn source_request(&self, source: CatalogSource) -> ClientResult<TransportRequest> {
        let path: &[&str] = match source {
            CatalogSource::Session => &["platform", "session", "bootstrap"],
            CatalogSource::Launcher => &["platform", "launcher", "catalog"],
            CatalogSource::Apps => &["platform", "apps"],
            CatalogSource::Modules => &["platform", "modules"],
            CatalogSource::Submodules => &["platform", "submodules"],
            CatalogSource::Workspaces => &["platform", "workspaces"],
            CatalogSource::Sandbox => &["platform", "sandbox", "catalog"],
        };
        let request = TransportRequest::get(self.platform_url(path)?);
        Ok(match source {
            CatalogSource::Session | CatalogSource::Sandbox => request,
            CatalogSource::Workspaces => request
                .with_query("bundle", DEFAULT_BUNDLE)
                .with_query("app", DEFAULT_APP),
            _ => request.with_query("bundle", DEFAULT_BUNDLE),
        })
    }

    /// Fetch one catalog source.
    pub async fn fetch_source(&self, source: CatalogSource) -> ClientResult<Value> {
        self.fetch(self.source_request(source)?).await
    }

    /// Fetch every catalog source concurrently.
    ///
    /// Never fails as a whole: each source's outcome is recorded in the
    /// snapshot and a failed source only flips its status.
    pub async fn fetch_catalog(&self) -> CatalogSnapshot {
        let (session, launcher, apps, modules, submodules, workspaces, sandbox) = tokio::join!(
            self.fetch_source(CatalogSource::Session),
            self.fetch_source(CatalogSource::Launcher),
            self.fetch_source(CatalogSource::Apps),
            self.fetch_source(CatalogSource::Modules),
            self.fetch_source(CatalogSource::Submodules),
            self.fetch_source(CatalogSource::Workspaces),
            self.fetch_source(CatalogSource::Sandbox),
        );

        let mut snapshot = CatalogSnapshot::default();
        snapshot.record(CatalogSource::Session, session);
        snapshot.record(CatalogSource::Launcher, launcher);
        snapshot.record(CatalogSource::Apps, apps);
        snapshot.record(CatalogSource::Modules, modules);
        snapshot.record(CatalogSource::Submodules, submodules);
        snapshot.record(CatalogSource::Workspaces, workspaces);
        snapshot.record(CatalogSource::Sandbox, sandbox);

        if let Some(warning) = snapshot.warning() {
            tracing::warn!(status = ?snapshot.api_status(), "{}", warning);
        }
        snapshot
    }

    /// `docs/meta/<docKey>`, read through `data` when present. `None` when the body
    /// carries no data.
    pub async fn fetch_doc_meta(&self, doc_key: &str) -> ClientResult<Option<DocMeta>> {
        let body = self
            .fetch(TransportRequest::get(
                self.platform_url(&["docs", "meta", doc_key])?,
            ))
            .await?;
        Ok(unwrap_data(&body).map(|data| DocMeta::from_value(&data)))
    }

    // ---- records ----

    /// `GET /<docKey>`: rows from an array, `data` or `results` payload.
    pub async fn list_records(&self, doc_key: &str) -> ClientResult<Vec<Value>> {
        let body = self
            .fetch(TransportRequest::get(self.runtime_url(&[doc_key])?))
            .await?;
        Ok(unwrap_rows(&body))
    }

    /// `GET /<docKey>/<id>`, unwrapping `data` when present.
    pub async fn get_record(&self, doc_key: &str, id: &str) -> ClientResult<Option<FormRecord>> {
        if doc_key.is_empty() || id.is_empty() {
            return Err(ClientError::Precondition("Missing doc/record context".into()));
        }
        let body = self
            .fetch(TransportRequest::get(self.runtime_url(&[doc_key, id])?))
            .await?;
        Ok(match envelope_data(body) {
            Value::Object(map) => Some(map),
            _ => None,
        })
    }

    /// `POST /<docKey>`.
    pub async fn create_record(&self, doc_key: &str, record: &FormRecord) -> ClientResult<Value> {
        let request = TransportRequest::get(self.runtime_url(&[doc_key])?)
            .with_body(ActionMethod::Post, Value::Object(record.clone()));
        self.fetch(request).await.map(envelope_data)
    }

    /// `PATCH` or `PUT /<docKey>/<id>`.
    pub async fn update_record(
        &self,
        doc_key: &str,
        id: &str,
        record: &FormRecord,
        method: ActionMethod,
    ) -> ClientResult<Value> {
        if !matches!(method, ActionMethod::Patch | ActionMethod::Put) {
            return Err(ClientError::Precondition(format!(
                "Records are updated with PATCH or PUT, not {method}"
            )));
        }
        let request = TransportRequest::get(self.runtime_url(&[doc_key, id])?)
            .with_body(method, Value::Object(record.clone()));
        self.fetch(request).await.map(envelope_data)
    }

    // ---- native doc files ----

    fn with_hierarchy(request: TransportRequest, key: &HierarchyKey) -> TransportRequest {
        request
            .with_query("bundle", key.bundle.as_str())
            .with_query("app", key.app.as_str())
            .with_query("module", key.module.as_str())
            .with_query("submodule", key.submodule.as_str())
            .with_query("doc_key", key.doc.as_str())
    }

    /// `GET /api/native-doc-files`.
    pub async fn load_native_files(&self, key: &HierarchyKey) -> ClientResult<NativeDocPayload> {
        let request = Self::with_hierarchy(TransportRequest::get(self.native_files_url("")), key);
        let body = self.fetch(request).await?;
        serde_json::from_value(body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// `POST /api/native-doc-files` with only the supplied blobs.
    pub async fn save_native_files(
        &self,
        key: &HierarchyKey,
        update: NativeFilesUpdate,
    ) -> ClientResult<Value> {
        let mut body = json!({
            "bundle": key.bundle,
            "app": key.app,
            "module": key.module,
            "submodule": key.submodule,
            "docKey": key.doc,
        });
        for (name, blob) in [("doc", update.doc), ("schema", update.schema), ("actions", update.actions)] {
            if let (Some(blob), Some(map)) = (blob, body.as_object_mut()) {
                map.insert(name.into(), blob);
            }
        }
        let request =
            TransportRequest::get(self.native_files_url("")).with_body(ActionMethod::Post, body);
        self.fetch(request).await
    }

    /// `POST /api/native-doc-files/create`.
    pub async fn create_native_files(&self, key: &HierarchyKey, title: Option<&str>) -> ClientResult<Value> {
        let mut body = json!({
            "bundle": key.bundle,
            "app": key.app,
            "module": key.module,
            "submodule": key.submodule,
            "docKey": key.doc,
        });
        if let (Some(title), Some(map)) = (title, body.as_object_mut()) {
            map.insert("title".into(), json!(title));
        }
        let request = TransportRequest::get(self.native_files_url("/create"))
            .with_body(ActionMethod::Post, body);
        self.fetch(request).await
    }
}

/// Append `segments` to `base`, percent-encoding each one. Empty segments
/// are skipped.
fn join_url(base: &str, segments: &[&str]) -> ClientResult<String> {
    let mut url = reqwest::Url::parse(base).map_err(|e| ClientError::InvalidUrl(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ClientError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments.iter().filter(|s| !s.is_empty()));
    Ok(url.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::testing::MockTransport;

    fn client(mock: &Arc<MockTransport>) -> PlatformClient {
        PlatformClient::with_transport(mock.clone(), ClientConfig::default())
    }

    #[tokio::test]
    async fn catalog_tolerates_failed_sources() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("platform/apps", 200, json!({"data": {"apps": [{"id": "crm"}]}}));
        mock.respond("platform/modules", 500, json!({"error": "boom"}));
        mock.respond("platform/sandbox/catalog", 200, json!({"docs": [{"doc_key": "x"}]}));

        let snapshot = client(&mock).fetch_catalog().await;
        assert_eq!(snapshot.apps(), vec![json!({"id": "crm"})]);
        assert_eq!(snapshot.docs().len(), 1);
        assert_eq!(snapshot.api_status()[&CatalogSource::Modules], false);
        assert!(snapshot.warning().is_some());
        assert_eq!(mock.requests().len(), 7);
    }

    #[tokio::test]
    async fn catalog_requests_carry_bundle_filters() {
        let mock = Arc::new(MockTransport::default());
        let client = client(&mock);
        let _ = client.fetch_source(CatalogSource::Workspaces).await;
        let request = &mock.requests()[0];
        assert_eq!(request.url, "http://localhost:8000/platform_core/platform/workspaces");
        assert_eq!(
            request.query,
            vec![
                ("bundle".to_string(), "plt".to_string()),
                ("app".to_string(), "platform_core".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn list_records_unwraps_results() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("invoice", 200, json!({"results": [{"id": 1}, {"id": 2}]}));
        let rows = client(&mock).list_records("invoice").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn get_record_unwraps_data() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("invoice/7", 200, json!({"data": {"id": 7, "status": "Draft"}}));
        let record = client(&mock).get_record("invoice", "7").await.unwrap().unwrap();
        assert_eq!(record["status"], json!("Draft"));
    }

    #[tokio::test]
    async fn native_files_not_found_is_detectable() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("api/native-doc-files", 404, json!({"error": "Native doc path not found"}));
        let key = HierarchyKey::new("plt", "core", "sales", "orders", "invoice");
        let err = client(&mock).load_native_files(&key).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.user_message(), "Native doc path not found");
    }

    #[tokio::test]
    async fn save_sends_only_supplied_blobs() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("api/native-doc-files", 200, json!({"message": "ok"}));
        let key = HierarchyKey::new("plt", "core", "sales", "orders", "invoice");
        client(&mock)
            .save_native_files(
                &key,
                NativeFilesUpdate {
                    schema: Some(json!({"fields": []})),
                    ..NativeFilesUpdate::default()
                },
            )
            .await
            .unwrap();
        let body = mock.requests()[0].body.clone().unwrap();
        assert_eq!(body["docKey"], json!("invoice"));
        assert!(body.get("schema").is_some());
        assert!(body.get("doc").is_none());
        assert!(body.get("actions").is_none());
    }

    #[tokio::test]
    async fn record_ids_are_encoded_as_one_segment() {
        let mock = Arc::new(MockTransport::default());
        let client = client(&mock);
        let _ = client.get_record("sales invoice", "INV/7?x=1").await;
        let _ = client.fetch_doc_meta("a/b").await;
        let requests = mock.requests();
        assert_eq!(requests[0].url, "http://localhost:8000/sales%20invoice/INV%2F7%3Fx=1");
        assert_eq!(requests[1].url, "http://localhost:8000/platform_core/docs/meta/a%2Fb");
    }

    #[test]
    fn join_url_tolerates_trailing_slash_and_rejects_garbage() {
        assert_eq!(
            join_url("http://api.local/v1/", &["invoice", "7"]).unwrap(),
            "http://api.local/v1/invoice/7"
        );
        assert_matches!(join_url("not a url", &["x"]), Err(ClientError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn update_rejects_non_update_methods() {
        let mock = Arc::new(MockTransport::default());
        let err = client(&mock)
            .update_record("invoice", "1", &FormRecord::new(), ActionMethod::Delete)
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Precondition(_));
        assert!(mock.requests().is_empty());
    }
}
