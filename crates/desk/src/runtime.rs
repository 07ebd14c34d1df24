//! Runtime doc session: list, report, detail and form views of one doc,
//! plus its runtime actions.
//!
//! The session renders from the doc definition it loaded and talks to the
//! platform for records. Actions are guarded by `running_action`: a second
//! trigger while one is in flight is refused, and a successful action
//! re-fetches the record and the definition so the page reflects whatever
//! the action changed server-side.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use nativedoc_client::{ActionExecutor, ClientResult, PlatformClient};
use nativedoc_core::action::{Action, ActionMethod, ActionRequest, ActionsDefinition};
use nativedoc_core::bundle::DocDefinitionBundle;
use nativedoc_core::error::CoreError;
use nativedoc_core::form::{validate_required, FormState};
use nativedoc_core::hierarchy::{HierarchyKey, DEFAULT_RUNTIME_PREFIX};
use nativedoc_core::layout::FormLayout;
use nativedoc_core::list::{
    build_list_table_config, build_report_rows, build_report_table_config, ListState, TableConfig,
};
use nativedoc_core::schema::Field;
use nativedoc_core::ui_config::{build_runtime_ui_config, RuntimeUiConfig, ViewKind};

use crate::error::{DeskError, DeskResult};
use crate::source::DocDefinitionSource;

/// An action that passed the in-flight guard and is ready to send.
#[derive(Debug, Clone)]
pub struct ActionTicket {
    request: ActionRequest,
}

impl ActionTicket {
    pub fn request(&self) -> &ActionRequest {
        &self.request
    }
}

pub struct RuntimeDocSession {
    key: HierarchyKey,
    prefix: String,
    source: Arc<dyn DocDefinitionSource>,
    client: PlatformClient,
    executor: ActionExecutor,
    bundle: DocDefinitionBundle,
    fields: Vec<Field>,
    rows: Vec<Value>,
    list: ListState,
    record_id: Option<String>,
    form: FormState,
    running_action: Option<String>,
    status: Option<String>,
    error: Option<String>,
}

impl std::fmt::Debug for RuntimeDocSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeDocSession")
            .field("key", &self.key)
            .field("record_id", &self.record_id)
            .field("running_action", &self.running_action)
            .finish_non_exhaustive()
    }
}

impl RuntimeDocSession {
    /// Load the definition of `key` and start on an empty list.
    pub async fn open(
        source: Arc<dyn DocDefinitionSource>,
        client: PlatformClient,
        key: HierarchyKey,
    ) -> DeskResult<Self> {
        let key = key.sanitized()?;
        let loaded = source.load(&key).await?;
        let bundle = DocDefinitionBundle::from(loaded.files);
        let fields = bundle.fields();

        Ok(Self {
            key,
            prefix: DEFAULT_RUNTIME_PREFIX.to_string(),
            source,
            executor: ActionExecutor::new(client.clone()),
            client,
            list: ListState::new(&fields),
            form: FormState::new(&fields, None),
            fields,
            bundle,
            rows: Vec::new(),
            record_id: None,
            running_action: None,
            status: None,
            error: None,
        })
    }

    /// Runtime page prefix used for `base_path` (default `/erp`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    // ---- accessors ----

    pub fn key(&self) -> &HierarchyKey {
        &self.key
    }

    pub fn bundle(&self) -> &DocDefinitionBundle {
        &self.bundle
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn running_action(&self) -> Option<&str> {
        self.running_action.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn ui_config(&self, view: Option<ViewKind>) -> RuntimeUiConfig {
        build_runtime_ui_config(&self.key, self.bundle.doc(), view, &self.prefix)
    }

    /// Re-read the doc definition. Filters survive when the filterable
    /// fields did not change.
    pub async fn reload_definition(&mut self) -> DeskResult<()> {
        let loaded = self.source.load(&self.key).await?;
        self.bundle = DocDefinitionBundle::from(loaded.files);
        let fields = self.bundle.fields();
        if fields != self.fields {
            self.list = ListState::new(&fields);
            self.fields = fields;
        }
        Ok(())
    }

    // ---- list / report ----

    pub async fn load_list(&mut self) -> DeskResult<()> {
        self.rows = self.client.list_records(&self.key.doc).await?;
        let total = self.list.apply(&self.rows).len();
        let page = self.list.page();
        self.list.set_page(page, total);
        Ok(())
    }

    pub fn list_state(&self) -> &ListState {
        &self.list
    }

    pub fn list_state_mut(&mut self) -> &mut ListState {
        &mut self.list
    }

    pub fn list_table_config(&self) -> TableConfig {
        build_list_table_config(&self.key.doc, self.bundle.doc(), &self.fields)
    }

    /// Filtered rows of the current page.
    pub fn visible_rows(&self) -> Vec<&Value> {
        self.list.visible_rows(&self.rows)
    }

    /// Row count after filtering.
    pub fn filtered_count(&self) -> usize {
        self.list.apply(&self.rows).len()
    }

    /// Group counts over the filtered rows, by `list_report.group_by`.
    pub fn report_rows(&self) -> Vec<Value> {
        let filtered: Vec<Value> = self.list.apply(&self.rows).into_iter().cloned().collect();
        let group_by = self.bundle.doc_definition().report_group_by();
        build_report_rows(&filtered, group_by)
    }

    pub fn report_table_config(&self) -> TableConfig {
        build_report_table_config(&self.key.doc, self.bundle.doc(), self.report_rows().len())
    }

    // ---- detail / form ----

    /// Open a record for editing, or a blank form when `id` is `None`.
    pub async fn open_record(&mut self, id: Option<&str>) -> DeskResult<()> {
        let record = match id {
            Some(id) => self.client.get_record(&self.key.doc, id).await?,
            None => None,
        };
        self.record_id = id.map(str::to_string);
        self.form = FormState::new(&self.fields, record.as_ref());
        Ok(())
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn set_value(&mut self, fieldname: impl Into<String>, value: Value) {
        self.form.set(fieldname, value);
    }

    /// Tabs, sections and fields visible for the current form values.
    pub fn form_layout(&self) -> FormLayout {
        FormLayout::build(&self.fields).visible(Some(self.form.values()))
    }

    /// Create the open record from the cleaned form values, or update it
    /// with every edited field included even when blanked.
    ///
    /// Blank required fields fail with a validation error naming them.
    pub async fn save_record(&mut self) -> DeskResult<Value> {
        let missing = validate_required(&self.fields, self.form.values());
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!("Missing required fields: {}", missing.join(", "))).into());
        }

        let saved = match &self.record_id {
            Some(id) => {
                let payload = self.form.update_payload();
                self.client
                    .update_record(&self.key.doc, id, &payload, ActionMethod::Patch)
                    .await?
            }
            None => {
                let payload = self.form.save_payload();
                self.client.create_record(&self.key.doc, &payload).await?
            }
        };

        if self.record_id.is_none() {
            self.record_id = saved.get("id").and_then(record_id_text);
        }
        self.form.mark_saved();
        Ok(saved)
    }

    // ---- actions ----

    /// Actions offered on the page (`enabled != false`).
    pub fn available_actions(&self) -> Vec<Action> {
        ActionsDefinition::from_value(self.bundle.actions())
            .enabled_actions()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Pass the in-flight guard and build the request for `action_id`.
    ///
    /// The payload is the cleaned form. Nothing is marked running when
    /// this fails.
    pub fn begin_action(&mut self, action_id: &str) -> DeskResult<ActionTicket> {
        if let Some(running) = &self.running_action {
            return Err(CoreError::Conflict(format!("Action '{running}' is already running")).into());
        }

        let definition = ActionsDefinition::from_value(self.bundle.actions());
        let action = definition
            .find(action_id)
            .filter(|a| a.enabled)
            .ok_or_else(|| CoreError::Validation(format!("Action '{action_id}' is not available")))?;
        let method = action.http_method()?;

        let request = ActionRequest::new(
            Some(self.key.doc.as_str()),
            self.record_id.as_deref(),
            Some(action_id),
            Value::Object(self.form.save_payload()),
        )?
        .with_method(method);

        self.running_action = Some(action_id.to_string());
        self.status = None;
        self.error = None;
        Ok(ActionTicket { request })
    }

    /// Clear the guard and record the outcome.
    pub fn finish_action(&mut self, ticket: &ActionTicket, result: &ClientResult<Value>) {
        self.running_action = None;
        match result {
            Ok(_) => {
                self.status = Some(format!("Action '{}' executed.", ticket.request.action_id));
            }
            Err(err) => {
                self.error = Some(err.user_message());
            }
        }
    }

    /// Re-fetch the open record and the definition after a successful action.
    pub async fn refresh(&mut self) -> DeskResult<()> {
        if let Some(id) = self.record_id.clone() {
            let record = self.client.get_record(&self.key.doc, &id).await?;
            self.form = FormState::new(&self.fields, record.as_ref());
        }
        self.reload_definition().await
    }

    /// Run `action_id` against the open record.
    pub async fn run_action(&mut self, action_id: &str) -> DeskResult<Value> {
        let ticket = self.begin_action(action_id)?;
        let result = self.executor.run(ticket.request.clone()).await;
        self.finish_action(&ticket, &result);
        let data = result?;
        self.refresh().await?;
        Ok(data)
    }
}

fn record_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Shared session
// ---------------------------------------------------------------------------

pub type SharedSession = Arc<Mutex<RuntimeDocSession>>;

/// Run an action on a shared session without holding the lock while the
/// request is in flight, so a concurrent trigger sees `running_action`.
pub async fn run_action_shared(session: &SharedSession, action_id: &str) -> DeskResult<Value> {
    let (ticket, executor) = {
        let mut guard = session.lock().await;
        let ticket = guard.begin_action(action_id)?;
        (ticket, guard.executor.clone())
    };

    let result = executor.run(ticket.request.clone()).await;

    let mut guard = session.lock().await;
    guard.finish_action(&ticket, &result);
    let data = result.map_err(DeskError::from)?;
    guard.refresh().await?;
    Ok(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use serde_json::json;
    use tempfile::TempDir;

    use nativedoc_client::{ClientConfig, ClientError};
    use nativedoc_store::{DocStore, SaveRequest};

    use super::*;
    use nativedoc_client::testing::MockTransport;

    fn key() -> HierarchyKey {
        HierarchyKey::new("plt", "core", "sales", "orders", "invoice")
    }

    async fn seeded_store() -> (TempDir, Arc<DocStore>) {
        let tmp = TempDir::new().unwrap();
        let store = DocStore::new(tmp.path());
        store
            .save(
                &key(),
                SaveRequest {
                    doc: Some(json!({
                        "page": {"title": "Invoice"},
                        "list_report": {"group_by": "status"},
                    })),
                    schema: Some(json!({"fields": [
                        {"fieldname": "customer", "label": "Customer", "reqd": 1, "in_standard_filter": 1},
                        {"fieldname": "status", "default": "Draft"},
                        {"fieldname": "reason", "depends_on": "status == 'Rejected'"},
                    ]})),
                    actions: Some(json!({"actions": [
                        {"id": "approve", "label": "Approve"},
                        {"id": "reopen", "method": "PATCH"},
                        {"id": "archive", "enabled": false},
                    ]})),
                },
            )
            .await
            .unwrap();
        (tmp, Arc::new(store))
    }

    async fn session(mock: &Arc<MockTransport>) -> (TempDir, RuntimeDocSession) {
        let (tmp, store) = seeded_store().await;
        let client = PlatformClient::with_transport(mock.clone(), ClientConfig::default());
        let session = RuntimeDocSession::open(store, client, key()).await.unwrap();
        (tmp, session)
    }

    #[tokio::test]
    async fn offers_only_enabled_actions() {
        let mock = Arc::new(MockTransport::default());
        let (_tmp, session) = session(&mock).await;
        let ids: Vec<String> = session.available_actions().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["approve", "reopen"]);
        assert_eq!(session.ui_config(Some(ViewKind::List)).title, "Invoice List");
    }

    #[tokio::test]
    async fn list_filters_and_report_groups() {
        let mock = Arc::new(MockTransport::default());
        mock.respond(
            "/invoice",
            200,
            json!({"data": [
                {"id": "1", "customer": "Acme", "status": "Paid"},
                {"id": "2", "customer": "Globex", "status": "Draft"},
                {"id": "3", "customer": "acme ltd", "status": "Paid"},
            ]}),
        );
        let (_tmp, mut session) = session(&mock).await;
        session.load_list().await.unwrap();
        assert_eq!(session.visible_rows().len(), 3);

        session.list_state_mut().set_filter("customer", "ACME");
        assert_eq!(session.filtered_count(), 2);

        let report = session.report_rows();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0]["status"], json!("Paid"));
        assert_eq!(report[0]["count"], json!(2));
    }

    #[tokio::test]
    async fn form_hides_conditional_fields_and_requires_values() {
        let mock = Arc::new(MockTransport::default());
        let (_tmp, mut session) = session(&mock).await;
        session.open_record(None).await.unwrap();
        assert_eq!(session.form().get("status"), Some(&json!("Draft")));

        let layout = session.form_layout();
        let names: Vec<_> = layout.field_nodes().map(|n| n.field.key().unwrap_or_default().to_string()).collect();
        assert!(!names.contains(&"reason".to_string()));

        let err = session.save_record().await.unwrap_err();
        assert_matches!(err, DeskError::Core(CoreError::Validation(ref m)) if m.contains("Customer"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn create_then_update_record() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("/invoice", 201, json!({"data": {"id": 42, "customer": "Acme"}}));
        let (_tmp, mut session) = session(&mock).await;
        session.open_record(None).await.unwrap();
        session.set_value("customer", json!("Acme"));
        session.save_record().await.unwrap();
        assert_eq!(session.record_id(), Some("42"));
        assert!(!session.form().is_dirty());

        mock.respond("/invoice/42", 200, json!({"data": {"id": 42}}));
        session.set_value("customer", json!("Acme Corp"));
        session.save_record().await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].method, ActionMethod::Post);
        assert_eq!(requests[1].method, ActionMethod::Patch);
        assert!(requests[1].url.ends_with("/invoice/42"));
    }

    #[tokio::test]
    async fn blanked_field_is_sent_on_update() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("/invoice/42", 200, json!({"data": {"id": 42, "customer": "Acme", "status": "Paid"}}));
        let (_tmp, mut session) = session(&mock).await;
        session.open_record(Some("42")).await.unwrap();

        session.set_value("status", json!(""));
        session.save_record().await.unwrap();

        let patch = mock.requests().pop().unwrap();
        assert_eq!(patch.method, ActionMethod::Patch);
        assert!(patch.url.ends_with("/invoice/42"));
        let body = patch.body.unwrap();
        assert_eq!(body["status"], json!(""));
        assert_eq!(body["customer"], json!("Acme"));
    }

    #[tokio::test]
    async fn action_refetches_record_after_success() {
        let mock = Arc::new(MockTransport::default());
        mock.respond("/invoice/7", 200, json!({"data": {"customer": "Acme", "status": "Draft"}}));
        let (_tmp, mut session) = session(&mock).await;
        session.open_record(Some("7")).await.unwrap();

        mock.respond("/invoice/7/actions/approve", 200, json!({"data": {"ok": true}}));
        mock.respond("/invoice/7", 200, json!({"data": {"customer": "Acme", "status": "Approved"}}));
        session.run_action("approve").await.unwrap();

        assert_eq!(session.status(), Some("Action 'approve' executed."));
        assert_eq!(session.running_action(), None);
        assert_eq!(session.form().get("status"), Some(&json!("Approved")));
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn failed_action_clears_guard_and_reports_message() {
        let mock = Arc::new(MockTransport::default());
        let (_tmp, mut session) = session(&mock).await;
        session.open_record(Some("7")).await.unwrap();

        mock.respond("/invoice/7/actions/reopen", 200, json!({"error": "Invoice is closed"}));
        let err = session.run_action("reopen").await.unwrap_err();
        assert_matches!(err, DeskError::Client(ClientError::Envelope { .. }));
        assert_eq!(session.running_action(), None);
        assert_eq!(session.error(), Some("Invoice is closed"));
        assert_eq!(mock.requests().last().map(|r| r.method), Some(ActionMethod::Patch));
    }

    #[tokio::test]
    async fn action_needs_an_open_record() {
        let mock = Arc::new(MockTransport::default());
        let (_tmp, mut session) = session(&mock).await;
        session.open_record(None).await.unwrap();
        assert_matches!(session.begin_action("approve"), Err(DeskError::Core(CoreError::Validation(_))));
        assert_matches!(session.begin_action("archive"), Err(DeskError::Core(CoreError::Validation(_))));
        assert_eq!(session.running_action(), None);
    }

    #[tokio::test]
    async fn second_trigger_while_running_is_refused() {
        let mock = Arc::new(MockTransport::with_delay(Duration::from_millis(50)));
        let (_tmp, mut session) = session(&mock).await;
        session.record_id = Some("7".into());
        let shared: SharedSession = Arc::new(Mutex::new(session));

        let first = {
            let shared = shared.clone();
            tokio::spawn(async move { run_action_shared(&shared, "approve").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = run_action_shared(&shared, "reopen").await;
        assert_matches!(second, Err(DeskError::Core(CoreError::Conflict(_))));

        first.await.unwrap().unwrap();
        let session = shared.lock().await;
        assert_eq!(session.running_action(), None);
        assert_eq!(session.status(), Some("Action 'approve' executed."));
    }
}
