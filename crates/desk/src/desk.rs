//! Builder desk synchronizer.
//!
//! Owns the `{doc, schema, actions}` bundle of the selected hierarchy key
//! while it is being authored. Panels write through the narrow `update_*`
//! functions (or a [`DocBlockLens`]) so edits to disjoint parts never
//! clobber each other; nothing reaches storage until [`BuilderDesk::save`].
//!
//! ```text
//! Unselected ──select──► Loading ──finish──► Loaded ◄──► Editing
//!      ▲                    ▲                  │   ▲        │
//!      │                    │                  ▼   │        ▼
//!      └──incomplete key────┴────select────── Saving ◄──────┘
//! ```
//!
//! Selecting a key discards unsaved edits. Loads are split into
//! [`BuilderDesk::select`] and [`BuilderDesk::finish_load`] around the
//! await; a response whose ticket is no longer current is dropped, so the
//! most recently selected key always wins.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use nativedoc_core::action::merge_runtime_defaults;
use nativedoc_core::bundle::{merge_preview_defaults, DocBlockLens, DocDefinitionBundle, Patch};
use nativedoc_core::catalog::DocMeta;
use nativedoc_core::doc::DocBlock;
use nativedoc_core::error::CoreError;
use nativedoc_core::hierarchy::HierarchyKey;
use nativedoc_core::layout::FormLayout;
use nativedoc_core::list::{list_preview, TableConfig};
use nativedoc_core::schema::Schema;
use nativedoc_core::types::FormRecord;
use nativedoc_store::SaveRequest;

use crate::error::DeskResult;
use crate::source::{DocDefinitionSource, LoadedDefinition};

pub const STATUS_LOADED: &str = "Native doc files loaded.";
pub const STATUS_SAVED: &str = "Native doc files saved.";
pub const STUDIO_PLACEHOLDER_NAME: &str = "Select a doc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskState {
    Unselected,
    Loading,
    Loaded,
    Editing,
    Saving,
}

/// Proof of a load request, captured when the key was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    key: HierarchyKey,
}

impl LoadTicket {
    pub fn key(&self) -> &HierarchyKey {
        &self.key
    }
}

/// Proof of a save request.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    seq: u64,
    key: HierarchyKey,
    request: SaveRequest,
}

impl SaveTicket {
    pub fn key(&self) -> &HierarchyKey {
        &self.key
    }

    pub fn request(&self) -> &SaveRequest {
        &self.request
    }
}

/// What the schema studio panel edits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudioConfig {
    pub name: String,
    pub schema: Value,
    pub actions: Value,
}

#[derive(Debug, Clone)]
pub struct BuilderDesk {
    state: DeskState,
    key: Option<HierarchyKey>,
    seq: u64,
    bundle: DocDefinitionBundle,
    baseline: DocDefinitionBundle,
    runtime: Value,
    base_path: Option<String>,
    preview_values: FormRecord,
    doc_meta: Option<DocMeta>,
    not_found: bool,
    status: Option<String>,
    error: Option<String>,
}

impl Default for BuilderDesk {
    fn default() -> Self {
        Self::new()
    }
}

impl BuilderDesk {
    pub fn new() -> Self {
        Self {
            state: DeskState::Unselected,
            key: None,
            seq: 0,
            bundle: DocDefinitionBundle::default(),
            baseline: DocDefinitionBundle::default(),
            runtime: json!({}),
            base_path: None,
            preview_values: FormRecord::new(),
            doc_meta: None,
            not_found: false,
            status: None,
            error: None,
        }
    }

    // ---- accessors ----

    pub fn state(&self) -> DeskState {
        self.state
    }

    pub fn key(&self) -> Option<&HierarchyKey> {
        self.key.as_ref()
    }

    pub fn bundle(&self) -> &DocDefinitionBundle {
        &self.bundle
    }

    pub fn runtime(&self) -> &Value {
        &self.runtime
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn preview_values(&self) -> &FormRecord {
        &self.preview_values
    }

    /// The selected doc has no definition on disk yet.
    pub fn is_not_found(&self) -> bool {
        self.not_found
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Unsaved edits exist.
    pub fn is_dirty(&self) -> bool {
        self.bundle != self.baseline
    }

    fn reset_bundle(&mut self) {
        self.bundle = DocDefinitionBundle::default();
        self.baseline = DocDefinitionBundle::default();
        self.runtime = json!({});
        self.base_path = None;
        self.preview_values = FormRecord::new();
        self.not_found = false;
    }

    // ---- loading ----

    /// Select a hierarchy key, discarding unsaved edits.
    ///
    /// An incomplete key moves to `Unselected` and returns `None`: no load
    /// is issued until all five segments are present. Otherwise the desk
    /// enters `Loading` and the returned ticket must be handed back to
    /// [`finish_load`](Self::finish_load).
    pub fn select(&mut self, key: HierarchyKey) -> Option<LoadTicket> {
        self.seq += 1;
        self.reset_bundle();
        self.status = None;
        self.error = None;

        if !key.is_complete() {
            self.key = None;
            self.state = DeskState::Unselected;
            return None;
        }

        tracing::debug!(doc = %key, seq = self.seq, "Loading native doc files");
        self.key = Some(key.clone());
        self.state = DeskState::Loading;
        Some(LoadTicket { seq: self.seq, key })
    }

    /// Apply a load result. Returns `false` (and changes nothing) when the
    /// ticket is stale.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: DeskResult<LoadedDefinition>) -> bool {
        if ticket.seq != self.seq {
            tracing::debug!(
                doc = %ticket.key,
                seq = ticket.seq,
                current = self.seq,
                "Discarding stale native doc load",
            );
            return false;
        }

        self.state = DeskState::Loaded;
        match result {
            Ok(loaded) => {
                self.bundle = DocDefinitionBundle::from(loaded.files);
                self.baseline = self.bundle.clone();
                self.runtime = loaded.runtime;
                self.base_path = Some(loaded.base_path);
                self.preview_values = merge_preview_defaults(&self.preview_values, &self.bundle.fields());
                self.status = Some(STATUS_LOADED.into());
            }
            Err(err) => {
                self.not_found = err.is_not_found();
                if !self.not_found {
                    tracing::warn!(doc = %ticket.key, error = %err, "Failed to load native doc files");
                }
                self.error = Some(err.user_message());
            }
        }
        true
    }

    /// Select and load in one call.
    pub async fn load(&mut self, source: &dyn DocDefinitionSource, key: HierarchyKey) -> DeskResult<()> {
        let Some(ticket) = self.select(key) else {
            return Ok(());
        };
        let result = source.load(ticket.key()).await;
        self.finish_load(ticket, result);
        Ok(())
    }

    // ---- editing ----

    fn editable(&self) -> DeskResult<()> {
        match self.state {
            DeskState::Loaded | DeskState::Editing => Ok(()),
            DeskState::Saving => Err(CoreError::Conflict("A save is in progress".into()).into()),
            DeskState::Unselected | DeskState::Loading => {
                Err(CoreError::Conflict("No doc definition is loaded".into()).into())
            }
        }
    }

    fn commit_edit(&mut self, next: DocDefinitionBundle) {
        self.bundle = next;
        self.state = if self.is_dirty() {
            DeskState::Editing
        } else {
            DeskState::Loaded
        };
    }

    /// Replace or transform the `doc` blob.
    pub fn update_native_doc(&mut self, patch: impl Into<Patch<Value>>) -> DeskResult<()> {
        self.editable()?;
        let next = self.bundle.patch_doc(patch);
        self.commit_edit(next);
        Ok(())
    }

    /// Replace or transform the `actions` blob.
    pub fn update_native_actions(&mut self, patch: impl Into<Patch<Value>>) -> DeskResult<()> {
        self.editable()?;
        let next = self.bundle.patch_actions(patch);
        self.commit_edit(next);
        Ok(())
    }

    /// Normalize the authored actions and add the standard runtime actions
    /// (list, view, new, create, edit, update, delete) that are missing.
    pub fn add_runtime_default_actions(&mut self) -> DeskResult<()> {
        self.update_native_actions(Patch::with(|actions: Value| merge_runtime_defaults(&actions)))
    }

    /// Replace or transform `schema.fields`; new fields get preview values.
    pub fn update_native_schema_fields(&mut self, patch: impl Into<Patch<Vec<Value>>>) -> DeskResult<()> {
        self.editable()?;
        let next = self.bundle.patch_schema_fields(patch);
        self.preview_values = merge_preview_defaults(&self.preview_values, &next.fields());
        self.commit_edit(next);
        Ok(())
    }

    /// Capability to edit one block of `doc`.
    pub fn doc_block(&self, block: DocBlock) -> DocBlockLens {
        DocBlockLens::new(block)
    }

    /// Patch one `doc` block through its lens.
    pub fn patch_doc_block(&mut self, lens: DocBlockLens, patch: impl Into<Patch<Value>>) -> DeskResult<()> {
        self.editable()?;
        let next = lens.patch(&self.bundle, patch);
        self.commit_edit(next);
        Ok(())
    }

    /// Merge a whole schema object from the schema studio.
    pub fn apply_schema_config(&mut self, config: &Value) -> DeskResult<()> {
        self.editable()?;
        let next = self.bundle.apply_schema_config(config);
        if config.get("fields").is_some_and(Value::is_array) {
            self.preview_values = merge_preview_defaults(&self.preview_values, &next.fields());
        }
        self.commit_edit(next);
        Ok(())
    }

    /// Edit a form-preview value. Never touches the bundle.
    pub fn set_preview_value(&mut self, fieldname: impl Into<String>, value: Value) {
        self.preview_values.insert(fieldname.into(), value);
    }

    pub fn set_doc_meta(&mut self, meta: Option<DocMeta>) {
        self.doc_meta = meta;
    }

    // ---- derived views ----

    /// Schema fields for previews: the native schema's, else the doc
    /// metadata schema's.
    fn preview_schema(&self) -> Schema {
        let native = self.bundle.schema();
        if native.get("fields").is_some_and(Value::is_array) {
            return Schema::from_value(native);
        }
        self.doc_meta
            .as_ref()
            .map(|meta| Schema::from_value(&meta.schema))
            .unwrap_or_default()
    }

    pub fn studio_config(&self) -> StudioConfig {
        let name = self
            .key
            .as_ref()
            .map(|k| k.doc.clone())
            .unwrap_or_else(|| STUDIO_PLACEHOLDER_NAME.to_string());

        let native_schema = self.bundle.schema();
        let schema = if native_schema.get("fields").is_some() {
            native_schema.clone()
        } else {
            self.doc_meta
                .as_ref()
                .map(|m| m.schema.clone())
                .filter(|s| s.is_object())
                .unwrap_or_else(|| json!({ "fields": [] }))
        };

        let actions = match self.bundle.actions().get("actions") {
            Some(actions) if !actions.is_null() => actions.clone(),
            _ => Value::Array(
                self.doc_meta
                    .as_ref()
                    .map(|m| m.allowed_actions.clone())
                    .unwrap_or_default(),
            ),
        };

        StudioConfig { name, schema, actions }
    }

    /// List preview table and its single sample row.
    pub fn list_preview(&self) -> (TableConfig, Value) {
        list_preview(&self.preview_schema().fields, &self.preview_values)
    }

    /// Form preview layout, pruned against the preview values.
    pub fn form_preview(&self) -> FormLayout {
        FormLayout::build(&self.preview_schema().normalized_fields()).visible(Some(&self.preview_values))
    }

    // ---- saving ----

    /// Enter `Saving` and capture what to write (all three blobs).
    ///
    /// An invalid schema or actions blob fails with `Validation` and leaves
    /// the desk editable with the message as its error.
    pub fn begin_save(&mut self) -> DeskResult<SaveTicket> {
        self.editable()?;
        let key = self
            .key
            .clone()
            .ok_or_else(|| CoreError::Resolution("No hierarchy key selected".into()))?;
        let request = SaveRequest::all(&self.bundle);
        if let Err(err) = request.validate() {
            self.error = Some(err.to_string());
            return Err(err.into());
        }
        self.state = DeskState::Saving;
        self.status = None;
        self.error = None;
        Ok(SaveTicket {
            seq: self.seq,
            key,
            request,
        })
    }

    /// Apply a save result. Stale tickets (the key changed meanwhile) are
    /// ignored.
    pub fn finish_save(&mut self, ticket: SaveTicket, result: &DeskResult<()>) -> bool {
        if ticket.seq != self.seq {
            tracing::debug!(doc = %ticket.key, "Ignoring save result for a deselected doc");
            return false;
        }
        match result {
            Ok(()) => {
                self.baseline = self.bundle.clone();
                self.not_found = false;
                self.status = Some(STATUS_SAVED.into());
            }
            Err(err) => {
                tracing::warn!(doc = %ticket.key, error = %err, "Failed to save native doc files");
                self.error = Some(err.user_message());
            }
        }
        self.state = if self.is_dirty() {
            DeskState::Editing
        } else {
            DeskState::Loaded
        };
        true
    }

    /// Save the whole bundle through `source`.
    pub async fn save(&mut self, source: &dyn DocDefinitionSource) -> DeskResult<()> {
        let ticket = self.begin_save()?;
        let result = source.save(ticket.key(), ticket.request().clone()).await;
        self.finish_save(ticket, &result);
        result
    }
}

// ---------------------------------------------------------------------------
// Shared desk
// ---------------------------------------------------------------------------

/// A desk shared between concurrent tasks (UI events, background loads).
pub type SharedDesk = Arc<Mutex<BuilderDesk>>;

pub fn shared(desk: BuilderDesk) -> SharedDesk {
    Arc::new(Mutex::new(desk))
}

/// Load `key` into a shared desk without holding the lock across I/O.
///
/// Returns whether this load's result was applied; a later selection
/// makes it stale.
pub async fn load_shared(desk: &SharedDesk, source: &dyn DocDefinitionSource, key: HierarchyKey) -> bool {
    let ticket = desk.lock().await.select(key);
    let Some(ticket) = ticket else {
        return false;
    };
    let result = source.load(ticket.key()).await;
    desk.lock().await.finish_load(ticket, result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
