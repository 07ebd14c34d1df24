//! Hierarchy catalog: cascading bundle → app → module → submodule → doc
//! selection over the platform catalogs.
//!
//! The seven catalog sources are fetched elsewhere (see the client crate);
//! this module only folds their outcomes into a [`CatalogSnapshot`] and
//! derives options, the visible doc list and the selected hierarchy key.
//! A failed source never poisons the others.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use crate::action::envelope_error;
use crate::hierarchy::HierarchyKey;
use crate::list::{paginate, total_pages, ListState};
use crate::schema::Field;
use crate::types::value_as_text;

/// Option value meaning "no filter".
pub const ALL: &str = "all";

/// Bundle and app used when the user has not narrowed the catalog.
pub const DEFAULT_BUNDLE: &str = "plt";
pub const DEFAULT_APP: &str = "platform_core";

pub const PARTIAL_FAILURE_WARNING: &str =
    "One or more PLT APIs failed. Builder desk is using available responses.";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// First non-empty of `keys` on `item`, rendered as text.
fn text_of(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .filter(|v| !v.is_null())
        .map(value_as_text)
        .find(|s| !s.is_empty())
}

/// Build select options: deduplicated by value, sorted by label, with an
/// optional synthetic `{label: all_label, value: "all"}` entry first.
///
/// Items without a value are skipped; a missing label falls back to the
/// value.
pub fn to_options<V, L>(items: &[Value], value_of: V, label_of: L, all_label: Option<&str>) -> Vec<SelectOption>
where
    V: Fn(&Value) -> Option<String>,
    L: Fn(&Value) -> Option<String>,
{
    let mut rows: Vec<SelectOption> = Vec::new();
    for item in items {
        let Some(value) = value_of(item).filter(|v| !v.is_empty()) else {
            continue;
        };
        if rows.iter().any(|r| r.value == value) {
            continue;
        }
        let label = label_of(item)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| value.clone());
        rows.push(SelectOption { label, value });
    }
    rows.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));

    let mut out = Vec::with_capacity(rows.len() + 1);
    if let Some(all_label) = all_label {
        out.push(SelectOption {
            label: all_label.to_string(),
            value: ALL.to_string(),
        });
    }
    out.extend(rows);
    out
}

/// Unwrap a catalog response body: `body.data` when present, else the body
/// itself. `null` and bodies carrying an `error` are treated as no data.
pub fn unwrap_data(body: &Value) -> Option<Value> {
    if body.is_null() || envelope_error(body).is_some() {
        return None;
    }
    match body.get("data") {
        Some(inner) if !inner.is_null() => Some(inner.clone()),
        _ => Some(body.clone()),
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The independent catalog endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Session,
    Launcher,
    Apps,
    Modules,
    Submodules,
    Workspaces,
    Sandbox,
}

impl CatalogSource {
    pub const ALL: [CatalogSource; 7] = [
        Self::Session,
        Self::Launcher,
        Self::Apps,
        Self::Modules,
        Self::Submodules,
        Self::Workspaces,
        Self::Sandbox,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Launcher => "launcher",
            Self::Apps => "apps",
            Self::Modules => "modules",
            Self::Submodules => "submodules",
            Self::Workspaces => "workspaces",
            Self::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What each source returned, plus its ok/error status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSnapshot {
    status: BTreeMap<CatalogSource, bool>,
    data: BTreeMap<CatalogSource, Value>,
}

impl CatalogSnapshot {
    /// Record one source outcome. Errors, including bodies carrying an
    /// `error` key, are logged and kept as a failed status; other bodies are
    /// unwrapped with [`unwrap_data`].
    pub fn record<E: fmt::Display>(&mut self, source: CatalogSource, outcome: Result<Value, E>) {
        match outcome {
            Ok(body) => {
                let error = envelope_error(&body);
                if let Some(message) = &error {
                    tracing::warn!(source = %source, error = %message, "Catalog source reported an error");
                }
                self.status.insert(source, error.is_none());
                match unwrap_data(&body) {
                    Some(data) => {
                        self.data.insert(source, data);
                    }
                    None => {
                        self.data.remove(&source);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(source = %source, error = %err, "Catalog source failed");
                self.status.insert(source, false);
                self.data.remove(&source);
            }
        }
    }

    /// Per-source ok flag. Sources never recorded are absent.
    pub fn api_status(&self) -> &BTreeMap<CatalogSource, bool> {
        &self.status
    }

    /// Aggregate warning, raised only when at least one source failed.
    pub fn warning(&self) -> Option<&'static str> {
        self.status
            .values()
            .any(|ok| !ok)
            .then_some(PARTIAL_FAILURE_WARNING)
    }

    pub fn data(&self, source: CatalogSource) -> Option<&Value> {
        self.data.get(&source)
    }

    fn list(&self, source: CatalogSource, key: &str) -> Option<Vec<Value>> {
        self.data(source)?.get(key)?.as_array().cloned()
    }

    /// `launcher.bundle` as a single-entry list.
    pub fn bundles(&self) -> Vec<Value> {
        self.data(CatalogSource::Launcher)
            .and_then(|l| l.get("bundle"))
            .filter(|b| !b.is_null())
            .map(|b| vec![b.clone()])
            .unwrap_or_default()
    }

    pub fn apps(&self) -> Vec<Value> {
        self.list(CatalogSource::Apps, "apps")
            .or_else(|| self.list(CatalogSource::Launcher, "apps"))
            .unwrap_or_default()
    }

    pub fn modules(&self) -> Vec<Value> {
        self.list(CatalogSource::Modules, "modules")
            .or_else(|| self.list(CatalogSource::Launcher, "modules"))
            .unwrap_or_default()
    }

    pub fn submodules(&self) -> Vec<Value> {
        self.list(CatalogSource::Submodules, "submodules")
            .or_else(|| self.list(CatalogSource::Launcher, "submodules"))
            .unwrap_or_default()
    }

    pub fn docs(&self) -> Vec<Value> {
        self.list(CatalogSource::Sandbox, "docs").unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Cascading select state. Changing a level resets every level below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogFilters {
    pub bundle: String,
    pub app: String,
    pub module: String,
    pub submodule: String,
    pub doc: String,
    pub search: String,
}

impl Default for CatalogFilters {
    fn default() -> Self {
        Self {
            bundle: ALL.into(),
            app: ALL.into(),
            module: ALL.into(),
            submodule: ALL.into(),
            doc: ALL.into(),
            search: String::new(),
        }
    }
}

fn is_set(filter: &str) -> bool {
    filter != ALL && !filter.is_empty()
}

// ---------------------------------------------------------------------------
// Per-doc metadata
// ---------------------------------------------------------------------------

/// Unwrapped `docs/meta/<docKey>` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocMeta {
    pub allowed_actions: Vec<Value>,
    pub schema: Value,
}

impl DocMeta {
    pub fn from_value(value: &Value) -> Self {
        Self {
            allowed_actions: value
                .get("allowed_actions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            schema: value.get("schema").cloned().unwrap_or_else(|| json!({})),
        }
    }

    pub fn field_count(&self) -> usize {
        self.schema
            .get("fields")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

// ---------------------------------------------------------------------------
// DocCatalog
// ---------------------------------------------------------------------------

/// Columns of the builder's doc table.
pub fn docs_table_fields() -> Vec<Field> {
    [
        ("id", "ID", "Data", false),
        ("doc_key", "Doc Key", "Data", true),
        ("module", "Module", "Data", true),
        ("submodule", "Submodule", "Data", true),
        ("actions_count", "Actions", "Int", false),
    ]
    .into_iter()
    .map(|(name, label, fieldtype, filter)| {
        let mut field = Field::new(name);
        field.label = Some(label.into());
        field.fieldtype = Some(fieldtype.into());
        field.in_list_view = true;
        field.in_standard_filter = filter;
        field
    })
    .collect()
}

/// Snapshot plus the user's filter and table state.
#[derive(Debug, Clone, PartialEq)]
pub struct DocCatalog {
    snapshot: CatalogSnapshot,
    filters: CatalogFilters,
    table: ListState,
}

impl DocCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot,
            filters: CatalogFilters::default(),
            table: ListState::new(&docs_table_fields()),
        }
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn filters(&self) -> &CatalogFilters {
        &self.filters
    }

    pub fn table(&self) -> &ListState {
        &self.table
    }

    // -- filter setters ----------------------------------------------------

    fn reset_page(&mut self) {
        self.table.set_page(1, 0);
    }

    pub fn set_bundle(&mut self, value: impl Into<String>) {
        self.filters.bundle = value.into();
        self.filters.app = ALL.into();
        self.set_app_inner();
    }

    pub fn set_app(&mut self, value: impl Into<String>) {
        self.filters.app = value.into();
        self.set_app_inner();
    }

    fn set_app_inner(&mut self) {
        self.filters.module = ALL.into();
        self.filters.submodule = ALL.into();
        self.filters.doc = ALL.into();
        self.reset_page();
    }

    pub fn set_module(&mut self, value: impl Into<String>) {
        self.filters.module = value.into();
        self.filters.submodule = ALL.into();
        self.filters.doc = ALL.into();
        self.reset_page();
    }

    pub fn set_submodule(&mut self, value: impl Into<String>) {
        self.filters.submodule = value.into();
        self.filters.doc = ALL.into();
        self.reset_page();
    }

    pub fn set_doc(&mut self, value: impl Into<String>) {
        self.filters.doc = value.into();
        self.reset_page();
    }

    pub fn set_search(&mut self, value: impl Into<String>) {
        self.filters.search = value.into();
        self.reset_page();
    }

    /// Per-column doc table filter (`doc_key`, `module`, `submodule`).
    pub fn set_table_filter(&mut self, column: &str, value: impl Into<String>) -> bool {
        self.table.set_filter(column, value)
    }

    pub fn clear_table_filters(&mut self) {
        self.table.clear_filters();
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.table.set_page_size(page_size);
    }

    pub fn set_page(&mut self, page: usize) {
        let total = self.docs_table_rows().len();
        self.table.set_page(page, total);
    }

    // -- cascading lists ---------------------------------------------------

    pub fn filtered_apps(&self) -> Vec<Value> {
        cascade(self.snapshot.apps(), &self.filters.bundle, &["bundle_id", "bundle"])
    }

    pub fn filtered_modules(&self) -> Vec<Value> {
        cascade(self.snapshot.modules(), &self.filters.app, &["app_id", "app"])
    }

    pub fn filtered_submodules(&self) -> Vec<Value> {
        cascade(
            self.snapshot.submodules(),
            &self.filters.module,
            &["module_id", "module"],
        )
    }

    /// Docs passing the module/submodule/doc selects and the free-text
    /// search over doc key, module and submodule.
    pub fn visible_docs(&self) -> Vec<Value> {
        let f = &self.filters;
        let needle = f.search.trim().to_lowercase();
        self.snapshot
            .docs()
            .into_iter()
            .filter(|d| {
                let module = text_of(d, &["module", "module_key"]).unwrap_or_default();
                let submodule = text_of(d, &["submodule", "submodule_key"]).unwrap_or_default();
                let doc_key = text_of(d, &["doc_key"]).unwrap_or_default();
                if is_set(&f.module) && module != f.module {
                    return false;
                }
                if is_set(&f.submodule) && submodule != f.submodule {
                    return false;
                }
                if is_set(&f.doc) && doc_key != f.doc {
                    return false;
                }
                if needle.is_empty() {
                    return true;
                }
                ["doc_key", "module", "module_key", "submodule", "submodule_key"]
                    .iter()
                    .filter_map(|k| text_of(d, &[k]))
                    .any(|v| v.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Table rows for the visible docs, after the per-column filters.
    pub fn docs_table_rows(&self) -> Vec<Value> {
        let rows: Vec<Value> = self
            .visible_docs()
            .iter()
            .enumerate()
            .map(|(index, d)| {
                let doc_key = text_of(d, &["doc_key"]);
                json!({
                    "id": doc_key.clone().unwrap_or_else(|| format!("doc-{index}")),
                    "doc_key": doc_key.unwrap_or_else(|| "-".into()),
                    "module": text_of(d, &["module", "module_key"]).unwrap_or_else(|| "-".into()),
                    "submodule": text_of(d, &["submodule", "submodule_key"]).unwrap_or_else(|| "-".into()),
                    "actions_count": d.get("actions").and_then(Value::as_array).map_or(0, Vec::len),
                })
            })
            .collect();
        self.table.apply(&rows).into_iter().cloned().collect()
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.docs_table_rows().len(), self.table.page_size())
    }

    pub fn paged_docs(&self) -> Vec<Value> {
        paginate(&self.docs_table_rows(), self.table.page(), self.table.page_size())
    }

    /// The doc select when set, else the first table row.
    pub fn selected_doc_key(&self) -> Option<String> {
        if is_set(&self.filters.doc) {
            return Some(self.filters.doc.clone());
        }
        self.docs_table_rows()
            .first()
            .and_then(|row| row.get("doc_key"))
            .and_then(Value::as_str)
            .filter(|k| *k != "-")
            .map(str::to_string)
    }

    /// The raw catalog entry of the selected doc.
    pub fn selected_doc_row(&self) -> Option<Value> {
        let key = self.selected_doc_key()?;
        self.visible_docs()
            .into_iter()
            .find(|d| text_of(d, &["doc_key"]).as_deref() == Some(key.as_str()))
    }

    /// Hierarchy key of the current selection.
    ///
    /// Bundle and app default to the platform core; module and submodule
    /// come from the selected doc row, else from the selects. Segments that
    /// cannot be determined are left empty, so the key is incomplete.
    pub fn selected_key(&self) -> HierarchyKey {
        let f = &self.filters;
        let row = self.selected_doc_row();
        let pick = |keys: &[&str], filter: &str| {
            row.as_ref()
                .and_then(|r| text_of(r, keys))
                .or_else(|| is_set(filter).then(|| filter.to_string()))
                .unwrap_or_default()
        };
        HierarchyKey::new(
            if is_set(&f.bundle) { f.bundle.as_str() } else { DEFAULT_BUNDLE },
            if is_set(&f.app) { f.app.as_str() } else { DEFAULT_APP },
            pick(&["module", "module_key"], &f.module),
            pick(&["submodule", "submodule_key"], &f.submodule),
            self.selected_doc_key().unwrap_or_default(),
        )
    }

    // -- options -----------------------------------------------------------

    pub fn bundle_options(&self) -> Vec<SelectOption> {
        to_options(&self.snapshot.bundles(), id_of, label_of, Some("All Bundles"))
    }

    pub fn app_options(&self) -> Vec<SelectOption> {
        to_options(&self.filtered_apps(), id_of, label_of, Some("All Apps"))
    }

    pub fn module_options(&self) -> Vec<SelectOption> {
        to_options(&self.filtered_modules(), id_of, label_of, Some("All Modules"))
    }

    pub fn submodule_options(&self) -> Vec<SelectOption> {
        to_options(
            &self.filtered_submodules(),
            |s| text_of(s, &["submodule_key", "id"]),
            label_of,
            Some("All Submodules"),
        )
    }

    pub fn doc_options(&self) -> Vec<SelectOption> {
        let doc_key = |d: &Value| text_of(d, &["doc_key"]);
        to_options(&self.visible_docs(), doc_key, doc_key, Some("All Docs"))
    }
}

fn id_of(item: &Value) -> Option<String> {
    text_of(item, &["id"])
}

fn label_of(item: &Value) -> Option<String> {
    text_of(item, &["label", "name"])
}

fn cascade(items: Vec<Value>, filter: &str, keys: &[&str]) -> Vec<Value> {
    if !is_set(filter) {
        return items;
    }
    items
        .into_iter()
        .filter(|item| text_of(item, keys).as_deref() == Some(filter))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
