//! The `{doc, schema, actions}` triple as one immutable value.
//!
//! [`DocDefinitionBundle`] shares each blob behind an `Arc`. Every patch
//! returns a new bundle in which only the targeted blob (or only the
//! targeted key of `doc`) is rebuilt; the other blobs are the very same
//! allocations, so panels editing disjoint parts never clobber each other.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::ActionsDefinition;
use crate::doc::{DocBlock, DocDefinition};
use crate::schema::{normalize_fields, Field, Schema};
use crate::types::FormRecord;

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// An update to one blob: a literal replacement, or a pure function of the
/// previous value.
pub enum Patch<T> {
    Replace(T),
    With(Box<dyn FnOnce(T) -> T + Send>),
}

impl<T> Patch<T> {
    /// Build a functional patch.
    pub fn with(f: impl FnOnce(T) -> T + Send + 'static) -> Self {
        Self::With(Box::new(f))
    }

    pub fn apply(self, previous: T) -> T {
        match self {
            Self::Replace(value) => value,
            Self::With(f) => f(previous),
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Self::Replace(value)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn as_object_or_empty(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// NativeFiles (wire form)
// ---------------------------------------------------------------------------

/// Plain serializable form of the triple, as exchanged over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeFiles {
    #[serde(default = "empty_object")]
    pub doc: Value,
    #[serde(default = "empty_object")]
    pub schema: Value,
    #[serde(default = "empty_object")]
    pub actions: Value,
}

impl Default for NativeFiles {
    fn default() -> Self {
        Self {
            doc: empty_object(),
            schema: empty_object(),
            actions: empty_object(),
        }
    }
}

// ---------------------------------------------------------------------------
// DocDefinitionBundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DocDefinitionBundle {
    doc: Arc<Value>,
    schema: Arc<Value>,
    actions: Arc<Value>,
}

impl Default for DocDefinitionBundle {
    fn default() -> Self {
        Self::from(NativeFiles::default())
    }
}

impl From<NativeFiles> for DocDefinitionBundle {
    fn from(files: NativeFiles) -> Self {
        Self::new(files.doc, files.schema, files.actions)
    }
}

impl From<&DocDefinitionBundle> for NativeFiles {
    fn from(bundle: &DocDefinitionBundle) -> Self {
        Self {
            doc: bundle.doc().clone(),
            schema: bundle.schema().clone(),
            actions: bundle.actions().clone(),
        }
    }
}

impl DocDefinitionBundle {
    /// Build a bundle; `null` blobs are read as `{}`.
    pub fn new(doc: Value, schema: Value, actions: Value) -> Self {
        let or_empty = |v: Value| if v.is_null() { empty_object() } else { v };
        Self {
            doc: Arc::new(or_empty(doc)),
            schema: Arc::new(or_empty(schema)),
            actions: Arc::new(or_empty(actions)),
        }
    }

    pub fn doc(&self) -> &Value {
        &self.doc
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn actions(&self) -> &Value {
        &self.actions
    }

    /// `true` when `other` holds the very same blob allocations.
    pub fn shares_blobs_with(&self, other: &Self) -> (bool, bool, bool) {
        (
            Arc::ptr_eq(&self.doc, &other.doc),
            Arc::ptr_eq(&self.schema, &other.schema),
            Arc::ptr_eq(&self.actions, &other.actions),
        )
    }

    // ---- typed views ----

    pub fn doc_definition(&self) -> DocDefinition<'_> {
        DocDefinition::new(&self.doc)
    }

    pub fn typed_schema(&self) -> Schema {
        Schema::from_value(&self.schema)
    }

    /// Normalized schema fields.
    pub fn fields(&self) -> Vec<Field> {
        normalize_fields(&self.typed_schema().fields)
    }

    pub fn actions_definition(&self) -> ActionsDefinition {
        ActionsDefinition::from_value(&self.actions)
    }

    /// Raw `schema.fields` entries (empty when absent or not an array).
    pub fn raw_schema_fields(&self) -> Vec<Value> {
        self.schema
            .get("fields")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    // ---- patches ----

    /// Patch the whole `doc` blob.
    pub fn patch_doc(&self, patch: impl Into<Patch<Value>>) -> Self {
        Self {
            doc: Arc::new(patch.into().apply((*self.doc).clone())),
            ..self.clone()
        }
    }

    /// Patch the whole `actions` blob.
    pub fn patch_actions(&self, patch: impl Into<Patch<Value>>) -> Self {
        Self {
            actions: Arc::new(patch.into().apply((*self.actions).clone())),
            ..self.clone()
        }
    }

    /// Patch `schema.fields`, keeping the other schema keys.
    ///
    /// The updater sees `[]` when the schema has no fields array.
    pub fn patch_schema_fields(&self, patch: impl Into<Patch<Vec<Value>>>) -> Self {
        let next_fields = patch.into().apply(self.raw_schema_fields());
        let mut schema = as_object_or_empty(&self.schema);
        schema.insert("fields".into(), Value::Array(next_fields));
        Self {
            schema: Arc::new(Value::Object(schema)),
            ..self.clone()
        }
    }

    /// Patch a single block of `doc`, leaving every other key untouched.
    ///
    /// The updater sees `{}` when the block is absent.
    pub fn patch_doc_block(&self, block: DocBlock, patch: impl Into<Patch<Value>>) -> Self {
        let mut doc = as_object_or_empty(&self.doc);
        let previous = doc.get(block.key()).cloned().unwrap_or_else(empty_object);
        doc.insert(block.key().to_string(), patch.into().apply(previous));
        Self {
            doc: Arc::new(Value::Object(doc)),
            ..self.clone()
        }
    }

    /// Merge a full schema config from the schema builder.
    ///
    /// Top-level keys of `config` overwrite the schema's; `fields` is only
    /// replaced when `config` carries a fields array.
    pub fn apply_schema_config(&self, config: &Value) -> Self {
        let mut schema = as_object_or_empty(&self.schema);
        let existing_fields = schema.get("fields").cloned();
        if let Some(incoming) = config.as_object() {
            for (key, value) in incoming {
                schema.insert(key.clone(), value.clone());
            }
        }
        let fields = match config.get("fields") {
            Some(Value::Array(fields)) => Value::Array(fields.clone()),
            _ => existing_fields.unwrap_or_else(|| Value::Array(Vec::new())),
        };
        schema.insert("fields".into(), fields);
        Self {
            schema: Arc::new(Value::Object(schema)),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// DocBlockLens
// ---------------------------------------------------------------------------

/// Narrow capability to patch exactly one block of `doc`.
///
/// Handed to a panel (chart, dashboard, page, ...) instead of the whole
/// bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocBlockLens {
    block: DocBlock,
}

impl DocBlockLens {
    pub fn new(block: DocBlock) -> Self {
        Self { block }
    }

    pub fn block(&self) -> DocBlock {
        self.block
    }

    /// Current block value, `{}` when absent.
    pub fn get(&self, bundle: &DocDefinitionBundle) -> Value {
        bundle
            .doc()
            .get(self.block.key())
            .cloned()
            .unwrap_or_else(empty_object)
    }

    pub fn patch(
        &self,
        bundle: &DocDefinitionBundle,
        patch: impl Into<Patch<Value>>,
    ) -> DocDefinitionBundle {
        bundle.patch_doc_block(self.block, patch)
    }
}

/// Seed builder preview values with a default for every new field.
///
/// Existing entries are never overwritten. The seeded default is the
/// field's `default`, or `""`.
pub fn merge_preview_defaults(values: &FormRecord, fields: &[Field]) -> FormRecord {
    let mut next = values.clone();
    for field in fields {
        let Some(key) = field.key() else { continue };
        if next.contains_key(key) {
            continue;
        }
        let default = field
            .default
            .clone()
            .filter(|d| !d.is_null())
            .unwrap_or_else(|| Value::String(String::new()));
        next.insert(key.to_string(), default);
    }
    next
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bundle() -> DocDefinitionBundle {
        DocDefinitionBundle::new(
            json!({"page": {"title": "Invoice"}, "chart": {"type": "bar"}}),
            json!({"fields": [{"fieldname": "status"}], "title_field": "status"}),
            json!({"actions": [{"id": "approve"}]}),
        )
    }

    #[test]
    fn doc_patch_leaves_schema_and_actions_untouched() {
        let before = bundle();
        let after = before.patch_doc(Patch::with(|mut d: Value| {
            d["chart"] = json!({"type": "line"});
            d
        }));

        assert_eq!(after.doc()["chart"], json!({"type": "line"}));
        let (doc_shared, schema_shared, actions_shared) = after.shares_blobs_with(&before);
        assert!(!doc_shared);
        assert!(schema_shared);
        assert!(actions_shared);
        assert_eq!(
            serde_json::to_string(after.schema()).unwrap(),
            serde_json::to_string(before.schema()).unwrap()
        );
    }

    #[test]
    fn block_patches_compose_without_clobbering() {
        let chart = DocBlockLens::new(DocBlock::Chart);
        let page = DocBlockLens::new(DocBlock::Page);

        let b = bundle();
        let b = chart.patch(&b, Patch::with(|mut c: Value| {
            c["type"] = json!("pie");
            c
        }));
        let b = page.patch(&b, Patch::with(|mut p: Value| {
            p["dir"] = json!("rtl");
            p
        }));

        assert_eq!(b.doc()["chart"], json!({"type": "pie"}));
        assert_eq!(b.doc()["page"], json!({"title": "Invoice", "dir": "rtl"}));
    }

    #[test]
    fn absent_block_patches_from_empty_object() {
        let lens = DocBlockLens::new(DocBlock::Dashboard);
        let b = bundle();
        assert_eq!(lens.get(&b), json!({}));
        let b = lens.patch(&b, json!({"widgets": []}));
        assert_eq!(b.doc()["dashboard"], json!({"widgets": []}));
        // Key order of the existing blocks is preserved.
        let keys: Vec<_> = b.doc().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["page", "chart", "dashboard"]);
    }

    #[test]
    fn schema_field_patch_keeps_other_schema_keys() {
        let b = bundle().patch_schema_fields(Patch::with(|mut fields: Vec<Value>| {
            fields.push(json!({"fieldname": "total"}));
            fields
        }));
        assert_eq!(b.raw_schema_fields().len(), 2);
        assert_eq!(b.schema()["title_field"], json!("status"));
    }

    #[test]
    fn literal_replacement_of_actions() {
        let b = bundle().patch_actions(json!({"actions": []}));
        assert!(b.actions_definition().actions.is_empty());
    }

    #[test]
    fn schema_config_keeps_fields_when_absent() {
        let b = bundle().apply_schema_config(&json!({"sort_field": "modified"}));
        assert_eq!(b.raw_schema_fields().len(), 1);
        assert_eq!(b.schema()["sort_field"], json!("modified"));

        let b = b.apply_schema_config(&json!({"fields": []}));
        assert!(b.raw_schema_fields().is_empty());
    }

    #[test]
    fn null_blobs_read_as_empty_objects() {
        let b = DocDefinitionBundle::new(Value::Null, json!({}), Value::Null);
        assert_eq!(b.doc(), &json!({}));
        assert_eq!(b.actions(), &json!({}));
        assert!(b.fields().is_empty());
    }

    #[test]
    fn preview_defaults_never_overwrite() {
        let mut values = FormRecord::new();
        values.insert("status".into(), json!("approved"));
        let mut total = Field::new("total");
        total.default = Some(json!(0));
        let fields = vec![Field::new("status"), total, Field::new("notes")];

        let next = merge_preview_defaults(&values, &fields);
        assert_eq!(next["status"], json!("approved"));
        assert_eq!(next["total"], json!(0));
        assert_eq!(next["notes"], json!(""));
    }
}
