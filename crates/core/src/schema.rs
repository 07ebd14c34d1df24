//! `schema.json`: the ordered field list of a doc.
//!
//! Field metadata is authored loosely (flags may be `0/1`, `true/false` or
//! strings, the type may be given as `fieldtype` or `type`), so [`Field`]
//! deserializes leniently and keeps unknown keys in `extra`.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::is_truthy_flag;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FIELDTYPE_SECTION_BREAK: &str = "Section Break";
pub const FIELDTYPE_COLUMN_BREAK: &str = "Column Break";
pub const FIELDTYPE_TAB_BREAK: &str = "Tab Break";
pub const FIELDTYPE_HTML: &str = "Html";

/// Fieldtype used when none is authored.
pub const DEFAULT_FIELDTYPE: &str = "Data";

/// Structural fieldtypes that are never rendered as inputs (compared
/// case-insensitively).
const PSEUDO_FIELDTYPES: &[&str] = &["section break", "column break", "tab break", "html"];

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(is_truthy_flag(value.as_ref()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Layout boundary introduced by a break pseudo-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    Tab,
    Section,
    Column,
}

/// One entry of `schema.fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub fieldname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub fieldtype: Option<String>,
    /// Alternate spelling of `fieldtype` used by older builders.
    #[serde(
        default,
        rename = "type",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub type_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub required: bool,
    /// Frappe spelling of `required`.
    #[serde(default, deserialize_with = "lenient_flag", skip_serializing)]
    pub reqd: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub read_only: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub hidden: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub in_list_view: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub in_standard_filter: bool,
    /// Legacy alias for `in_standard_filter`.
    #[serde(default, deserialize_with = "lenient_flag", skip_serializing)]
    pub filter: bool,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Field {
    /// Convenience constructor for a plain data field.
    pub fn new(fieldname: impl Into<String>) -> Self {
        let fieldname = fieldname.into();
        Self {
            id: Some(fieldname.clone()),
            fieldname: Some(fieldname),
            ..Self::default()
        }
    }

    /// Record key of this field: `fieldname`, falling back to `id`.
    pub fn key(&self) -> Option<&str> {
        self.fieldname
            .as_deref()
            .or(self.id.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Authored fieldtype, defaulting to `Data`.
    pub fn field_type(&self) -> &str {
        self.fieldtype
            .as_deref()
            .or(self.type_alias.as_deref())
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_FIELDTYPE)
    }

    /// Display label: `label`, else the key.
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or(self.key())
            .unwrap_or_default()
    }

    pub fn is_required(&self) -> bool {
        self.required || self.reqd
    }

    pub fn is_standard_filter(&self) -> bool {
        self.in_standard_filter || self.filter
    }

    /// `true` for structural fields (breaks and static HTML).
    pub fn is_pseudo(&self) -> bool {
        let ty = self.field_type().to_lowercase();
        PSEUDO_FIELDTYPES.contains(&ty.as_str())
    }

    /// Which layout boundary this field opens, if it is a break.
    pub fn break_kind(&self) -> Option<BreakKind> {
        match self.field_type().to_lowercase().as_str() {
            "tab break" => Some(BreakKind::Tab),
            "section break" => Some(BreakKind::Section),
            "column break" => Some(BreakKind::Column),
            _ => None,
        }
    }

    /// A field rendered as an input: keyed, not structural, not hidden.
    pub fn is_renderable(&self) -> bool {
        self.key().is_some() && !self.is_pseudo() && !self.hidden
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Typed view over a `schema.json` blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
    /// Optional explicit field ordering (`field_order`).
    pub field_order: Vec<String>,
}

impl Schema {
    /// Read a schema blob leniently. Non-object entries and entries that
    /// cannot be read as a field are skipped.
    pub fn from_value(value: &Value) -> Self {
        let fields = value
            .get("fields")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .filter_map(|item| match serde_json::from_value::<Field>(item.clone()) {
                        Ok(field) => Some(field),
                        Err(err) => {
                            tracing::warn!(error = %err, "Skipping unreadable schema field");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let field_order = value
            .get("field_order")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            fields,
            field_order,
        }
    }

    /// Fields with `id`/`fieldname`/`name` filled in; see [`normalize_fields`].
    pub fn normalized_fields(&self) -> Vec<Field> {
        normalize_fields(&self.fields)
    }
}

/// Fill in `id` and `fieldname` from each other and `name` from
/// `label`/`fieldname`/`id`. Fields with neither key are dropped.
pub fn normalize_fields(fields: &[Field]) -> Vec<Field> {
    fields
        .iter()
        .filter_map(|field| {
            let key = field.key()?.to_string();
            let mut field = field.clone();
            if field.id.as_deref().map_or(true, str::is_empty) {
                field.id = Some(key.clone());
            }
            if field.fieldname.as_deref().map_or(true, str::is_empty) {
                field.fieldname = Some(key.clone());
            }
            if field.name.as_deref().map_or(true, str::is_empty) {
                field.name = Some(
                    field
                        .label
                        .clone()
                        .filter(|l| !l.is_empty())
                        .unwrap_or(key),
                );
            }
            Some(field)
        })
        .collect()
}

/// Fields rendered as inputs, in schema order.
pub fn renderable_fields(fields: &[Field]) -> Vec<Field> {
    normalize_fields(fields)
        .into_iter()
        .filter(Field::is_renderable)
        .collect()
}

/// Fields flagged `in_list_view`.
pub fn list_view_fields(fields: &[Field]) -> Vec<Field> {
    normalize_fields(fields)
        .into_iter()
        .filter(|f| f.in_list_view && !f.is_pseudo())
        .collect()
}

/// Fields flagged `in_standard_filter` (or legacy `filter`).
pub fn standard_filter_fields(fields: &[Field]) -> Vec<Field> {
    normalize_fields(fields)
        .into_iter()
        .filter(|f| f.is_standard_filter() && !f.is_pseudo())
        .collect()
}

/// Check schema invariants: unique fieldnames, and every `field_order`
/// entry names an existing field.
pub fn validate_schema(schema: &Schema) -> Result<(), CoreError> {
    let fields = schema.normalized_fields();
    let mut seen = HashSet::new();
    for field in &fields {
        let key = field.key().unwrap_or_default();
        if !seen.insert(key) {
            return Err(CoreError::Validation(format!(
                "Duplicate fieldname '{key}' in schema"
            )));
        }
    }

    if let Some(missing) = schema
        .field_order
        .iter()
        .find(|name| !seen.contains(name.as_str()))
    {
        return Err(CoreError::Validation(format!(
            "field_order references unknown field '{missing}'"
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn schema(value: Value) -> Schema {
        Schema::from_value(&value)
    }

    #[test]
    fn lenient_flags_and_type_alias() {
        let s = schema(json!({"fields": [
            {"fieldname": "a", "type": "Int", "reqd": 1, "hidden": "0", "in_list_view": true},
        ]}));
        let f = &s.fields[0];
        assert_eq!(f.field_type(), "Int");
        assert!(f.is_required());
        assert!(!f.hidden);
        assert!(f.in_list_view);
    }

    #[test]
    fn normalize_derives_id_fieldname_and_name() {
        let s = schema(json!({"fields": [
            {"id": "only_id"},
            {"fieldname": "only_name", "label": "Only Name"},
            {"label": "no key"},
        ]}));
        let fields = s.normalized_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].fieldname.as_deref(), Some("only_id"));
        assert_eq!(fields[0].name.as_deref(), Some("only_id"));
        assert_eq!(fields[1].id.as_deref(), Some("only_name"));
        assert_eq!(fields[1].name.as_deref(), Some("Only Name"));
    }

    #[test]
    fn pseudo_and_hidden_fields_are_not_renderable() {
        let s = schema(json!({"fields": [
            {"fieldname": "sec", "fieldtype": "Section Break"},
            {"fieldname": "col", "fieldtype": "column break"},
            {"fieldname": "tab", "fieldtype": "Tab Break"},
            {"fieldname": "blurb", "fieldtype": "HTML"},
            {"fieldname": "secret", "hidden": 1},
            {"fieldname": "title"},
        ]}));
        let keys: Vec<_> = renderable_fields(&s.fields)
            .iter()
            .map(|f| f.key().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["title"]);
    }

    #[test]
    fn break_kinds_are_detected() {
        let mut f = Field::new("x");
        f.fieldtype = Some("Tab Break".into());
        assert_eq!(f.break_kind(), Some(BreakKind::Tab));
        f.fieldtype = Some("Data".into());
        assert_eq!(f.break_kind(), None);
    }

    #[test]
    fn filter_and_list_fields() {
        let s = schema(json!({"fields": [
            {"fieldname": "status", "in_standard_filter": 1, "in_list_view": 1},
            {"fieldname": "legacy", "filter": 1},
            {"fieldname": "notes"},
        ]}));
        let filters: Vec<_> = standard_filter_fields(&s.fields)
            .into_iter()
            .filter_map(|f| f.fieldname)
            .collect();
        assert_eq!(filters, vec!["status", "legacy"]);
        assert_eq!(list_view_fields(&s.fields).len(), 1);
    }

    #[test]
    fn duplicate_fieldnames_fail_validation() {
        let s = schema(json!({"fields": [{"fieldname": "a"}, {"id": "a"}]}));
        assert_matches!(validate_schema(&s), Err(CoreError::Validation(msg)) if msg.contains("'a'"));
    }

    #[test]
    fn field_order_must_resolve() {
        let s = schema(json!({"fields": [{"fieldname": "a"}], "field_order": ["a", "b"]}));
        assert_matches!(validate_schema(&s), Err(CoreError::Validation(msg)) if msg.contains("'b'"));

        let ok = schema(json!({"fields": [{"fieldname": "a"}], "field_order": ["a"]}));
        assert!(validate_schema(&ok).is_ok());
    }

    #[test]
    fn unknown_keys_are_kept() {
        let s = schema(json!({"fields": [{"fieldname": "a", "precision": 2}]}));
        assert_eq!(s.fields[0].extra.get("precision"), Some(&json!(2)));
    }

    #[test]
    fn missing_fields_array_is_empty_schema() {
        assert!(schema(json!({})).fields.is_empty());
    }
}
