//! In-memory form state for the new/edit/detail views.
//!
//! A [`FormState`] is built from the schema and the backend record, then
//! mutated locally. Nothing here talks to the network; a save or action is
//! always an explicit call made by the owning session.

use serde_json::Value;

use crate::schema::Field;
use crate::types::FormRecord;

/// Initial value of every renderable field.
///
/// `record[key]`, else the field's `default`, else `""`, so every rendered
/// input is controlled. `null` counts as absent at both steps.
pub fn build_initial_form_state(fields: &[Field], record: Option<&FormRecord>) -> FormRecord {
    let mut state = FormRecord::new();
    for field in fields.iter().filter(|f| f.is_renderable()) {
        let Some(key) = field.key() else { continue };
        let value = record
            .and_then(|r| r.get(key))
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| field.default.clone().filter(|d| !d.is_null()))
            .unwrap_or_else(|| Value::String(String::new()));
        state.insert(key.to_string(), value);
    }
    state
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Labels of required renderable fields that have no value.
pub fn validate_required(fields: &[Field], record: &FormRecord) -> Vec<String> {
    fields
        .iter()
        .filter(|f| f.is_renderable() && f.is_required())
        .filter(|f| f.key().is_some_and(|k| is_blank(record.get(k))))
        .map(|f| f.display_label().to_string())
        .collect()
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn clean_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(clean_value)
                .filter(|v| !is_empty_value(v))
                .collect(),
        ),
        Value::Object(map) => Value::Object(clean_for_save(map)),
        other => other.clone(),
    }
}

/// Recursively drop `null`, `""`, `[]` and `{}` before a save.
pub fn clean_for_save(record: &FormRecord) -> FormRecord {
    record
        .iter()
        .map(|(k, v)| (k.clone(), clean_value(v)))
        .filter(|(_, v)| !is_empty_value(v))
        .collect()
}

/// Editable form values plus the baseline they were loaded from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    values: FormRecord,
    baseline: FormRecord,
}

impl FormState {
    pub fn new(fields: &[Field], record: Option<&FormRecord>) -> Self {
        let values = build_initial_form_state(fields, record);
        Self {
            baseline: values.clone(),
            values,
        }
    }

    pub fn values(&self) -> &FormRecord {
        &self.values
    }

    pub fn get(&self, fieldname: &str) -> Option<&Value> {
        self.values.get(fieldname)
    }

    /// Change one value in memory only.
    pub fn set(&mut self, fieldname: impl Into<String>, value: Value) {
        self.values.insert(fieldname.into(), value);
    }

    /// `true` once the values differ from what was loaded.
    pub fn is_dirty(&self) -> bool {
        self.values != self.baseline
    }

    /// Discard local edits.
    pub fn reset(&mut self) {
        self.values = self.baseline.clone();
    }

    /// Accept the current values as the new baseline (after a save).
    pub fn mark_saved(&mut self) {
        self.baseline = self.values.clone();
    }

    /// Cleaned payload for creating a record.
    pub fn save_payload(&self) -> FormRecord {
        clean_for_save(&self.values)
    }

    /// Payload for updating an existing record: the cleaned values plus
    /// every edited key as-is, so a field the user blanked is sent empty
    /// and cleared on the server.
    pub fn update_payload(&self) -> FormRecord {
        let mut payload = clean_for_save(&self.values);
        for (key, value) in &self.values {
            if self.baseline.get(key) != Some(value) {
                payload.insert(key.clone(), value.clone());
            }
        }
        payload
    }
}
