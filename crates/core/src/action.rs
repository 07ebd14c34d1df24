//! `actions.json`: runtime actions, workflow and permissions.
//!
//! Also holds the pure rules of action execution: the precondition check
//! that runs before any network call, the endpoint convention and the
//! response-envelope test for success.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::lenient;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// What kind of operation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Server,
    Workflow,
    Ui,
}

impl<'de> Deserialize<'de> for ActionKind {
    /// Case-insensitive; anything unrecognised is a server action.
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        let kind = value
            .as_ref()
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_lowercase());
        Ok(match kind.as_deref() {
            Some("workflow") => Self::Workflow,
            Some("ui") => Self::Ui,
            _ => Self::Server,
        })
    }
}

/// HTTP methods an action may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl ActionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl FromStr for ActionMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "POST" => Ok(Self::Post),
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(CoreError::Validation(format!(
                "Invalid action method '{other}'. Must be one of: GET, POST, PUT, PATCH, DELETE"
            ))),
        }
    }
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of `actions.actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub method: Option<String>,
    #[serde(default)]
    pub kind: ActionKind,
    #[serde(default = "default_enabled", deserialize_with = "lenient::enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub precondition: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub next_state: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Action {
    fn preset(id: &str, label: &str, method: ActionMethod, kind: ActionKind) -> Self {
        Self {
            id: id.to_string(),
            label: Some(label.to_string()),
            method: Some(method.as_str().to_string()),
            kind,
            enabled: true,
            precondition: None,
            next_state: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Read the `index`-th authored row the way the builder edits it: a
    /// missing id becomes `action_<n>`, the label falls back to the authored
    /// id then `Action <n>`, and the method to `POST`.
    ///
    /// Rows that are not objects normalize to a blank action.
    pub fn normalized(raw: &Value, index: usize) -> Self {
        let mut action = serde_json::from_value::<Action>(raw.clone()).unwrap_or_else(|_| Self {
            label: None,
            method: None,
            ..Self::preset("", "", ActionMethod::Post, ActionKind::Server)
        });
        let n = index + 1;
        let authored_id = action.id.trim().to_string();

        if action.label.is_none() {
            action.label = Some(if authored_id.is_empty() {
                format!("Action {n}")
            } else {
                authored_id.clone()
            });
        }
        action.id = if authored_id.is_empty() {
            format!("action_{n}")
        } else {
            authored_id
        };
        if action.method.is_none() {
            action.method = Some(ActionMethod::Post.as_str().to_string());
        }
        action
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().filter(|l| !l.is_empty()).unwrap_or(&self.id)
    }

    /// Configured HTTP method; `POST` when not authored.
    pub fn http_method(&self) -> Result<ActionMethod, CoreError> {
        self.method.as_deref().unwrap_or_default().parse()
    }
}

// ---------------------------------------------------------------------------
// ActionsDefinition
// ---------------------------------------------------------------------------

/// Typed view over an `actions.json` blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionsDefinition {
    pub actions: Vec<Action>,
    pub workflow: Value,
    pub permissions: Value,
}

impl ActionsDefinition {
    /// Read an actions blob leniently; entries without an `id` are skipped.
    pub fn from_value(value: &Value) -> Self {
        let actions = value
            .get("actions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<Action>(item.clone()).ok())
                    .filter(|action| !action.id.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            actions,
            workflow: value.get("workflow").cloned().unwrap_or(Value::Null),
            permissions: value.get("permissions").cloned().unwrap_or(Value::Null),
        }
    }

    /// Actions offered to users (`enabled != false`).
    pub fn enabled_actions(&self) -> Vec<&Action> {
        self.actions.iter().filter(|a| a.enabled).collect()
    }

    pub fn find(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }
}

/// The conventional runtime actions a builder can add in one step.
pub const STANDARD_RUNTIME_ACTIONS: [(&str, &str, ActionMethod, ActionKind); 7] = [
    ("list", "List", ActionMethod::Get, ActionKind::Ui),
    ("view", "View", ActionMethod::Get, ActionKind::Ui),
    ("new", "New", ActionMethod::Get, ActionKind::Ui),
    ("create", "Create", ActionMethod::Post, ActionKind::Server),
    ("edit", "Edit", ActionMethod::Get, ActionKind::Ui),
    ("update", "Update", ActionMethod::Patch, ActionKind::Server),
    ("delete", "Delete", ActionMethod::Delete, ActionKind::Server),
];

/// Normalized rows of an actions blob, in authored order.
pub fn normalized_actions(blob: &Value) -> Vec<Action> {
    blob.get("actions")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .enumerate()
                .map(|(index, raw)| Action::normalized(raw, index))
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize the authored rows and append every standard runtime action
/// whose id is not already present.
///
/// Rows sharing an id collapse into one, kept at the first position with the
/// last row's content. Every other key of `blob` is preserved.
pub fn merge_runtime_defaults(blob: &Value) -> Value {
    let mut rows: Vec<Action> = Vec::new();
    for action in normalized_actions(blob) {
        match rows.iter_mut().find(|row| row.id == action.id) {
            Some(row) => *row = action,
            None => rows.push(action),
        }
    }
    for (id, label, method, kind) in STANDARD_RUNTIME_ACTIONS {
        if !rows.iter().any(|row| row.id == id) {
            rows.push(Action::preset(id, label, method, kind));
        }
    }

    let mut out = blob.as_object().cloned().unwrap_or_default();
    let rows = rows
        .iter()
        .filter_map(|row| serde_json::to_value(row).ok())
        .collect();
    out.insert("actions".into(), Value::Array(rows));
    Value::Object(out)
}

/// Check that action ids are unique and every method is recognised.
pub fn validate_actions(definition: &ActionsDefinition) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for action in &definition.actions {
        if !seen.insert(action.id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate action id '{}'",
                action.id
            )));
        }
        action.http_method()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Execution rules
// ---------------------------------------------------------------------------

/// A fully-specified action invocation.
///
/// Construction is the precondition check: a request only exists when the
/// doc key, record id and action id are all present.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub doc_key: String,
    pub record_id: String,
    pub action_id: String,
    pub method: ActionMethod,
    pub payload: Value,
}

impl ActionRequest {
    pub fn new(
        doc_key: Option<&str>,
        record_id: Option<&str>,
        action_id: Option<&str>,
        payload: Value,
    ) -> Result<Self, CoreError> {
        let present = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        match (present(doc_key), present(record_id), present(action_id)) {
            (Some(doc_key), Some(record_id), Some(action_id)) => Ok(Self {
                doc_key,
                record_id,
                action_id,
                method: ActionMethod::default(),
                payload,
            }),
            _ => Err(CoreError::Validation("Missing doc/action context".into())),
        }
    }

    pub fn with_method(mut self, method: ActionMethod) -> Self {
        self.method = method;
        self
    }

    /// `<docKey>/<recordId>/actions/<actionId>`.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/actions/{}",
            self.doc_key, self.record_id, self.action_id
        )
    }
}

/// Error message carried by a response envelope, if any.
///
/// The backend reports some failures with HTTP 200, so success is decided
/// by the envelope alone: any non-empty `error` key is a failure.
pub fn envelope_error(response: &Value) -> Option<String> {
    let error = response.get("error")?;
    let failed = match error {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    };
    if !failed {
        return None;
    }
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .or_else(|| error.as_str())
        .unwrap_or("Action failed");
    Some(message.to_string())
}

/// Unwrap `data` from a successful envelope, falling back to the whole body.
pub fn envelope_data(response: Value) -> Value {
    match response {
        Value::Object(mut map) if map.get("data").is_some_and(|d| !d.is_null()) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
