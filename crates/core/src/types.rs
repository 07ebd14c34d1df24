/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A form or backend record: fieldname -> value, in authored order.
pub type FormRecord = serde_json::Map<String, serde_json::Value>;

/// Render a record value the way the runtime compares and filters it.
///
/// Strings are used verbatim, numbers and booleans use their JSON text,
/// `null` renders as the empty string. Arrays and objects render as
/// compact JSON.
pub fn value_as_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `true` for JSON values that count as "set" in loosely typed metadata:
/// `true`, non-zero numbers and the strings `"1"` / `"true"`.
pub fn is_truthy_flag(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(serde_json::Value::String(s)) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

/// Serde field helpers for loosely typed authored JSON.
///
/// Authored files come from hand edits and older builders, so a scalar of
/// the wrong type is read as text rather than dropping the whole entry.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::value_as_text;

    /// Any scalar as text; `null` and empty strings are `None`.
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .map(value_as_text)
            .filter(|s| !s.is_empty()))
    }

    /// Like [`text`], with `""` for absent values.
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(text(deserializer)?.unwrap_or_default())
    }

    /// Only an explicit `false` disables.
    pub fn enabled<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(!matches!(value, Some(Value::Bool(false))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_as_text_renders_scalars() {
        assert_eq!(value_as_text(&json!("draft")), "draft");
        assert_eq!(value_as_text(&json!(12)), "12");
        assert_eq!(value_as_text(&json!(true)), "true");
        assert_eq!(value_as_text(&json!(null)), "");
    }

    #[test]
    fn truthy_flags_accept_loose_metadata() {
        assert!(is_truthy_flag(Some(&json!(1))));
        assert!(is_truthy_flag(Some(&json!(true))));
        assert!(is_truthy_flag(Some(&json!("1"))));
        assert!(!is_truthy_flag(Some(&json!(0))));
        assert!(!is_truthy_flag(Some(&json!(""))));
        assert!(!is_truthy_flag(None));
    }

    #[derive(Debug, serde::Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "lenient::text")]
        label: Option<String>,
        #[serde(default, deserialize_with = "lenient::string")]
        id: String,
        #[serde(default = "yes", deserialize_with = "lenient::enabled")]
        enabled: bool,
    }

    fn yes() -> bool {
        true
    }

    #[test]
    fn lenient_fields_accept_wrong_scalar_types() {
        let loose: Loose = serde_json::from_value(json!({"label": 7, "id": null, "enabled": 0})).unwrap();
        assert_eq!(loose.label.as_deref(), Some("7"));
        assert_eq!(loose.id, "");
        assert!(loose.enabled);

        let loose: Loose = serde_json::from_value(json!({"enabled": false, "label": ""})).unwrap();
        assert_eq!(loose.label, None);
        assert!(!loose.enabled);

        let loose: Loose = serde_json::from_value(json!({})).unwrap();
        assert!(loose.enabled);
    }
}
