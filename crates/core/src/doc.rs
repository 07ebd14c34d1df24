//! `doc.json`: open map of independently optional view blocks.
//!
//! No block has mandatory keys. [`DocDefinition`] is a borrowed read view
//! whose accessors return `None` for anything absent or blank, leaving the
//! defaults to each consumer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::lenient;

/// Named top-level blocks of `doc.json` that builder panels edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocBlock {
    Page,
    Workspace,
    Navigation,
    Chart,
    Dashboard,
    PrintFormat,
    ListReport,
}

impl DocBlock {
    pub const ALL: [DocBlock; 7] = [
        Self::Page,
        Self::Workspace,
        Self::Navigation,
        Self::Chart,
        Self::Dashboard,
        Self::PrintFormat,
        Self::ListReport,
    ];

    /// JSON key of the block inside `doc.json`.
    pub fn key(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Workspace => "workspace",
            Self::Navigation => "navigation",
            Self::Chart => "chart",
            Self::Dashboard => "dashboard",
            Self::PrintFormat => "print_format",
            Self::ListReport => "list_report",
        }
    }
}

/// One authored navigation entry (`navigation.items[]`).
///
/// Fields read leniently: a mistyped label or flag never drops the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Resolved link; filled in by the runtime UI config builder.
    #[serde(default, deserialize_with = "lenient::string")]
    pub href: String,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default = "enabled_by_default", deserialize_with = "lenient::enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn enabled_by_default() -> bool {
    true
}

/// Borrowed read view over a `doc.json` blob.
#[derive(Debug, Clone, Copy)]
pub struct DocDefinition<'a> {
    value: &'a Value,
}

impl<'a> DocDefinition<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// The raw block object, if present.
    pub fn block(&self, block: DocBlock) -> Option<&'a Map<String, Value>> {
        self.value.get(block.key()).and_then(Value::as_object)
    }

    /// A non-blank string inside a block.
    pub fn text(&self, block: DocBlock, key: &str) -> Option<&'a str> {
        self.block(block)?
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Top-level `title`, as written by doc scaffolding.
    pub fn title(&self) -> Option<&'a str> {
        self.value
            .get("title")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Authored navigation items that are not explicitly disabled.
    ///
    /// Entries that are not objects are skipped.
    pub fn enabled_nav_items(&self) -> Vec<NavItem> {
        self.block(DocBlock::Navigation)
            .and_then(|nav| nav.get("items"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .filter_map(|item| serde_json::from_value::<NavItem>(item.clone()).ok())
                    .filter(|item| item.enabled)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `list_report.group_by`, the key report rows are grouped by.
    pub fn report_group_by(&self) -> Option<&'a str> {
        self.text(DocBlock::ListReport, "group_by")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn blank_text_is_absent() {
        let doc = json!({"page": {"title": "  ", "dir": "rtl"}});
        let view = DocDefinition::new(&doc);
        assert_eq!(view.text(DocBlock::Page, "title"), None);
        assert_eq!(view.text(DocBlock::Page, "dir"), Some("rtl"));
        assert_eq!(view.text(DocBlock::Workspace, "dir"), None);
    }

    #[test]
    fn disabled_and_malformed_nav_items_are_skipped() {
        let doc = json!({"navigation": {"items": [
            {"label": "A", "link": "./a"},
            {"label": "B", "enabled": false},
            "junk",
            {"label": "C", "enabled": true, "icon": "star"},
        ]}});
        let items = DocDefinition::new(&doc).enabled_nav_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].extra.get("icon"), Some(&json!("star")));
    }

    #[test]
    fn loosely_typed_nav_items_are_kept() {
        let doc = json!({"navigation": {"items": [
            {"label": 42, "link": "./list", "enabled": 0},
            {"label": "Report", "enabled": "false"},
            {"label": null, "target": "sidebar"},
        ]}});
        let items = DocDefinition::new(&doc).enabled_nav_items();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].label, "42");
        assert_eq!(items[0].link.as_deref(), Some("./list"));
        assert_eq!(items[2].label, "");
        assert_eq!(items[2].target.as_deref(), Some("sidebar"));
    }

    #[test]
    fn block_keys_are_snake_case() {
        assert_eq!(DocBlock::PrintFormat.key(), "print_format");
        assert_eq!(
            serde_json::to_value(DocBlock::ListReport).unwrap(),
            json!("list_report")
        );
    }
}
