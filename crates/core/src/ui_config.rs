//! Runtime page chrome derived from `doc.json`.
//!
//! [`build_runtime_ui_config`] turns a doc definition and the current view
//! into the direction, title, subtitle and navigation used by every runtime
//! page. A doc is always navigable: without authored navigation the standard
//! List / Report / New entries are synthesized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::doc::{DocBlock, DocDefinition, NavItem};
use crate::error::CoreError;
use crate::hierarchy::HierarchyKey;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_DIR: &str = "ltr";
pub const DEFAULT_EYEBROW: &str = "ERP";
pub const DEFAULT_SUBTITLE: &str = "Doc-driven runtime page rendered from native config files.";

pub const NAV_TARGET_SIDEBAR: &str = "sidebar";
pub const NAV_TARGET_QUICK_ACTION: &str = "quick_action";

// ---------------------------------------------------------------------------
// ViewKind
// ---------------------------------------------------------------------------

/// Runtime views of a doc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    List,
    Report,
    Detail,
    New,
    Edit,
}

impl ViewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Report => "report",
            Self::Detail => "detail",
            Self::New => "new",
            Self::Edit => "edit",
        }
    }
}

impl FromStr for ViewKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Self::List),
            "report" => Ok(Self::Report),
            "detail" => Ok(Self::Detail),
            "new" => Ok(Self::New),
            "edit" => Ok(Self::Edit),
            other => Err(CoreError::Validation(format!(
                "Invalid view '{other}'. Must be one of: list, report, detail, new, edit"
            ))),
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RuntimeUiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaEntry {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeUiConfig {
    pub dir: String,
    pub title: String,
    pub eyebrow: String,
    pub subtitle: String,
    pub meta: Vec<MetaEntry>,
    pub nav_items: Vec<NavItem>,
    pub base_path: String,
}

/// Replace `_`/`-` runs with a space and capitalise each word.
pub fn humanize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_separator = false;
    for c in value.chars() {
        if c == '_' || c == '-' {
            if !in_separator {
                out.push(' ');
            }
            in_separator = true;
            continue;
        }
        in_separator = false;
        let at_word_start = out
            .chars()
            .next_back()
            .map_or(true, |prev| !(prev.is_alphanumeric() || prev == '_'));
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Resolve an authored nav link against the doc's base path.
///
/// `./x` becomes `<base>/x`; an empty link is the base path itself; any
/// other link is used verbatim.
pub fn resolve_nav_link(link: Option<&str>, base_path: &str) -> String {
    match link.filter(|l| !l.is_empty()) {
        None => base_path.to_string(),
        Some(link) => match link.strip_prefix("./") {
            Some(rest) => collapse_slashes(&format!("{base_path}/{rest}")),
            None => link.to_string(),
        },
    }
}

/// The List / Report / New entries every doc gets by default.
pub fn standard_nav_items(base_path: &str) -> Vec<NavItem> {
    [
        ("List", "list", NAV_TARGET_SIDEBAR),
        ("Report", "report", NAV_TARGET_SIDEBAR),
        ("New", "new", NAV_TARGET_QUICK_ACTION),
    ]
    .into_iter()
    .map(|(label, view, target)| NavItem {
        label: label.to_string(),
        link: None,
        href: format!("{base_path}/{view}"),
        target: Some(target.to_string()),
        enabled: true,
        extra: serde_json::Map::new(),
    })
    .collect()
}

/// Build the runtime page config for `key` from its `doc.json`.
pub fn build_runtime_ui_config(
    key: &HierarchyKey,
    doc: &Value,
    view: Option<ViewKind>,
    prefix: &str,
) -> RuntimeUiConfig {
    let doc = DocDefinition::new(doc);
    let base_path = key.runtime_base_path(prefix);

    let authored: Vec<NavItem> = doc
        .enabled_nav_items()
        .into_iter()
        .map(|mut item| {
            item.href = resolve_nav_link(item.link.as_deref(), &base_path);
            item
        })
        .collect();
    let nav_items = if authored.is_empty() {
        standard_nav_items(&base_path)
    } else {
        authored
    };

    let title_base = doc
        .text(DocBlock::Page, "title")
        .map(str::to_string)
        .unwrap_or_else(|| humanize(&key.doc));
    let title = match view {
        Some(view) => format!("{title_base} {}", humanize(view.as_str())),
        None => title_base,
    };

    let dir = doc
        .text(DocBlock::Workspace, "dir")
        .or_else(|| doc.text(DocBlock::Page, "dir"))
        .unwrap_or(DEFAULT_DIR)
        .to_string();

    let eyebrow = doc
        .text(DocBlock::Workspace, "name")
        .unwrap_or(DEFAULT_EYEBROW)
        .to_string();

    let subtitle = doc
        .text(DocBlock::Page, "description")
        .or_else(|| doc.text(DocBlock::Workspace, "description"))
        .unwrap_or(DEFAULT_SUBTITLE)
        .to_string();

    let meta = vec![
        MetaEntry { label: "Bundle", value: key.bundle.clone() },
        MetaEntry { label: "App", value: key.app.clone() },
        MetaEntry { label: "Module", value: key.module.clone() },
        MetaEntry { label: "Submodule", value: key.submodule.clone() },
    ];

    RuntimeUiConfig {
        dir,
        title,
        eyebrow,
        subtitle,
        meta,
        nav_items,
        base_path,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
