//! Five-part hierarchy key addressing one doc definition.
//!
//! A [`HierarchyKey`] names a doc as `{bundle, app, module, submodule, doc}`.
//! Before any segment is used to address storage it is sanitized: path
//! separators are stripped and dot-only segments are refused, so a joined
//! path can never climb out of the `bundles/` root.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Top-level storage directory holding every bundle.
pub const BUNDLES_DIR: &str = "bundles";

/// Fixed directory between the module and submodule segments.
pub const SUBMODULE_DIR: &str = "submodule";

/// Fixed directory between the submodule and doc segments.
pub const DOCS_DIR: &str = "docs";

/// Default URL prefix for runtime pages.
pub const DEFAULT_RUNTIME_PREFIX: &str = "/erp";

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

/// Trim a raw segment and strip every `/` and `\`.
pub fn sanitize_segment(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '/' && *c != '\\').collect()
}

fn checked_segment(name: &'static str, raw: &str) -> Result<String, CoreError> {
    let cleaned = sanitize_segment(raw);
    if cleaned.is_empty() {
        return Err(CoreError::Resolution(format!(
            "Missing required hierarchy field '{name}'"
        )));
    }
    if cleaned.chars().all(|c| c == '.') || cleaned.chars().any(char::is_control) {
        return Err(CoreError::Resolution(format!(
            "Hierarchy field '{name}' is not a valid path segment"
        )));
    }
    Ok(cleaned)
}

// ---------------------------------------------------------------------------
// HierarchyKey
// ---------------------------------------------------------------------------

/// The `{bundle, app, module, submodule, doc}` tuple identifying one doc.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyKey {
    pub bundle: String,
    pub app: String,
    pub module: String,
    pub submodule: String,
    pub doc: String,
}

impl HierarchyKey {
    pub fn new(
        bundle: impl Into<String>,
        app: impl Into<String>,
        module: impl Into<String>,
        submodule: impl Into<String>,
        doc: impl Into<String>,
    ) -> Self {
        Self {
            bundle: bundle.into(),
            app: app.into(),
            module: module.into(),
            submodule: submodule.into(),
            doc: doc.into(),
        }
    }

    /// `true` when all five segments are non-empty after sanitization.
    ///
    /// Loads are gated on this: an incomplete key never addresses storage.
    pub fn is_complete(&self) -> bool {
        self.sanitized().is_ok()
    }

    /// Return a copy with every segment sanitized.
    ///
    /// Fails with [`CoreError::Resolution`] naming the first segment that is
    /// missing or not a usable path component.
    pub fn sanitized(&self) -> Result<Self, CoreError> {
        Ok(Self {
            bundle: checked_segment("bundle", &self.bundle)?,
            app: checked_segment("app", &self.app)?,
            module: checked_segment("module", &self.module)?,
            submodule: checked_segment("submodule", &self.submodule)?,
            doc: checked_segment("doc", &self.doc)?,
        })
    }

    /// Storage path relative to the store root:
    /// `bundles/<bundle>/<app>/<module>/submodule/<submodule>/docs/<doc>`.
    pub fn storage_path(&self) -> Result<PathBuf, CoreError> {
        let key = self.sanitized()?;
        let mut path = PathBuf::from(BUNDLES_DIR);
        path.push(&key.bundle);
        path.push(&key.app);
        path.push(&key.module);
        path.push(SUBMODULE_DIR);
        path.push(&key.submodule);
        path.push(DOCS_DIR);
        path.push(&key.doc);
        Ok(path)
    }

    /// Runtime page base path, e.g. `/erp/plt/core/sales/orders/invoice`.
    ///
    /// Uses the raw segments so links match the router's own parameters.
    pub fn runtime_base_path(&self, prefix: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            prefix.trim_end_matches('/'),
            self.bundle,
            self.app,
            self.module,
            self.submodule,
            self.doc
        )
    }
}

impl fmt::Display for HierarchyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.bundle, self.app, self.module, self.submodule, self.doc
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Component;

    use assert_matches::assert_matches;

    use super::*;

    fn key() -> HierarchyKey {
        HierarchyKey::new("plt", "core", "sales", "orders", "invoice")
    }

    #[test]
    fn storage_path_follows_layout() {
        let path = key().storage_path().unwrap();
        assert_eq!(
            path,
            PathBuf::from("bundles/plt/core/sales/submodule/orders/docs/invoice")
        );
    }

    #[test]
    fn separators_are_stripped() {
        assert_eq!(sanitize_segment(" ../etc/passwd "), "..etcpasswd");
        assert_eq!(sanitize_segment("a\\b/c"), "abc");
    }

    #[test]
    fn missing_segment_is_resolution_error() {
        let mut k = key();
        k.module = "  ".into();
        assert_matches!(k.storage_path(), Err(CoreError::Resolution(msg)) if msg.contains("module"));
        assert!(!k.is_complete());
    }

    #[test]
    fn separator_only_segment_is_missing() {
        let mut k = key();
        k.doc = "//".into();
        assert_matches!(k.sanitized(), Err(CoreError::Resolution(_)));
    }

    #[test]
    fn dot_segments_are_refused() {
        let mut k = key();
        k.app = "..".into();
        assert_matches!(k.storage_path(), Err(CoreError::Resolution(_)));

        k.app = "./.".into();
        assert_matches!(k.storage_path(), Err(CoreError::Resolution(_)));
    }

    #[test]
    fn hostile_segments_never_escape_bundles_root() {
        let hostile = ["../../x", "..\\..\\x", "/abs", "a/../../b", "\\\\srv\\share"];
        for raw in hostile {
            let k = HierarchyKey::new(raw, raw, raw, raw, raw);
            if let Ok(path) = k.storage_path() {
                let mut components = path.components();
                assert_eq!(
                    components.next(),
                    Some(Component::Normal(BUNDLES_DIR.as_ref()))
                );
                assert!(components.all(|c| matches!(c, Component::Normal(_))));
            }
        }
    }

    #[test]
    fn runtime_base_path_uses_prefix() {
        assert_eq!(
            key().runtime_base_path("/erp/"),
            "/erp/plt/core/sales/orders/invoice"
        );
    }

    #[test]
    fn display_joins_segments() {
        assert_eq!(key().to_string(), "plt/core/sales/orders/invoice");
    }
}
