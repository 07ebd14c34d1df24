//! Filesystem-backed doc definition store.
//!
//! Layout under the store root:
//!
//! ```text
//! bundles/<bundle>/<app>/<module>/submodule/<submodule>/docs/<doc>/
//!     doc.json
//!     schema.json
//!     actions.json
//!     <doc>.json        (runtime blob, read-only here)
//! ```
//!
//! Any of the files may be absent and reads as `{}`. A missing directory is
//! `NotFound`. Saves overwrite only the blobs supplied, through the staged
//! commit in [`crate::journal`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use nativedoc_core::action::{validate_actions, ActionsDefinition};
use nativedoc_core::bundle::{DocDefinitionBundle, NativeFiles};
use nativedoc_core::error::CoreError;
use nativedoc_core::hierarchy::HierarchyKey;
use nativedoc_core::schema::{validate_schema, Schema};
use nativedoc_core::types::Timestamp;

use crate::error::{StoreError, StoreResult};
use crate::journal;

pub const DOC_FILE: &str = "doc.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const ACTIONS_FILE: &str = "actions.json";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One of the three authored blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Blob {
    Doc,
    Schema,
    Actions,
}

impl Blob {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Doc => DOC_FILE,
            Self::Schema => SCHEMA_FILE,
            Self::Actions => ACTIONS_FILE,
        }
    }
}

/// Result of [`DocStore::load`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedDoc {
    pub doc: Value,
    pub schema: Value,
    pub actions: Value,
    /// `<doc>.json`, the runtime blob. Never written by the store.
    pub runtime: Value,
    pub base_path: PathBuf,
}

impl LoadedDoc {
    pub fn files(&self) -> NativeFiles {
        NativeFiles {
            doc: self.doc.clone(),
            schema: self.schema.clone(),
            actions: self.actions.clone(),
        }
    }

    pub fn bundle(&self) -> DocDefinitionBundle {
        DocDefinitionBundle::from(self.files())
    }
}

/// Blobs to write. `None` leaves the file on disk untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveRequest {
    pub doc: Option<Value>,
    pub schema: Option<Value>,
    pub actions: Option<Value>,
}

impl SaveRequest {
    /// Save all three blobs of a bundle.
    pub fn all(bundle: &DocDefinitionBundle) -> Self {
        Self {
            doc: Some(bundle.doc().clone()),
            schema: Some(bundle.schema().clone()),
            actions: Some(bundle.actions().clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.doc.is_none() && self.schema.is_none() && self.actions.is_none()
    }

    /// Check the supplied schema and actions blobs before anything is
    /// written. `doc` is an open map and is never rejected.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(schema) = &self.schema {
            validate_schema(&Schema::from_value(schema))?;
        }
        if let Some(actions) = &self.actions {
            validate_actions(&ActionsDefinition::from_value(actions))?;
        }
        Ok(())
    }

    fn into_blobs(self) -> Vec<(Blob, Value)> {
        [
            (Blob::Doc, self.doc),
            (Blob::Schema, self.schema),
            (Blob::Actions, self.actions),
        ]
        .into_iter()
        .filter_map(|(blob, value)| value.map(|v| (blob, v)))
        .collect()
    }
}

impl From<NativeFiles> for SaveRequest {
    fn from(files: NativeFiles) -> Self {
        Self {
            doc: Some(files.doc),
            schema: Some(files.schema),
            actions: Some(files.actions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveResult {
    pub base_path: PathBuf,
    pub written: Vec<Blob>,
    pub saved_at: Timestamp,
}

/// Default triple written by [`DocStore::create`].
pub fn default_files(title: &str) -> NativeFiles {
    NativeFiles {
        doc: json!({ "title": title }),
        schema: json!({ "fields": [] }),
        actions: json!({ "actions": [], "workflow": {}, "permissions": {} }),
    }
}

// ---------------------------------------------------------------------------
// DocStore
// ---------------------------------------------------------------------------

/// Doc definitions rooted at a directory containing `bundles/`.
///
/// Cheap to clone; clones share one lock so commits and reads within a
/// process never interleave.
#[derive(Debug, Clone)]
pub struct DocStore {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DocStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute directory of a doc. Fails with `Resolution` on an
    /// incomplete or unusable key.
    pub fn doc_dir(&self, key: &HierarchyKey) -> StoreResult<PathBuf> {
        Ok(self.root.join(key.storage_path()?))
    }

    pub async fn exists(&self, key: &HierarchyKey) -> StoreResult<bool> {
        let dir = self.doc_dir(key)?;
        tokio::fs::try_exists(&dir)
            .await
            .map_err(StoreError::io(&dir))
    }

    /// Load the triple plus the runtime blob.
    pub async fn load(&self, key: &HierarchyKey) -> StoreResult<LoadedDoc> {
        let dir = self.doc_dir(key)?;
        let _guard = self.lock.lock().await;

        if !tokio::fs::try_exists(&dir)
            .await
            .map_err(StoreError::io(&dir))?
        {
            return Err(CoreError::NotFound {
                entity: "native_doc",
                id: key.to_string(),
            }
            .into());
        }
        journal::recover(&dir).await?;

        let runtime_file = format!("{}.json", key.sanitized()?.doc);
        let loaded = LoadedDoc {
            doc: read_json_or_empty(&dir.join(DOC_FILE)).await?,
            schema: read_json_or_empty(&dir.join(SCHEMA_FILE)).await?,
            actions: read_json_or_empty(&dir.join(ACTIONS_FILE)).await?,
            runtime: read_json_or_empty(&dir.join(runtime_file)).await?,
            base_path: dir,
        };
        tracing::debug!(doc = %key, "Native doc files loaded");
        Ok(loaded)
    }

    /// Write every supplied blob as one unit, creating the directory when
    /// missing. Omitted blobs are left untouched.
    ///
    /// An invalid schema or actions blob fails with `Validation` and writes
    /// nothing.
    pub async fn save(&self, key: &HierarchyKey, request: SaveRequest) -> StoreResult<SaveResult> {
        let dir = self.doc_dir(key)?;
        request.validate()?;
        let _guard = self.lock.lock().await;
        self.save_locked(key, &dir, request).await
    }

    async fn save_locked(
        &self,
        key: &HierarchyKey,
        dir: &Path,
        request: SaveRequest,
    ) -> StoreResult<SaveResult> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(StoreError::io(dir))?;
        journal::recover(dir).await?;

        let blobs = request.into_blobs();
        let written: Vec<Blob> = blobs.iter().map(|(blob, _)| *blob).collect();

        // A blob equal to what is already on disk keeps its bytes.
        let mut files: Vec<(&str, Value)> = Vec::with_capacity(blobs.len());
        for (blob, value) in blobs {
            let name = blob.file_name();
            if read_existing(&dir.join(name)).await.as_ref() == Some(&value) {
                tracing::debug!(doc = %key, file = name, "Native doc file unchanged");
                continue;
            }
            files.push((name, value));
        }
        if !files.is_empty() {
            journal::commit(dir, &files).await?;
        }

        tracing::info!(doc = %key, written = ?written, "Native doc files saved");
        Ok(SaveResult {
            base_path: dir.to_path_buf(),
            written,
            saved_at: Utc::now(),
        })
    }

    /// Scaffold a new doc with the default triple.
    ///
    /// Fails with `Conflict` when the doc directory already exists.
    pub async fn create(&self, key: &HierarchyKey, title: Option<&str>) -> StoreResult<SaveResult> {
        let dir = self.doc_dir(key)?;
        let _guard = self.lock.lock().await;

        if tokio::fs::try_exists(&dir)
            .await
            .map_err(StoreError::io(&dir))?
        {
            return Err(CoreError::Conflict(format!("Native doc '{key}' already exists")).into());
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| nativedoc_core::ui_config::humanize(&key.doc));
        let result = self
            .save_locked(key, &dir, default_files(&title).into())
            .await?;
        tracing::info!(doc = %key, "Native doc created");
        Ok(result)
    }
}

async fn read_json_or_empty(path: &Path) -> StoreResult<Value> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(json!({})),
        Err(err) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

/// Current parsed contents of a blob, or `None` when absent or unreadable.
async fn read_existing(path: &Path) -> Option<Value> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
