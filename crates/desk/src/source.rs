//! Where sessions load and save doc definitions from.
//!
//! The builder desk and runtime sessions only see [`DocDefinitionSource`].
//! Two implementations: the local [`DocStore`] (same process as the files)
//! and the [`PlatformClient`] talking to a native doc files server.

use async_trait::async_trait;
use serde_json::Value;

use nativedoc_client::{NativeFilesUpdate, PlatformClient};
use nativedoc_core::bundle::NativeFiles;
use nativedoc_core::hierarchy::HierarchyKey;
use nativedoc_store::{DocStore, SaveRequest};

use crate::error::DeskResult;

/// A loaded doc definition.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDefinition {
    pub files: NativeFiles,
    pub runtime: Value,
    pub base_path: String,
}

#[async_trait]
pub trait DocDefinitionSource: Send + Sync {
    async fn load(&self, key: &HierarchyKey) -> DeskResult<LoadedDefinition>;

    /// Overwrite the supplied blobs; omitted blobs stay as they are.
    async fn save(&self, key: &HierarchyKey, request: SaveRequest) -> DeskResult<()>;
}

#[async_trait]
impl DocDefinitionSource for DocStore {
    async fn load(&self, key: &HierarchyKey) -> DeskResult<LoadedDefinition> {
        let loaded = DocStore::load(self, key).await?;
        Ok(LoadedDefinition {
            files: loaded.files(),
            runtime: loaded.runtime,
            base_path: loaded.base_path.display().to_string(),
        })
    }

    async fn save(&self, key: &HierarchyKey, request: SaveRequest) -> DeskResult<()> {
        DocStore::save(self, key, request).await?;
        Ok(())
    }
}

#[async_trait]
impl DocDefinitionSource for PlatformClient {
    async fn load(&self, key: &HierarchyKey) -> DeskResult<LoadedDefinition> {
        let payload = self.load_native_files(key).await?;
        Ok(LoadedDefinition {
            files: payload.files(),
            runtime: payload.runtime,
            base_path: payload.base_path,
        })
    }

    async fn save(&self, key: &HierarchyKey, request: SaveRequest) -> DeskResult<()> {
        let update = NativeFilesUpdate {
            doc: request.doc,
            schema: request.schema,
            actions: request.actions,
        };
        self.save_native_files(key, update).await?;
        Ok(())
    }
}
