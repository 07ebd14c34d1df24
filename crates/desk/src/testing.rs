//! Test doubles for sessions. HTTP is mocked with
//! [`nativedoc_client::testing::MockTransport`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use nativedoc_core::bundle::NativeFiles;
use nativedoc_core::error::CoreError;
use nativedoc_core::hierarchy::HierarchyKey;
use nativedoc_store::SaveRequest;

use crate::error::DeskResult;
use crate::source::{DocDefinitionSource, LoadedDefinition};

/// Definition source answering per doc name after a fixed delay.
pub struct DelayedSource {
    docs: HashMap<String, (Duration, Value)>,
    saves: Mutex<Vec<SaveRequest>>,
}

impl DelayedSource {
    pub fn new(docs: Vec<(&str, Duration, Value)>) -> Self {
        Self {
            docs: docs
                .into_iter()
                .map(|(name, delay, doc)| (name.to_string(), (delay, doc)))
                .collect(),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn saves(&self) -> Vec<SaveRequest> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocDefinitionSource for DelayedSource {
    async fn load(&self, key: &HierarchyKey) -> DeskResult<LoadedDefinition> {
        let Some((delay, doc)) = self.docs.get(&key.doc).cloned() else {
            return Err(CoreError::NotFound {
                entity: "native_doc",
                id: key.to_string(),
            }
            .into());
        };
        tokio::time::sleep(delay).await;
        Ok(LoadedDefinition {
            files: NativeFiles {
                doc,
                ..NativeFiles::default()
            },
            runtime: json!({}),
            base_path: format!("/tmp/{}", key.doc),
        })
    }

    async fn save(&self, _key: &HierarchyKey, request: SaveRequest) -> DeskResult<()> {
        self.saves.lock().unwrap().push(request);
        Ok(())
    }
}
