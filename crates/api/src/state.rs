use std::sync::Arc;

use nativedoc_store::DocStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Native doc files on disk.
    pub store: DocStore,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            store: DocStore::new(config.native_doc_root.clone()),
            config: Arc::new(config),
        }
    }
}
