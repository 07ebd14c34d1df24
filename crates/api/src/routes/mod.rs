pub mod health;
pub mod native_doc_files;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /native-doc-files                   get, save
/// /native-doc-files/create            scaffold a new doc (POST)
/// /native-doc-files/runtime-config    runtime page config (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/native-doc-files", native_doc_files::router())
}
