//! Route definitions for native doc files, mounted at `/native-doc-files`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::native_doc_files;
use crate::state::AppState;

/// ```text
/// GET  /                -> get_native_doc_files
/// POST /                -> save_native_doc_files
/// POST /create          -> create_native_doc_files
/// GET  /runtime-config  -> get_runtime_config
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(native_doc_files::get_native_doc_files).post(native_doc_files::save_native_doc_files),
        )
        .route("/create", post(native_doc_files::create_native_doc_files))
        .route("/runtime-config", get(native_doc_files::get_runtime_config))
}
