//! Handlers for the native doc files of one doc.
//!
//! A doc is addressed by its five hierarchy segments, passed as query
//! parameters on reads and in the JSON body on writes. Any missing segment
//! is a 400 before the filesystem is touched.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use nativedoc_core::hierarchy::HierarchyKey;
use nativedoc_core::ui_config::{build_runtime_ui_config, ViewKind};
use nativedoc_store::{Blob, SaveRequest};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// `?bundle=&app=&module=&submodule=&doc_key=`
#[derive(Debug, Default, Deserialize)]
pub struct HierarchyParams {
    #[serde(default)]
    pub bundle: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub submodule: String,
    #[serde(default)]
    pub doc_key: String,
}

impl HierarchyParams {
    fn key(&self) -> HierarchyKey {
        HierarchyKey::new(
            self.bundle.as_str(),
            self.app.as_str(),
            self.module.as_str(),
            self.submodule.as_str(),
            self.doc_key.as_str(),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfigParams {
    #[serde(flatten)]
    pub hierarchy: HierarchyParams,
    #[serde(default)]
    pub view: Option<String>,
}

/// Body of a save. Blobs that are absent or `null` are left untouched.
#[derive(Debug, Deserialize)]
pub struct SaveNativeDocFiles {
    #[serde(default)]
    pub bundle: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub submodule: String,
    #[serde(default, rename = "docKey", alias = "doc_key")]
    pub doc_key: String,
    #[serde(default)]
    pub doc: Option<Value>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub actions: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNativeDocFiles {
    #[serde(default)]
    pub bundle: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub submodule: String,
    #[serde(default, rename = "docKey", alias = "doc_key")]
    pub doc_key: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: &'static str,
    pub base_path: String,
    pub written: Vec<Blob>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/native-doc-files
///
/// Returns `{doc, schema, actions, runtime, base_path}`. Absent blobs read
/// as `{}`; a missing doc directory is a 404.
pub async fn get_native_doc_files(
    State(state): State<AppState>,
    Query(params): Query<HierarchyParams>,
) -> AppResult<impl IntoResponse> {
    let loaded = state.store.load(&params.key()).await?;
    Ok(Json(loaded))
}

/// POST /api/native-doc-files
///
/// Writes the supplied blobs as one unit.
pub async fn save_native_doc_files(
    State(state): State<AppState>,
    Json(input): Json<SaveNativeDocFiles>,
) -> AppResult<impl IntoResponse> {
    let key = HierarchyKey::new(input.bundle, input.app, input.module, input.submodule, input.doc_key);
    let request = SaveRequest {
        doc: input.doc,
        schema: input.schema,
        actions: input.actions,
    };

    let result = state.store.save(&key, request).await?;

    Ok(Json(SaveResponse {
        message: "Native doc files saved",
        base_path: result.base_path.display().to_string(),
        written: result.written,
    }))
}

/// POST /api/native-doc-files/create
///
/// Scaffolds the default triple. 409 when the doc already exists.
pub async fn create_native_doc_files(
    State(state): State<AppState>,
    Json(input): Json<CreateNativeDocFiles>,
) -> AppResult<impl IntoResponse> {
    let key = HierarchyKey::new(input.bundle, input.app, input.module, input.submodule, input.doc_key);
    let result = state.store.create(&key, input.title.as_deref()).await?;

    Ok((
        StatusCode::CREATED,
        Json(SaveResponse {
            message: "Native doc created",
            base_path: result.base_path.display().to_string(),
            written: result.written,
        }),
    ))
}

/// GET /api/native-doc-files/runtime-config
///
/// Runtime page config derived from the stored `doc.json`. An unknown
/// `view` is a 400.
pub async fn get_runtime_config(
    State(state): State<AppState>,
    Query(params): Query<RuntimeConfigParams>,
) -> AppResult<impl IntoResponse> {
    let view = params
        .view
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::parse::<ViewKind>)
        .transpose()?;

    let key = params.hierarchy.key();
    let loaded = state.store.load(&key).await?;
    let config = build_runtime_ui_config(&key, &loaded.doc, view, &state.config.runtime_prefix);

    Ok(Json(DataResponse { data: config }))
}
