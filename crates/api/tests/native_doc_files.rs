//! HTTP-level tests for `/health` and `/api/native-doc-files`.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json};
use serde_json::json;
use tempfile::TempDir;

const QUERY: &str = "bundle=plt&app=core&module=sales&submodule=orders&doc_key=invoice";

fn save_body() -> serde_json::Value {
    json!({
        "bundle": "plt",
        "app": "core",
        "module": "sales",
        "submodule": "orders",
        "docKey": "invoice",
        "doc": {"page": {"title": "Sales Invoice"}, "navigation": {"items": []}},
        "schema": {"fields": [{"fieldname": "customer"}]},
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let tmp = TempDir::new().unwrap();
    let response = get(build_test_app(tmp.path()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn missing_segment_is_400() {
    let tmp = TempDir::new().unwrap();
    let uri = "/api/native-doc-files?bundle=plt&app=core&module=sales&doc_key=invoice";
    let response = get(build_test_app(tmp.path()), uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing required hierarchy fields");
}

#[tokio::test]
async fn absent_doc_is_404() {
    let tmp = TempDir::new().unwrap();
    let response = get(build_test_app(tmp.path()), &format!("/api/native-doc-files?{QUERY}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let tmp = TempDir::new().unwrap();
    let app = build_test_app(tmp.path());

    let response = post_json(app.clone(), "/api/native-doc-files", save_body()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Native doc files saved");
    assert_eq!(json["written"], json!(["doc", "schema"]));
    assert!(json["base_path"]
        .as_str()
        .unwrap()
        .ends_with("bundles/plt/core/sales/submodule/orders/docs/invoice"));

    let response = get(app, &format!("/api/native-doc-files?{QUERY}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["doc"]["page"]["title"], "Sales Invoice");
    assert_eq!(json["schema"]["fields"][0]["fieldname"], "customer");
    assert_eq!(json["actions"], json!({}));
    assert_eq!(json["runtime"], json!({}));
}

#[tokio::test]
async fn partial_save_keeps_other_blobs() {
    let tmp = TempDir::new().unwrap();
    let app = build_test_app(tmp.path());
    post_json(app.clone(), "/api/native-doc-files", save_body()).await;

    let mut body = save_body();
    let map = body.as_object_mut().unwrap();
    map.remove("doc");
    map.insert("schema".into(), json!(null));
    map.insert("actions".into(), json!({"actions": [{"id": "approve"}]}));
    let response = post_json(app.clone(), "/api/native-doc-files", body).await;
    assert_eq!(body_json(response).await["written"], json!(["actions"]));

    let json = body_json(get(app, &format!("/api/native-doc-files?{QUERY}")).await).await;
    assert_eq!(json["doc"]["page"]["title"], "Sales Invoice");
    assert_eq!(json["schema"]["fields"][0]["fieldname"], "customer");
    assert_eq!(json["actions"]["actions"][0]["id"], "approve");
}

#[tokio::test]
async fn save_with_missing_segment_is_400() {
    let tmp = TempDir::new().unwrap();
    let mut body = save_body();
    body.as_object_mut().unwrap().remove("docKey");
    let response = post_json(build_test_app(tmp.path()), "/api/native-doc-files", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_with_duplicate_fieldnames_is_400_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let app = build_test_app(tmp.path());
    let mut body = save_body();
    body["schema"] = json!({"fields": [{"fieldname": "customer"}, {"fieldname": "customer"}]});

    let response = post_json(app.clone(), "/api/native-doc-files", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("'customer'"));

    let response = get(app, &format!("/api/native-doc-files?{QUERY}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_scaffolds_once() {
    let tmp = TempDir::new().unwrap();
    let app = build_test_app(tmp.path());
    let body = json!({
        "bundle": "plt",
        "app": "core",
        "module": "sales",
        "submodule": "orders",
        "docKey": "invoice",
    });

    let response = post_json(app.clone(), "/api/native-doc-files/create", body.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(get(app.clone(), &format!("/api/native-doc-files?{QUERY}")).await).await;
    assert_eq!(json["doc"], json!({"title": "Invoice"}));
    assert_eq!(json["schema"], json!({"fields": []}));

    let response = post_json(app, "/api/native-doc-files/create", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn runtime_config_uses_standard_nav() {
    let tmp = TempDir::new().unwrap();
    let app = build_test_app(tmp.path());
    post_json(app.clone(), "/api/native-doc-files", save_body()).await;

    let uri = format!("/api/native-doc-files/runtime-config?{QUERY}&view=list");
    let response = get(app.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = &body_json(response).await["data"];
    assert_eq!(data["title"], "Sales Invoice List");
    assert_eq!(data["dir"], "ltr");

    let base = "/erp/plt/core/sales/orders/invoice";
    let hrefs: Vec<&str> = data["navItems"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["href"].as_str())
        .collect();
    assert_eq!(
        hrefs,
        vec![
            format!("{base}/list"),
            format!("{base}/report"),
            format!("{base}/new"),
        ]
    );

    let response = get(app, &format!("/api/native-doc-files/runtime-config?{QUERY}&view=gallery")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
