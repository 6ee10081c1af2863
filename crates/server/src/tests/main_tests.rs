use super::*;
use axum::{body, body::Body, http::Request};
use shared::domain::ExtType;
use tower::ServiceExt;

fn test_app(seed: &[&str]) -> Router {
    let seed: Vec<String> = seed.iter().map(|raw| raw.to_string()).collect();
    let api = ApiContext::with_items(seed_items(&seed));
    build_router(Arc::new(AppState { api }))
}

async fn list(app: &Router) -> ExtensionListResponse {
    let request = Request::get(EXTENSIONS_ROUTE)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn post(body: serde_json::Value) -> Request<Body> {
    Request::post(EXTENSIONS_ROUTE)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = test_app(&[]);
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn seeded_fixed_extensions_appear_in_snapshot() {
    let app = test_app(&["EXE", "bat", "exe", "bad name"]);
    let snapshot = list(&app).await;
    let names: Vec<(String, ExtType)> = snapshot
        .items
        .into_iter()
        .map(|item| (item.ext_name, item.ext_type))
        .collect();
    assert_eq!(
        names,
        vec![
            ("exe".to_string(), ExtType::Fixed),
            ("bat".to_string(), ExtType::Fixed),
        ]
    );
}

#[tokio::test]
async fn add_then_delete_round_trip() {
    let app = test_app(&[]);

    let response = app
        .clone()
        .oneshot(post(
            serde_json::json!({ "extName": "foo", "extType": "custom" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(list(&app).await.items.len(), 1);

    let request = Request::delete(format!("{EXTENSIONS_ROUTE}/foo"))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(list(&app).await.items.is_empty());
}

#[tokio::test]
async fn duplicate_add_is_conflict_with_error_body() {
    let app = test_app(&["exe"]);

    let response = app
        .clone()
        .oneshot(post(
            serde_json::json!({ "extName": "exe", "extType": "custom" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let err: ApiError = serde_json::from_slice(&bytes).expect("json");
    assert!(matches!(err.code, ErrorCode::Conflict));
}

#[tokio::test]
async fn invalid_name_is_bad_request() {
    let app = test_app(&[]);
    let response = app
        .oneshot(post(
            serde_json::json!({ "extName": "tar.gz", "extType": "custom" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_missing_is_not_found() {
    let app = test_app(&[]);
    let request = Request::delete(format!("{EXTENSIONS_ROUTE}/nothing"))
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_fixed_entries_too() {
    let app = test_app(&["exe"]);
    let request = Request::delete(format!("{EXTENSIONS_ROUTE}/exe"))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(list(&app).await.items.is_empty());
}
