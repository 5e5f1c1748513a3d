//! Admin API tests, driven through the router with `oneshot`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use mesh_gateway::admin::setup_admin_router;
use mesh_gateway::http::GatewayState;
use mesh_gateway::registry::{ServiceInstance, ServiceRegistry};

mod common;

const KEY: &str = "test-admin-key-0123456789";

fn admin() -> (Router, GatewayState) {
    let registry = Arc::new(ServiceRegistry::new());
    registry.register(ServiceInstance::new("escrow-service", "escrow-service-1", "localhost", 8081));
    let state = GatewayState::new(common::test_config(), registry);
    (setup_admin_router(state.clone()), state)
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", KEY));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn rejects_missing_or_wrong_key() {
    let (app, _) = admin();

    let missing = Request::builder().uri("/admin/status").body(Body::empty()).unwrap();
    let res = app.clone().oneshot(missing).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["status"], "error");

    let wrong = Request::builder()
        .uri("/admin/status")
        .header(header::AUTHORIZATION, "Bearer not-the-key")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(wrong).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_counts_registrations() {
    let (app, _) = admin();

    let res = app.oneshot(request(Method::GET, "/admin/status", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await;
    assert_eq!(body["status"], "operational");
    assert_eq!(body["services"], 1);
    assert_eq!(body["instances"], 1);
}

#[tokio::test]
async fn register_then_deregister() {
    let (app, state) = admin();

    let payload = json!({
        "name": "fx-service",
        "id": "fx-a",
        "address": "10.0.0.7",
        "port": 8095,
        "tags": ["financial"],
    });
    let res = app
        .clone()
        .oneshot(request(Method::POST, "/admin/services", Some(payload)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = json_body(res).await;
    assert_eq!(body["data"]["id"], "fx-a");
    assert_eq!(body["data"]["health"], "unknown");

    let instances = state.registry.list_all("fx-service");
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].tags, vec!["financial"]);

    let breakers = app
        .clone()
        .oneshot(request(Method::GET, "/admin/breakers", None))
        .await
        .unwrap();
    let breakers = json_body(breakers).await;
    let names: Vec<&str> = breakers
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["fx-service"]);

    let res = app
        .clone()
        .oneshot(request(Method::DELETE, "/admin/services/fx-service/fx-a", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!state.registry.contains_service("fx-service"));

    let res = app
        .oneshot(request(Method::DELETE, "/admin/services/fx-service/fx-a", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_registrations_are_400() {
    let (app, state) = admin();

    let zero_port = json!({ "name": "kyb-service", "id": "kyb-1", "address": "localhost", "port": 0 });
    let res = app
        .clone()
        .oneshot(request(Method::POST, "/admin/services", Some(zero_port)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let missing_field = json!({ "name": "kyb-service", "address": "localhost", "port": 8099 });
    let res = app
        .oneshot(request(Method::POST, "/admin/services", Some(missing_field)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["status"], "error");

    assert!(!state.registry.contains_service("kyb-service"));
}

#[tokio::test]
async fn breakers_report_closed_by_default() {
    let (app, state) = admin();
    state.breakers.get("escrow-service");
    state.breakers.get("ledger-service");

    let res = app.oneshot(request(Method::GET, "/admin/breakers", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["name"], "escrow-service");
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["state"] == "closed" && b["failure_count"] == 0));
}
