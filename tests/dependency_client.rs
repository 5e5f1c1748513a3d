//! Direct service-to-service calls through `DependencyClient`.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use mesh_gateway::client::{ClientError, DependencyClient};
use mesh_gateway::config::{CircuitBreakerConfig, Strategy};
use mesh_gateway::load_balancer::LoadBalancer;
use mesh_gateway::registry::ServiceRegistry;
use mesh_gateway::resilience::{CircuitBreaker, CircuitState, RetryPolicy};

mod common;

use common::{register_passing, MockService};

fn breaker(service: &str, failure_threshold: u32) -> Arc<CircuitBreaker> {
    let config = CircuitBreakerConfig {
        failure_threshold,
        success_threshold: 1,
        timeout_ms: 60_000,
    };
    Arc::new(CircuitBreaker::new(service, &config))
}

fn client_for(service: &str, backend: &MockService, breaker: Arc<CircuitBreaker>) -> DependencyClient {
    let registry = Arc::new(ServiceRegistry::new());
    register_passing(&registry, backend.instance(service, &format!("{}-1", service)));
    let balancer = Arc::new(LoadBalancer::new(registry, Strategy::RoundRobin));
    DependencyClient::new(service, balancer, breaker, Duration::from_secs(2)).unwrap()
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        multiplier: 2.0,
    }
}

#[tokio::test]
async fn get_and_post_json() {
    let backend = common::echo_service().await;
    let client = client_for("escrow-service", &backend, breaker("escrow-service", 5));

    let echoed: Value = client.get_json("/v1/escrows/42").await.unwrap();
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["path"], "/v1/escrows/42");

    let echoed: Value = client
        .post_json("/v1/escrows", &json!({ "amount": 100 }))
        .await
        .unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["body"], r#"{"amount":100}"#);
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn put_json_and_delete() {
    let backend = common::echo_service().await;
    let client = client_for("mandates-service", &backend, breaker("mandates-service", 5));

    let echoed: Value = client
        .put_json("/v1/mandates/7", &json!({ "status": "revoked" }))
        .await
        .unwrap();
    assert_eq!(echoed["method"], "PUT");
    assert_eq!(echoed["path"], "/v1/mandates/7");
    assert_eq!(echoed["body"], r#"{"status":"revoked"}"#);

    client.delete("/v1/mandates/7").await.unwrap();
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn breaker_opens_after_threshold_without_further_calls() {
    let backend = common::status_service(StatusCode::INTERNAL_SERVER_ERROR).await;
    let breaker = breaker("payment-service", 5);
    let client = client_for("payment-service", &backend, breaker.clone());

    for _ in 0..5 {
        let err = client.get_json::<Value>("/v1/payments").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let err = client.get_json::<Value>("/v1/payments").await.unwrap_err();
    assert!(matches!(err, ClientError::CircuitOpen(ref name) if name == "payment-service"));
    assert_eq!(backend.hits(), 5);
}

#[tokio::test]
async fn client_errors_do_not_trip_the_breaker() {
    let backend = common::status_service(StatusCode::NOT_FOUND).await;
    let breaker = breaker("disputes-service", 2);
    let client = client_for("disputes-service", &backend, breaker.clone());

    for _ in 0..4 {
        let err = client.get_json::<Value>("/v1/disputes/9").await.unwrap_err();
        assert!(!err.is_transient());
    }
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(backend.hits(), 4);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let backend = common::scripted_service(|n| {
        if n < 2 {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::OK
        }
    })
    .await;
    let client = client_for("reserves-service", &backend, breaker("reserves-service", 5))
        .with_retry(fast_retries(3));

    let body: Value = client.get_json("/v1/reserves").await.unwrap();
    assert_eq!(body["attempt"], 2);
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn retries_give_up_with_last_error() {
    let backend = common::status_service(StatusCode::SERVICE_UNAVAILABLE).await;
    let client = client_for("sca-service", &backend, breaker("sca-service", 10)).with_retry(fast_retries(2));

    let err = client.get_json::<Value>("/v1/challenges").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let backend = common::status_service(StatusCode::UNPROCESSABLE_ENTITY).await;
    let client = client_for("refunds-service", &backend, breaker("refunds-service", 5)).with_retry(fast_retries(3));

    let err = client
        .post_json::<_, Value>("/v1/refunds", &json!({ "amount": -1 }))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { status, .. } if status == StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn cancellation_stops_retries() {
    let backend = common::status_service(StatusCode::SERVICE_UNAVAILABLE).await;
    let token = CancellationToken::new();
    let policy = RetryPolicy {
        max_retries: 10,
        base_delay: Duration::from_secs(5),
        max_delay: Duration::from_secs(5),
        multiplier: 1.0,
    };
    let client = client_for("webhooks-service", &backend, breaker("webhooks-service", 20))
        .with_retry(policy)
        .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(2), client.get_json::<Value>("/v1/hooks"))
        .await
        .expect("cancellation did not interrupt the backoff")
        .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(backend.hits(), 1);
    canceller.await.unwrap();
}

#[tokio::test]
async fn no_healthy_instance_is_a_registry_error() {
    let registry = Arc::new(ServiceRegistry::new());
    let balancer = Arc::new(LoadBalancer::new(registry, Strategy::RoundRobin));
    let client = DependencyClient::new("kyb-service", balancer, breaker("kyb-service", 5), Duration::from_secs(1)).unwrap();

    let err = client.get_json::<Value>("/v1/checks").await.unwrap_err();
    assert!(matches!(err, ClientError::Registry(_)));
    assert_eq!(client.service(), "kyb-service");
}
