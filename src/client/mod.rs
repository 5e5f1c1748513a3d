//! Typed client for calling one platform dependency directly.
//!
//! Combines instance selection, the dependency's circuit breaker and an
//! optional retry policy, so service-to-service calls get the same protection
//! the gateway gives proxied traffic.
//!
//! ```text
//! get_json("/v1/escrows/42")
//!     → LoadBalancer.get_endpoint(service)
//!     → CircuitBreaker.execute_with (5xx and transport errors count as failures)
//!     → RetryPolicy (transient: transport errors, 5xx; permanent: 4xx, circuit open)
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::load_balancer::LoadBalancer;
use crate::registry::RegistryError;
use crate::resilience::{AttemptError, BreakerError, CircuitBreaker, RetryError, RetryPolicy};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("circuit open for '{0}'")]
    CircuitOpen(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("'{service}' answered {status}: {body}")]
    Status {
        service: String,
        status: StatusCode,
        body: String,
    },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("call cancelled")]
    Cancelled,
}

impl ClientError {
    /// Errors a retry could plausibly fix.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

pub struct DependencyClient {
    service: String,
    balancer: Arc<LoadBalancer>,
    breaker: Arc<CircuitBreaker>,
    retry: Option<RetryPolicy>,
    cancel: CancellationToken,
    http: reqwest::Client,
}

impl DependencyClient {
    pub fn new(
        service: impl Into<String>,
        balancer: Arc<LoadBalancer>,
        breaker: Arc<CircuitBreaker>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mesh-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            service: service.into(),
            balancer,
            breaker,
            retry: None,
            cancel: CancellationToken::new(),
            http,
        })
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Abort in-flight retries when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let body = self.call(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, payload: &B) -> Result<T, ClientError> {
        let payload = serde_json::to_value(payload)?;
        let body = self.call(Method::POST, path, Some(&payload)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, payload: &B) -> Result<T, ClientError> {
        let payload = serde_json::to_value(payload)?;
        let body = self.call(Method::PUT, path, Some(&payload)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// DELETE `path`; the response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.call(Method::DELETE, path, None).await.map(|_| ())
    }

    async fn call(&self, method: Method, path: &str, payload: Option<&serde_json::Value>) -> Result<String, ClientError> {
        let Some(policy) = &self.retry else {
            return self.attempt(&method, path, payload).await;
        };

        let method = &method;
        let result = policy
            .run(&self.cancel, || async move {
                self.attempt(method, path, payload).await.map_err(|e| {
                    if e.is_transient() {
                        AttemptError::Transient(e)
                    } else {
                        AttemptError::Permanent(e)
                    }
                })
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Exhausted { attempts, last } => {
                tracing::warn!(service = %self.service, attempts = attempts, error = %last, "Dependency call gave up");
                last
            }
            RetryError::Aborted(e) => e,
            RetryError::Cancelled => ClientError::Cancelled,
        })
    }

    async fn attempt(&self, method: &Method, path: &str, payload: Option<&serde_json::Value>) -> Result<String, ClientError> {
        let endpoint = self.balancer.get_endpoint(&self.service)?;
        let mut request = self.http.request(method.clone(), format!("{}{}", endpoint, path));
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let outcome = self
            .breaker
            .execute_with(
                || async move {
                    let response = request.send().await?;
                    let status = response.status();
                    let body = response.text().await?;
                    Ok::<_, reqwest::Error>((status, body))
                },
                |result| matches!(result, Ok((status, _)) if !status.is_server_error()),
            )
            .await;

        match outcome {
            Ok((status, body)) if status.is_success() => Ok(body),
            Ok((status, body)) => Err(ClientError::Status {
                service: self.service.clone(),
                status,
                body,
            }),
            Err(BreakerError::Open) => Err(ClientError::CircuitOpen(self.service.clone())),
            Err(BreakerError::Inner(e)) => Err(ClientError::Transport(e)),
        }
    }
}
