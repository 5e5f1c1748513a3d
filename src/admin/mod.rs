//! Admin API, served on its own listener.
//!
//! ```text
//! GET    /admin/status
//! GET    /admin/services
//! POST   /admin/services
//! DELETE /admin/services/{service}/{id}
//! GET    /admin/breakers
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::http::server::GatewayState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

pub fn setup_admin_router(state: GatewayState) -> Router {
    let api_key: Arc<str> = Arc::from(state.config.admin.api_key.as_str());

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/services", get(get_services).post(register_service))
        .route("/admin/services/{service}/{id}", delete(deregister_service))
        .route("/admin/breakers", get(get_breakers))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
