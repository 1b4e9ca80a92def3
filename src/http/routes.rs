//! Per-listener routers.
//!
//! Every listener serves its own router, and each router only answers
//! requests tagged with its own [`ListenerName`]. The health endpoint is
//! therefore unreachable on the primary listener and the service is
//! unreachable on the health listener, even when both share a host.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthenticationPlan, Principal};
use crate::net::listener::{HEALTH, WEB};

pub const SERVICE_SEGMENT: &str = "/service";
pub const HEALTH_PATH: &str = "/health";

/// Name of the listener a request arrived on, set by the server per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerName(pub &'static str);

/// Where the service is mounted for a configured base path.
pub fn service_mount(path: &str) -> String {
    format!("{}{}", path.trim_end_matches('/'), SERVICE_SEGMENT)
}

/// Router of the primary listener: `service` mounted under `<path>/service`,
/// wrapped in the authentication plan's filters.
pub fn primary_router(path: &str, service: Router, plan: &AuthenticationPlan) -> Router {
    let routes = Router::new()
        .nest(&service_mount(path), service)
        .fallback(not_found);
    instrument(restrict_to(WEB, plan.apply(routes)))
}

/// Router of the health listener.
pub fn health_router() -> Router {
    let routes = Router::new()
        .route(HEALTH_PATH, get(health))
        .fallback(not_found);
    instrument(restrict_to(HEALTH, routes))
}

/// Service used when the embedding application provides none: reports who
/// the caller was authenticated as.
pub fn default_service() -> Router {
    Router::new().route("/", get(service_info))
}

/// Request IDs and request spans, shared by every listener.
pub fn instrument(router: Router) -> Router {
    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Only answer requests that arrived on the listener called `name`.
pub fn restrict_to(name: &'static str, router: Router) -> Router {
    router.layer(middleware::from_fn_with_state(ListenerName(name), require_listener))
}

async fn require_listener(
    State(expected): State<ListenerName>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match request.extensions().get::<ListenerName>() {
        Some(actual) if *actual == expected => next.run(request).await,
        actual => {
            tracing::debug!(expected = expected.0, actual = ?actual, "Request for another listener");
            not_found().await.into_response()
        }
    }
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": 404, "error": "Not Found" })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

async fn service_info(request: Request<Body>) -> Json<Value> {
    let principal = request.extensions().get::<Principal>();
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "principal": principal.map(|p| p.name.as_str()),
        "authentication": principal.map(|p| p.scheme),
    }))
}
