//! HTTP Basic authentication against the credentials realm.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::auth::realm::{Realm, ALLOWED_ROLES, REALM_NAME};
use crate::auth::Principal;
use crate::observability::metrics;

pub const SCHEME: &str = "basic";

/// Admit requests whose Basic credentials match a realm user holding an
/// allowed role. Everything else gets a 401 challenge.
pub async fn require_basic(
    State(realm): State<Arc<Realm>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_basic);

    let Some((username, password)) = credentials else {
        return challenge();
    };

    let allowed = realm
        .authenticate(&username, &password)
        .is_some_and(|roles| roles.iter().any(|r| ALLOWED_ROLES.contains(&r.as_str())));
    if !allowed {
        tracing::debug!(user = %username, "Basic authentication failed");
        return challenge();
    }

    request.extensions_mut().insert(Principal {
        name: username,
        scheme: SCHEME,
    });
    next.run(request).await
}

/// `(username, password)` from an `Authorization: Basic ...` value.
pub fn decode_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn challenge() -> Response {
    metrics::record_authentication_failure(SCHEME, StatusCode::UNAUTHORIZED.as_u16());
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{}\"", REALM_NAME)) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let realm = Arc::new(Realm::parse(
            "alice: wonderland,user\nroot: toor-toor,admin\nguest: guest-pass,guest\n",
        ));
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(realm, require_basic))
    }

    fn request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
    }

    #[test]
    fn decodes_credentials() {
        assert_eq!(
            decode_basic("Basic YWxpY2U6d29uZGVybGFuZA=="),
            Some(("alice".to_string(), "wonderland".to_string()))
        );
        assert_eq!(
            decode_basic(&basic("bob", "pass:with:colons")),
            Some(("bob".to_string(), "pass:with:colons".to_string()))
        );
        assert_eq!(decode_basic("Bearer token"), None);
        assert_eq!(decode_basic("Basic !!!"), None);
    }

    #[tokio::test]
    async fn missing_credentials_get_a_challenge() {
        let response = app().oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Realm\""
        );
    }

    #[tokio::test]
    async fn valid_user_and_admin_roles_pass() {
        let response = app().oneshot(request(Some(&basic("alice", "wonderland")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app().oneshot(request(Some(&basic("root", "toor-toor")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_password_or_role_is_rejected() {
        let response = app().oneshot(request(Some(&basic("alice", "nope")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = app().oneshot(request(Some(&basic("guest", "guest-pass")))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
