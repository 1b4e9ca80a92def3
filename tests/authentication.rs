//! Basic and client-certificate authentication on the primary listener.

use axum::http::HeaderName;
use reqwest::StatusCode;
use serde_json::Value;
use service_bootstrap::auth::client_cert::fingerprint;
use service_bootstrap::auth::realm::hash_password;
use service_bootstrap::config::AuthenticationMode;
use service_bootstrap::net::listener::WEB;
use service_bootstrap::net::tls::load_certificates;
use service_bootstrap::{Bootstrap, BootstrapError};

mod common;

const CERT_HEADER: &str = "x-client-cert";

#[tokio::test]
async fn basic_authentication_with_existing_realm() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = dir.path().join("realm.properties");
    std::fs::write(
        &credentials,
        format!("operator: {},user\n", hash_password("correct-horse")),
    )
    .unwrap();

    let mut config = common::local_config(dir.path());
    config.authentication = AuthenticationMode::Basic;
    let server = Bootstrap::new(config)
        .with_credentials_file(&credentials)
        .start(&mut common::NoPrompt)
        .await
        .unwrap();
    let web = server.local_addr(WEB).unwrap();
    let client = common::client();

    let response = client.get(common::url(web, "/service")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()["www-authenticate"],
        "Basic realm=\"Realm\""
    );

    let response = client
        .get(common::url(web, "/service"))
        .basic_auth("operator", Some("wrong-password"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(common::url(web, "/service"))
        .basic_auth("operator", Some("correct-horse"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["principal"], "operator");
    assert_eq!(body["authentication"], "basic");

    common::stop(server).await;
}

#[tokio::test]
async fn missing_realm_without_prompt_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::local_config(dir.path());
    config.authentication = AuthenticationMode::Basic;
    let err = Bootstrap::new(config)
        .with_credentials_file(dir.path().join("realm.properties"))
        .start(&mut common::NoPrompt)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, BootstrapError::Auth(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(!dir.path().join("realm.properties").exists());
}

#[tokio::test]
async fn client_certificate_from_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::tls_config(dir.path());
    config.authentication = AuthenticationMode::ClientCertificate {
        header: Some(HeaderName::from_static(CERT_HEADER)),
        trust_store: common::store("ca.pem"),
    };
    let server = common::start(config).await;
    let web = server.local_addr(WEB).unwrap();
    let client = common::tls_client(web, None);

    let response = client.get(common::tls_url(web, "/service")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let trusted = std::fs::read_to_string(common::fixture("client.pem")).unwrap();
    let response = client
        .get(common::tls_url(web, "/service"))
        .header(CERT_HEADER, urlencoding::encode(&trusted).into_owned())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let expected = load_certificates(std::path::Path::new(&common::fixture("client.pem"))).unwrap();
    assert_eq!(body["principal"], fingerprint(&expected[0]));
    assert_eq!(body["authentication"], "client-certificate");

    let rogue = std::fs::read_to_string(common::fixture("rogue.pem")).unwrap();
    let response = client
        .get(common::tls_url(web, "/service"))
        .header(CERT_HEADER, urlencoding::encode(&rogue).into_owned())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    common::stop(server).await;
}

#[tokio::test]
async fn client_certificate_from_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::tls_config(dir.path());
    config.tls.client_authentication = true;
    config.tls.trust_store = common::store("ca.pem");
    config.authentication = AuthenticationMode::ClientCertificate {
        header: None,
        trust_store: common::store("ca.pem"),
    };
    let server = common::start(config).await;
    let web = server.local_addr(WEB).unwrap();

    let response = common::tls_client(web, Some("client.pem"))
        .get(common::tls_url(web, "/service"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["authentication"], "client-certificate");

    let rejected = common::tls_client(web, Some("rogue.pem"))
        .get(common::tls_url(web, "/service"))
        .send()
        .await;
    assert!(rejected.is_err());

    let anonymous = common::tls_client(web, None)
        .get(common::tls_url(web, "/service"))
        .send()
        .await;
    assert!(anonymous.is_err());

    common::stop(server).await;
}
