//! Embedded store supervision during startup.

use service_bootstrap::lifecycle::AuxiliaryKind;
use service_bootstrap::store::StoreError;
use service_bootstrap::{Bootstrap, BootstrapError};

mod common;

fn write_persistence(dir: &std::path::Path, url: &str) {
    std::fs::write(
        dir.join("persistence.toml"),
        format!(
            "[jdbc]\nurl = \"{}\"\n\n[embedded_store]\nprogram = \"sh\"\nargs = [\"-c\", \"sleep 30\", \"embedded-store\"]\n",
            url
        ),
    )
    .unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn store_runs_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    write_persistence(dir.path(), "jdbc:hsqldb:hsql://localhost:9001/fs");
    let mut config = common::local_config(dir.path());
    config.embedded_store.enabled = true;
    config.embedded_store.directory = dir.path().join("hsqldb");

    let server = common::start(config).await;
    let store = server.auxiliary()[0].clone();
    assert_eq!(store.kind(), AuxiliaryKind::EmbeddedStore);
    assert!(store.is_running());

    common::stop(server).await;
    assert!(!store.is_running());
}

#[tokio::test]
async fn remote_host_is_rejected_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    write_persistence(dir.path(), "jdbc:hsqldb:hsql://10.0.0.5:9001/fs");
    let mut config = common::local_config(dir.path());
    config.embedded_store.enabled = true;

    let err = Bootstrap::new(config)
        .start(&mut common::NoPrompt)
        .await
        .err()
        .unwrap();
    match &err {
        BootstrapError::Store(StoreError::BindPolicyViolation { host, .. }) => {
            assert_eq!(host, "10.0.0.5")
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn store_is_skipped_without_flag() {
    let dir = tempfile::tempdir().unwrap();
    write_persistence(dir.path(), "jdbc:hsqldb:hsql://10.0.0.5:9001/fs");
    let server = common::start(common::local_config(dir.path())).await;
    assert!(server.auxiliary().is_empty());
    common::stop(server).await;
}

#[tokio::test]
async fn invalid_persistence_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("persistence.toml"), "[jdbc\nurl = ").unwrap();
    let err = Bootstrap::new(common::local_config(dir.path()))
        .start(&mut common::NoPrompt)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, BootstrapError::Config(_)));
}
