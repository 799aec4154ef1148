use std::io::Write;

use stepgraph_core::config::{AppConfig, StorageBackend};
use stepgraph_core::error::StepgraphError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
max_iterations = 25

[storage]
backend = "sqlite"
workspace = "/tmp/stepgraph-test"
path = "runs.db"

[gateway]
bind = "0.0.0.0:9999"

[workflows]
seed_code_review = false
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_iterations, 25);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(
        config.database_path(),
        std::path::PathBuf::from("/tmp/stepgraph-test/runs.db")
    );
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert!(!config.workflows.seed_code_review);
}

#[test]
fn test_partial_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[gateway]\nbind = \"127.0.0.1:1234\"\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.gateway.bind, "127.0.0.1:1234");
    assert_eq!(config.engine.max_iterations, 100);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert!(config.workflows.seed_code_review);
}

#[test]
fn test_env_var_expansion_in_file() {
    std::env::set_var("STEPGRAPH_TEST_BIND", "10.0.0.1:8080");
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[gateway]\nbind = \"${STEPGRAPH_TEST_BIND}\"\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.gateway.bind, "10.0.0.1:8080");
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, StepgraphError::ConfigNotFound(_)));
}

#[test]
fn test_zero_max_iterations_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[engine]\nmax_iterations = 0\n").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, StepgraphError::Config(_)));
}

#[test]
fn test_unknown_backend_rejected() {
    let err = AppConfig::parse("[storage]\nbackend = \"postgres\"\n").unwrap_err();
    assert!(matches!(err, StepgraphError::Config(_)));
}
