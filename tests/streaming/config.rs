//! Registration from TOML config

use crate::common::*;
use rowstream::{RegistryConfig, DEFAULT_BATCH_SIZE};
use tempfile::TempDir;

const CONFIG: &str = r#"
[defaults]
batch_size = 50
single_array = true

[entities.user]
batch_size = 2

[entities.audit]
object_mode = true
"#;

#[tokio::test]
async fn registry_from_toml_drives_engines() {
    let config = RegistryConfig::from_toml_str(CONFIG).unwrap();
    let registry = EntityRegistry::from_config(&config, ["user", "audit"]).unwrap();

    let users = registry.engine("user", accounts(5)).unwrap();
    let text = users.search(StreamRequest::new()).collect_text().await.unwrap();
    assert_eq!(serde_json::from_str::<Vec<Record>>(&text).unwrap().len(), 5);

    let store = accounts(120);
    let audit = registry.engine("audit", store.clone()).unwrap();
    let (sizes, _) = drain(audit.search(StreamRequest::new())).await;
    assert_eq!(sizes, vec![50, 50, 20]);

    assert_eq!(registry.metrics().snapshot().completed, 2);
}

#[tokio::test]
async fn user_batch_size_from_config() {
    let config = RegistryConfig::from_toml_str(CONFIG).unwrap();
    let registry = EntityRegistry::from_config(&config, ["user"]).unwrap();
    let store = accounts(5);
    let engine = registry.engine("user", store.clone()).unwrap();
    engine.search(StreamRequest::new()).collect_text().await.unwrap();
    assert_eq!(
        find_windows(&store),
        vec![(0, Some(2)), (2, Some(2)), (4, Some(1))]
    );
}

#[test]
fn config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rowstream.toml");
    std::fs::write(&path, CONFIG).unwrap();

    let config = RegistryConfig::from_file(&path).unwrap();
    assert_eq!(config.resolve("user").batch_size, 2);
    assert!(config.resolve("user").single_array);

    let copy = dir.path().join("copy.toml");
    config.write_to_file(&copy).unwrap();
    assert_eq!(RegistryConfig::from_file(&copy).unwrap(), config);
}

#[test]
fn init_precedence() {
    let explicit = EntityRegistry::init([("user", Some(7)), ("post", None)], Some(250));
    assert_eq!(explicit.config_for("user").unwrap().batch_size, 250);
    assert_eq!(explicit.config_for("post").unwrap().batch_size, 250);

    let implicit = EntityRegistry::init([("user", Some(7)), ("post", None)], None);
    assert_eq!(implicit.config_for("user").unwrap().batch_size, 7);
    assert_eq!(
        implicit.config_for("post").unwrap().batch_size,
        DEFAULT_BATCH_SIZE
    );
}

#[test]
fn unknown_entity_is_rejected() {
    let registry = EntityRegistry::init([("user", None)], None);
    assert!(matches!(
        registry.engine("ghost", accounts(0)),
        Err(StreamError::UnknownEntity { .. })
    ));
}
