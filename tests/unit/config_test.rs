//! Tests for configuration validation

use shared_resources::config::{CatalogConfig, GateConfig, ProjectConfig};
use shared_resources::model::Resource;

fn project(id: &str, parent: Option<&str>, resources: Vec<Resource>) -> ProjectConfig {
    ProjectConfig {
        id: id.to_string(),
        parent: parent.map(str::to_string),
        resources,
    }
}

#[test]
fn test_gate_config_defaults() {
    let config = GateConfig::default();
    assert_eq!(config.affinity_capacity, 1024);
    assert!(config.writer_preference);
    assert_eq!(config.audit_buffer, 0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_gate_config_invalid_affinity_capacity() {
    let invalid = GateConfig {
        affinity_capacity: usize::MAX,
        ..GateConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_gate_config_from_json_partial() {
    let config = GateConfig::from_json_str(r#"{ "writer_preference": false }"#).unwrap();
    assert!(!config.writer_preference);
    assert_eq!(config.affinity_capacity, 1024);

    assert!(GateConfig::from_json_str("{ not json").is_err());
}

#[test]
fn test_catalog_config_validation() {
    let config = CatalogConfig {
        projects: vec![
            project("root", None, vec![Resource::quoted("r1", "root", "db", 2)]),
            project("child", Some("root"), vec![Resource::infinite("r2", "child", "db")]),
        ],
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_catalog_config_empty_projects() {
    assert!(CatalogConfig::default().validate().is_err());
}

#[test]
fn test_catalog_config_unknown_parent() {
    let config = CatalogConfig {
        projects: vec![project("child", Some("root"), Vec::new())],
    };
    let err = config.validate().unwrap_err();
    assert!(err.contains("unknown parent"));
}

#[test]
fn test_catalog_config_misfiled_resource() {
    let config = CatalogConfig {
        projects: vec![project("root", None, vec![Resource::quoted("r1", "other", "db", 1)])],
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_catalog_config_duplicate_name() {
    let config = CatalogConfig {
        projects: vec![project(
            "root",
            None,
            vec![
                Resource::quoted("r1", "root", "db", 1),
                Resource::custom("r2", "root", "db", ["a"]),
            ],
        )],
    };
    let err = config.validate().unwrap_err();
    assert!(err.contains("twice"));
}

#[test]
fn test_catalog_config_from_json() {
    let json = r#"{
        "projects": [
            {
                "id": "root",
                "resources": [
                    { "type": "quoted", "id": "r1", "project_id": "root", "name": "db", "quota": { "limited": 2 } },
                    { "type": "quoted", "id": "r2", "project_id": "root", "name": "seat", "quota": "infinite" }
                ]
            },
            {
                "id": "child",
                "parent": "root",
                "resources": [
                    { "type": "custom", "id": "r3", "project_id": "child", "name": "env", "values": ["b", "a"], "enabled": false }
                ]
            }
        ]
    }"#;

    let config = CatalogConfig::from_json_str(json).unwrap();
    assert_eq!(config.projects.len(), 2);
    assert_eq!(config.projects[0].resources[0].capacity(), Some(2));
    assert_eq!(config.projects[0].resources[1].capacity(), None);
    assert!(config.projects[0].resources[0].is_enabled());
    assert!(!config.projects[1].resources[0].is_enabled());
}
