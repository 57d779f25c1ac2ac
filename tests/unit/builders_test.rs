//! Tests for builder modules

use std::io::Write;

use shared_resources::builders::{build_catalog, build_gate, load_gate};
use shared_resources::catalog::{CatalogResolver, ProjectCatalog};
use shared_resources::config::{CatalogConfig, GateConfig, ProjectConfig};
use shared_resources::core::SharedResourceError;
use shared_resources::model::Resource;

#[test]
fn test_build_gate_defaults() {
    let gate = build_gate(&GateConfig::default()).unwrap();
    assert_eq!(gate.config().affinity_capacity, 1024);
    assert_eq!(gate.affinity().capacity(), 1024);
    assert!(gate.audit_events().is_empty());
    assert_eq!(gate.passes(), 0);
}

#[test]
fn test_build_gate_rejects_invalid_config() {
    let config = GateConfig {
        affinity_capacity: usize::MAX,
        ..GateConfig::default()
    };
    assert!(matches!(build_gate(&config), Err(SharedResourceError::Config(_))));
}

#[test]
fn test_build_catalog_children_before_parents() {
    let config = CatalogConfig {
        projects: vec![
            ProjectConfig {
                id: "leaf".to_string(),
                parent: Some("mid".to_string()),
                resources: vec![Resource::quoted("r3", "leaf", "db", 5)],
            },
            ProjectConfig {
                id: "mid".to_string(),
                parent: Some("root".to_string()),
                resources: Vec::new(),
            },
            ProjectConfig {
                id: "root".to_string(),
                parent: None,
                resources: vec![
                    Resource::quoted("r1", "root", "db", 1),
                    Resource::infinite("r2", "root", "seat"),
                ],
            },
        ],
    };

    let catalog = build_catalog(&config).unwrap();
    assert_eq!(catalog.project_count(), 3);
    assert_eq!(catalog.parent_of("leaf").as_deref(), Some("mid"));

    let resolver = CatalogResolver::new(catalog);
    let leaf = resolver.resolve("leaf").unwrap();
    assert_eq!(leaf["db"].id(), "r3");
    assert_eq!(leaf["seat"].id(), "r2");
}

#[test]
fn test_build_catalog_rejects_cycle() {
    let config = CatalogConfig {
        projects: vec![
            ProjectConfig {
                id: "a".to_string(),
                parent: Some("b".to_string()),
                resources: Vec::new(),
            },
            ProjectConfig {
                id: "b".to_string(),
                parent: Some("a".to_string()),
                resources: Vec::new(),
            },
        ],
    };
    let err = build_catalog(&config).unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_load_gate_from_file() {
    let path = std::env::temp_dir().join(format!("shared_resources_gate_{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{ "affinity_capacity": 16, "audit_buffer": 4 }}"#).unwrap();
    drop(file);

    let gate = load_gate(&path).unwrap();
    assert_eq!(gate.config().affinity_capacity, 16);
    assert_eq!(gate.config().audit_buffer, 4);
    std::fs::remove_file(&path).unwrap();

    let err = load_gate(&path).unwrap_err();
    assert!(format!("{err:#}").contains("reading gate config"));
}
