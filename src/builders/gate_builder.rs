//! Builders to construct gates and catalogs from configuration.

use std::path::Path;

use anyhow::Context;

use crate::catalog::{InMemoryCatalog, ProjectCatalog};
use crate::config::{CatalogConfig, GateConfig};
use crate::core::{AppResult, InMemoryAuditSink, SharedResourceError, SharedResourceGate};

/// Build a gate from validated configuration. An in-memory audit sink is
/// attached when `audit_buffer` is non-zero.
///
/// # Errors
///
/// Returns [`SharedResourceError::Config`] if validation fails.
pub fn build_gate(cfg: &GateConfig) -> Result<SharedResourceGate, SharedResourceError> {
    cfg.validate().map_err(SharedResourceError::Config)?;

    let gate = SharedResourceGate::new(cfg.clone());
    let gate = if cfg.audit_buffer > 0 {
        gate.with_audit(Box::new(InMemoryAuditSink::new(cfg.audit_buffer)))
    } else {
        gate
    };
    tracing::debug!(
        affinity_capacity = cfg.affinity_capacity,
        writer_preference = cfg.writer_preference,
        audit_buffer = cfg.audit_buffer,
        "gate built"
    );
    Ok(gate)
}

/// Build an in-memory catalog. Parents are added before their children
/// regardless of the order projects are listed in.
///
/// # Errors
///
/// Returns [`SharedResourceError::Config`] if validation fails or the
/// project tree has a cycle, and catalog errors for bad resources.
pub fn build_catalog(cfg: &CatalogConfig) -> Result<InMemoryCatalog, SharedResourceError> {
    cfg.validate().map_err(SharedResourceError::Config)?;

    let mut catalog = InMemoryCatalog::new();
    let mut remaining: Vec<_> = cfg.projects.iter().collect();
    while !remaining.is_empty() {
        let before = remaining.len();
        let mut deferred = Vec::new();
        for project in remaining {
            let ready = project
                .parent
                .as_deref()
                .is_none_or(|p| catalog.contains_project(p));
            if ready {
                catalog.add_project(project.id.clone(), project.parent.as_deref())?;
                for resource in &project.resources {
                    catalog.add_resource(resource.clone())?;
                }
            } else {
                deferred.push(project);
            }
        }
        if deferred.len() == before {
            let ids: Vec<_> = deferred.iter().map(|p| p.id.as_str()).collect();
            return Err(SharedResourceError::Config(format!(
                "project hierarchy cycle among {}",
                ids.join(", ")
            )));
        }
        remaining = deferred;
    }
    Ok(catalog)
}

/// Read gate configuration from a JSON file and build the gate.
///
/// # Errors
///
/// Returns an error naming the file if it cannot be read, parsed or built.
pub fn load_gate(path: impl AsRef<Path>) -> AppResult<SharedResourceGate> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading gate config {}", path.display()))?;
    let cfg = GateConfig::from_json_str(&raw)
        .map_err(SharedResourceError::Config)
        .with_context(|| format!("parsing gate config {}", path.display()))?;
    let gate = build_gate(&cfg).context("building gate")?;
    Ok(gate)
}

/// Read catalog configuration from a JSON file and build the catalog.
///
/// # Errors
///
/// Returns an error naming the file if it cannot be read, parsed or built.
pub fn load_catalog(path: impl AsRef<Path>) -> AppResult<InMemoryCatalog> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog config {}", path.display()))?;
    let cfg = CatalogConfig::from_json_str(&raw)
        .map_err(SharedResourceError::Config)
        .with_context(|| format!("parsing catalog config {}", path.display()))?;
    let catalog = build_catalog(&cfg).context("building catalog")?;
    Ok(catalog)
}
