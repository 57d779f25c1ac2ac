//! Gate and catalog configuration structures.

use std::env;

use serde::{Deserialize, Serialize};

use crate::model::{ProjectId, Resource};

/// Environment variable overriding [`GateConfig::affinity_capacity`].
pub const ENV_AFFINITY_CAPACITY: &str = "SHARED_RESOURCES_AFFINITY_CAPACITY";
/// Environment variable overriding [`GateConfig::writer_preference`].
pub const ENV_WRITER_PREFERENCE: &str = "SHARED_RESOURCES_WRITER_PREFERENCE";
/// Environment variable overriding [`GateConfig::audit_buffer`].
pub const ENV_AUDIT_BUFFER: &str = "SHARED_RESOURCES_AUDIT_BUFFER";

const MAX_AFFINITY_CAPACITY: usize = 1 << 20;

/// Admission gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum affinity keys remembered across passes. Zero disables affinity.
    pub affinity_capacity: usize,
    /// Reject readers of a quoted resource while a writer waits for it in the
    /// same pass.
    pub writer_preference: bool,
    /// Size of the in-memory audit buffer. Zero disables auditing.
    pub audit_buffer: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            affinity_capacity: 1024,
            writer_preference: true,
            audit_buffer: 0,
        }
    }
}

impl GateConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.affinity_capacity > MAX_AFFINITY_CAPACITY {
            return Err(format!(
                "affinity_capacity must be at most {MAX_AFFINITY_CAPACITY}"
            ));
        }
        Ok(())
    }

    /// Parse gate configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `SHARED_RESOURCES_*` environment variables,
    /// after loading a `.env` file if one exists.
    ///
    /// # Errors
    ///
    /// Returns a description of an unparsable variable or invalid value.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = read_var(ENV_AFFINITY_CAPACITY)? {
            cfg.affinity_capacity = v;
        }
        if let Some(v) = read_var(ENV_WRITER_PREFERENCE)? {
            cfg.writer_preference = v;
        }
        if let Some(v) = read_var(ENV_AUDIT_BUFFER)? {
            cfg.audit_buffer = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}: {e}")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{name}: {e}")),
    }
}

/// One project of the catalog and the resources it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project id.
    pub id: ProjectId,
    /// Parent project, `None` for the root.
    #[serde(default)]
    pub parent: Option<ProjectId>,
    /// Resources declared directly in this project.
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Resource catalog over a project tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Projects in any order.
    pub projects: Vec<ProjectConfig>,
}

impl CatalogConfig {
    /// Validate project and resource declarations.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem: no projects, a repeated
    /// project id, a missing parent, a resource filed under the wrong project
    /// or a name declared twice in one project.
    pub fn validate(&self) -> Result<(), String> {
        if self.projects.is_empty() {
            return Err("at least one project must be defined".into());
        }
        let mut ids = std::collections::HashSet::new();
        for project in &self.projects {
            if !ids.insert(project.id.as_str()) {
                return Err(format!("project `{}` defined twice", project.id));
            }
        }
        for project in &self.projects {
            if let Some(parent) = &project.parent {
                if !ids.contains(parent.as_str()) {
                    return Err(format!(
                        "project `{}` has unknown parent `{parent}`",
                        project.id
                    ));
                }
            }
            let mut names = std::collections::HashSet::new();
            for resource in &project.resources {
                if resource.project_id() != project.id {
                    return Err(format!(
                        "resource `{}` declares project `{}` but is listed under `{}`",
                        resource.name(),
                        resource.project_id(),
                        project.id
                    ));
                }
                if !names.insert(resource.name()) {
                    return Err(format!(
                        "project `{}` declares resource `{}` twice",
                        project.id,
                        resource.name()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Parse catalog configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
