//! Error types for admission and catalog operations.

use thiserror::Error;

/// Errors produced by gate components.
///
/// Admission rejections are not errors; see [`crate::core::AdmitResult`].
#[derive(Debug, Error)]
pub enum SharedResourceError {
    /// Declaration text is not a lock.
    #[error("invalid lock declaration: {0}")]
    InvalidLock(String),
    /// Project is not part of the catalog.
    #[error("unknown project: {0}")]
    UnknownProject(String),
    /// Parent chain of a project loops back on itself.
    #[error("project hierarchy cycle at {0}")]
    HierarchyCycle(String),
    /// A project already declares a resource with this name.
    #[error("duplicate resource `{name}` in project {project}")]
    DuplicateResource {
        /// Declaring project.
        project: String,
        /// Conflicting name.
        name: String,
    },
    /// No resource with this name in the project.
    #[error("resource `{name}` not found in project {project}")]
    ResourceNotFound {
        /// Project searched.
        project: String,
        /// Missing name.
        name: String,
    },
    /// A taken-lock invariant broke during a pass. Fatal to the pass.
    #[error("invariant violated on resource `{resource}`: {detail}")]
    InvariantViolation {
        /// Resource whose holders are inconsistent.
        resource: String,
        /// What broke.
        detail: String,
    },
    /// Configuration failed validation.
    #[error("config invalid: {0}")]
    Config(String),
    /// Usage report could not be encoded or decoded.
    #[error("report error: {0}")]
    Report(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
