//! Resource catalog over a project hierarchy.

pub mod memory;
pub mod resolver;

pub use memory::InMemoryCatalog;
pub use resolver::CatalogResolver;

use crate::model::{ProjectId, Resource};

/// Source of resource definitions, scoped per project.
pub trait ProjectCatalog {
    /// Whether `project` exists.
    fn contains_project(&self, project: &str) -> bool;
    /// Parent of `project`, `None` for the root or an unknown project.
    fn parent_of(&self, project: &str) -> Option<ProjectId>;
    /// Resources declared directly in `project`, not inherited ones.
    fn list_resources(&self, project: &str) -> Vec<Resource>;
}
