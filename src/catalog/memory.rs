//! In-memory project tree with per-project resource declarations.

use std::collections::{BTreeMap, HashMap};

use crate::catalog::ProjectCatalog;
use crate::core::SharedResourceError;
use crate::model::{ProjectId, Resource};

#[derive(Debug, Clone, Default)]
struct ProjectEntry {
    parent: Option<ProjectId>,
    /// Keyed by resource name; one declaration per name per project.
    resources: BTreeMap<String, Resource>,
}

/// Project catalog stored in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    projects: HashMap<ProjectId, ProjectEntry>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project. The parent, if given, must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::UnknownProject`] for a missing parent.
    pub fn add_project(
        &mut self,
        id: impl Into<ProjectId>,
        parent: Option<&str>,
    ) -> Result<(), SharedResourceError> {
        if let Some(parent) = parent {
            if !self.projects.contains_key(parent) {
                return Err(SharedResourceError::UnknownProject(parent.to_string()));
            }
        }
        let entry = self.projects.entry(id.into()).or_default();
        entry.parent = parent.map(str::to_string);
        Ok(())
    }

    /// Re-parent a project without checks beyond existence; cycles are
    /// detected when resolving.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::UnknownProject`] when either project is
    /// missing.
    pub fn set_parent(&mut self, id: &str, parent: Option<&str>) -> Result<(), SharedResourceError> {
        if let Some(parent) = parent {
            if !self.projects.contains_key(parent) {
                return Err(SharedResourceError::UnknownProject(parent.to_string()));
            }
        }
        let entry = self
            .projects
            .get_mut(id)
            .ok_or_else(|| SharedResourceError::UnknownProject(id.to_string()))?;
        entry.parent = parent.map(str::to_string);
        Ok(())
    }

    /// Declare `resource` in its project.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::UnknownProject`] or
    /// [`SharedResourceError::DuplicateResource`].
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), SharedResourceError> {
        let project = resource.project_id().to_string();
        let entry = self
            .projects
            .get_mut(&project)
            .ok_or_else(|| SharedResourceError::UnknownProject(project.clone()))?;
        if entry.resources.contains_key(resource.name()) {
            return Err(SharedResourceError::DuplicateResource {
                project,
                name: resource.name().to_string(),
            });
        }
        tracing::debug!(project = %project, resource = resource.name(), "resource added");
        entry
            .resources
            .insert(resource.name().to_string(), resource);
        Ok(())
    }

    /// Replace the resource currently named `current_name` in `project`.
    /// Renaming onto another existing name is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::UnknownProject`],
    /// [`SharedResourceError::ResourceNotFound`] or
    /// [`SharedResourceError::DuplicateResource`].
    pub fn edit_resource(
        &mut self,
        project: &str,
        current_name: &str,
        resource: Resource,
    ) -> Result<(), SharedResourceError> {
        let entry = self
            .projects
            .get_mut(project)
            .ok_or_else(|| SharedResourceError::UnknownProject(project.to_string()))?;
        if !entry.resources.contains_key(current_name) {
            return Err(SharedResourceError::ResourceNotFound {
                project: project.to_string(),
                name: current_name.to_string(),
            });
        }
        if resource.name() != current_name && entry.resources.contains_key(resource.name()) {
            return Err(SharedResourceError::DuplicateResource {
                project: project.to_string(),
                name: resource.name().to_string(),
            });
        }
        entry.resources.remove(current_name);
        entry
            .resources
            .insert(resource.name().to_string(), resource);
        Ok(())
    }

    /// Remove a declaration and return it.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::UnknownProject`] or
    /// [`SharedResourceError::ResourceNotFound`].
    pub fn remove_resource(&mut self, project: &str, name: &str) -> Result<Resource, SharedResourceError> {
        let entry = self
            .projects
            .get_mut(project)
            .ok_or_else(|| SharedResourceError::UnknownProject(project.to_string()))?;
        entry
            .resources
            .remove(name)
            .ok_or_else(|| SharedResourceError::ResourceNotFound {
                project: project.to_string(),
                name: name.to_string(),
            })
    }

    /// Number of projects.
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

impl ProjectCatalog for InMemoryCatalog {
    fn contains_project(&self, project: &str) -> bool {
        self.projects.contains_key(project)
    }

    fn parent_of(&self, project: &str) -> Option<ProjectId> {
        self.projects.get(project).and_then(|e| e.parent.clone())
    }

    fn list_resources(&self, project: &str) -> Vec<Resource> {
        self.projects
            .get(project)
            .map(|e| e.resources.values().cloned().collect())
            .unwrap_or_default()
    }
}
