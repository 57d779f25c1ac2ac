//! Effective resources of a project: nearest declaration wins.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::ProjectCatalog;
use crate::core::SharedResourceError;
use crate::model::{ProjectId, ResourceMap};

/// Resolves and caches the effective resource map per project.
///
/// A resource declared in a project overrides any ancestor resource with the
/// same name for that project's subtree. The cache must be invalidated
/// whenever the underlying catalog changes.
#[derive(Debug)]
pub struct CatalogResolver<C> {
    catalog: C,
    cache: Mutex<HashMap<ProjectId, Arc<ResourceMap>>>,
}

impl<C: ProjectCatalog> CatalogResolver<C> {
    /// Resolver over `catalog` with an empty cache.
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Underlying catalog.
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Mutable access to the catalog. Clears the cache.
    pub fn catalog_mut(&mut self) -> &mut C {
        self.cache.get_mut().clear();
        &mut self.catalog
    }

    /// Drop every cached project map.
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }

    /// Effective resources visible to `project`.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::UnknownProject`] if `project` (or an
    /// ancestor) is missing and [`SharedResourceError::HierarchyCycle`] if
    /// the parent chain loops.
    pub fn resolve(&self, project: &str) -> Result<Arc<ResourceMap>, SharedResourceError> {
        if let Some(hit) = self.cache.lock().get(project) {
            return Ok(Arc::clone(hit));
        }

        let chain = self.ancestry(project)?;
        let mut resources = ResourceMap::new();
        // root first so nearer projects overwrite
        for id in chain.iter().rev() {
            for resource in self.catalog.list_resources(id) {
                if let Some(previous) = resources.get(resource.name()) {
                    tracing::trace!(
                        resource = resource.name(),
                        overridden = previous.project_id(),
                        by = %id,
                        "resource overridden"
                    );
                }
                resources.insert(resource.name().to_string(), resource);
            }
        }

        let resolved = Arc::new(resources);
        self.cache
            .lock()
            .insert(project.to_string(), Arc::clone(&resolved));
        Ok(resolved)
    }

    /// `project` followed by its ancestors up to the root.
    fn ancestry(&self, project: &str) -> Result<Vec<ProjectId>, SharedResourceError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(project.to_string());
        while let Some(id) = current {
            if !self.catalog.contains_project(&id) {
                return Err(SharedResourceError::UnknownProject(id));
            }
            if !seen.insert(id.clone()) {
                return Err(SharedResourceError::HierarchyCycle(id));
            }
            current = self.catalog.parent_of(&id);
            chain.push(id);
        }
        Ok(chain)
    }
}
