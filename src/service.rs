//! Thread-safe handle to a gate.
//!
//! Several scheduler threads may trigger passes; each pass takes the gate
//! lock for its whole duration so passes never interleave.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::{CatalogResolver, ProjectCatalog};
use crate::core::{AuditEvent, Holder, PassOutcome, SharedResourceError, SharedResourceGate};
use crate::model::ResourceMap;

/// Cloneable handle sharing one [`SharedResourceGate`].
#[derive(Debug, Clone)]
pub struct SharedGate {
    inner: Arc<Mutex<SharedResourceGate>>,
}

impl SharedGate {
    /// Wrap a gate.
    #[must_use]
    pub fn new(gate: SharedResourceGate) -> Self {
        Self {
            inner: Arc::new(Mutex::new(gate)),
        }
    }

    /// Run one pass with the gate locked.
    ///
    /// # Errors
    ///
    /// See [`SharedResourceGate::run_pass`].
    pub fn run_pass(
        &self,
        resources: &ResourceMap,
        running: &[Holder],
        queue: &[Holder],
    ) -> Result<Vec<PassOutcome>, SharedResourceError> {
        self.inner.lock().run_pass(resources, running, queue)
    }

    /// Resolve `project` through `resolver` and run one pass over its
    /// effective resources.
    ///
    /// # Errors
    ///
    /// Returns catalog resolution errors or those of
    /// [`SharedResourceGate::run_pass`].
    pub fn run_project_pass<C: ProjectCatalog>(
        &self,
        resolver: &CatalogResolver<C>,
        project: &str,
        running: &[Holder],
        queue: &[Holder],
    ) -> Result<Vec<PassOutcome>, SharedResourceError> {
        let resources = resolver.resolve(project)?;
        self.run_pass(&resources, running, queue)
    }

    /// Drop remembered values for an affinity key, e.g. when its build
    /// configuration is deleted.
    pub fn forget_affinity(&self, key: &str) {
        self.inner.lock().affinity_mut().forget(key);
    }

    /// Drop remembered values for a resource, e.g. when it is edited or
    /// removed.
    pub fn forget_resource(&self, resource_id: &str) {
        self.inner.lock().affinity_mut().forget_resource(resource_id);
    }

    /// Drop all remembered values.
    pub fn clear_affinity(&self) {
        self.inner.lock().affinity_mut().clear();
    }

    /// Number of remembered affinity entries.
    #[must_use]
    pub fn affinity_len(&self) -> usize {
        self.inner.lock().affinity().len()
    }

    /// Passes run through this gate.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.inner.lock().passes()
    }

    /// Events held by the gate's audit sink.
    #[must_use]
    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.inner.lock().audit_events()
    }
}

impl From<SharedResourceGate> for SharedGate {
    fn from(gate: SharedResourceGate) -> Self {
        Self::new(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::config::GateConfig;
    use crate::model::{Lock, Resource};
    use std::thread;

    fn resources() -> ResourceMap {
        let r = Resource::quoted("r1", "p", "db", 4);
        ResourceMap::from([(r.name().to_string(), r)])
    }

    #[test]
    fn test_passes_from_many_threads() {
        let gate = SharedGate::new(SharedResourceGate::new(GateConfig::default()));
        let resources = Arc::new(resources());

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let gate = gate.clone();
                let resources = Arc::clone(&resources);
                thread::spawn(move || {
                    let queue = vec![Holder::new(i, vec![Lock::read("db")]).with_affinity(format!("cfg{i}"))];
                    gate.run_pass(&resources, &[], &queue).unwrap()
                })
            })
            .collect();

        for handle in handles {
            let outcomes = handle.join().unwrap();
            assert!(outcomes[0].result.is_admitted());
        }
        assert_eq!(gate.passes(), 8);
        assert_eq!(gate.affinity_len(), 8);

        gate.forget_affinity("cfg0");
        assert_eq!(gate.affinity_len(), 7);
        gate.forget_resource("r1");
        assert_eq!(gate.affinity_len(), 0);
    }

    #[test]
    fn test_project_pass_uses_resolver() {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_project("root", None).unwrap();
        catalog.add_project("child", Some("root")).unwrap();
        catalog.add_resource(Resource::quoted("r1", "root", "db", 0)).unwrap();
        catalog.add_resource(Resource::quoted("r2", "child", "db", 1)).unwrap();
        let resolver = CatalogResolver::new(catalog);

        let gate = SharedGate::from(SharedResourceGate::new(GateConfig::default()));
        let queue = vec![Holder::new(1, vec![Lock::write("db")])];
        let outcomes = gate.run_project_pass(&resolver, "child", &[], &queue).unwrap();
        assert!(outcomes[0].result.is_admitted());
        let outcomes = gate.run_project_pass(&resolver, "root", &[], &queue).unwrap();
        assert!(!outcomes[0].result.is_admitted());
        assert!(gate.run_project_pass(&resolver, "missing", &[], &queue).is_err());
    }
}
