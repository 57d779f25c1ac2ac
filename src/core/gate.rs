//! Admission pass over a queue of candidates.
//!
//! A pass takes a snapshot of running holders, builds the taken-lock index,
//! then walks the queue in order. Each admitted candidate gets its values
//! allocated and its locks added to the index before the next candidate is
//! checked, so candidates in the same pass contend with each other as well as
//! with running holders.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::core::{
    build_audit_event, AdmissionChecker, AdmitResult, AffinityCache, AuditEvent, AuditSink, PendingWriters,
    RejectReason, SharedResourceError, TakenLocks, UsageReport, ValueAllocator,
};
use crate::model::{AffinityKey, HolderId, Lock, Resource, ResourceMap};

/// A running or queued job and the locks it holds or requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    /// Stable job id.
    pub id: HolderId,
    /// Key used to prefer the same values across passes.
    #[serde(default)]
    pub affinity: Option<AffinityKey>,
    /// Locks in declaration order. For running holders these carry values.
    pub locks: Vec<Lock>,
}

impl Holder {
    /// Holder without an affinity key.
    #[must_use]
    pub const fn new(id: HolderId, locks: Vec<Lock>) -> Self {
        Self {
            id,
            affinity: None,
            locks,
        }
    }

    /// Attach an affinity key.
    #[must_use]
    pub fn with_affinity(mut self, key: impl Into<AffinityKey>) -> Self {
        self.affinity = Some(key.into());
        self
    }
}

/// Decision for one queued candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Candidate id.
    pub holder: HolderId,
    /// Admission decision.
    pub result: AdmitResult,
    /// Locks with allocated values; empty on rejection.
    pub assigned: Vec<Lock>,
}

impl PassOutcome {
    /// Usage report of the assigned locks.
    #[must_use]
    pub fn usage_report(&self) -> UsageReport {
        UsageReport::from_assigned(self.holder, &self.assigned)
    }
}

/// Lock admission gate. Owns the affinity cache that survives across passes.
pub struct SharedResourceGate {
    config: GateConfig,
    affinity: AffinityCache,
    audit: Option<Box<dyn AuditSink>>,
    passes: u64,
}

impl std::fmt::Debug for SharedResourceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResourceGate")
            .field("config", &self.config)
            .field("affinity", &self.affinity)
            .field("audit", &self.audit.is_some())
            .field("passes", &self.passes)
            .finish()
    }
}

impl SharedResourceGate {
    /// Create a gate from configuration.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self {
            affinity: AffinityCache::new(config.affinity_capacity),
            config,
            audit: None,
            passes: 0,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Affinity cache, read-only.
    #[must_use]
    pub const fn affinity(&self) -> &AffinityCache {
        &self.affinity
    }

    /// Affinity cache, for maintenance when the catalog changes.
    pub fn affinity_mut(&mut self) -> &mut AffinityCache {
        &mut self.affinity
    }

    /// Events held by the attached audit sink, empty without one.
    #[must_use]
    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit.as_ref().map(|a| a.events()).unwrap_or_default()
    }

    /// Number of passes run so far.
    #[must_use]
    pub const fn passes(&self) -> u64 {
        self.passes
    }

    /// Run one admission pass.
    ///
    /// `resources` is the effective catalog with overrides already applied,
    /// `running` the snapshot of current holders and `queue` the candidates
    /// in queue order. Returns one outcome per candidate, in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::InvariantViolation`] if an admission
    /// would leave two holders on the same value or exceed a quota. The pass
    /// is abandoned; no partial outcomes are returned.
    pub fn run_pass(
        &mut self,
        resources: &ResourceMap,
        running: &[Holder],
        queue: &[Holder],
    ) -> Result<Vec<PassOutcome>, SharedResourceError> {
        self.passes += 1;
        let pass_id = format!("pass-{}", self.passes);
        let span = tracing::debug_span!("admission_pass", pass = %pass_id, running = running.len(), queued = queue.len());
        let _guard = span.enter();

        let mut taken = TakenLocks::index(
            running.iter().map(|h| (h.id, h.locks.as_slice())),
            resources,
        );
        let mut pending = PendingWriters::new();
        let mut outcomes = Vec::with_capacity(queue.len());

        for candidate in queue {
            let locks = dedup_by_name(&candidate.locks);
            let result = {
                let checker = AdmissionChecker::new(resources);
                let checker = if self.config.writer_preference {
                    checker.with_pending_writers(&pending)
                } else {
                    checker
                };
                checker.check(candidate.id, &locks, &taken)
            };

            let outcome = match result {
                AdmitResult::Admit => {
                    let assigned = self.grant(candidate, &locks, resources, &mut taken)?;
                    tracing::info!(holder = candidate.id, locks = assigned.len(), "candidate admitted");
                    PassOutcome {
                        holder: candidate.id,
                        result: AdmitResult::Admit,
                        assigned,
                    }
                }
                AdmitResult::Reject(rejection) => {
                    if rejection.reason.is_transient() {
                        tracing::debug!(
                            holder = candidate.id,
                            resource = %rejection.resource,
                            reason = %rejection,
                            "candidate waits"
                        );
                    } else {
                        tracing::warn!(
                            holder = candidate.id,
                            resource = %rejection.resource,
                            reason = %rejection,
                            "candidate blocked by resource configuration"
                        );
                    }
                    if self.config.writer_preference {
                        record_pending_writers(&mut pending, candidate.id, &locks, resources, &taken);
                    }
                    PassOutcome {
                        holder: candidate.id,
                        result: AdmitResult::Reject(rejection),
                        assigned: Vec::new(),
                    }
                }
            };
            self.record_audit(&pass_id, &outcome);
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    fn grant(
        &mut self,
        candidate: &Holder,
        locks: &[Lock],
        resources: &ResourceMap,
        taken: &mut TakenLocks,
    ) -> Result<Vec<Lock>, SharedResourceError> {
        let mut assigned = Vec::with_capacity(locks.len());
        let mut allocator = ValueAllocator::new(&mut self.affinity);
        for lock in locks {
            let Some(resource) = resources.get(lock.name()) else {
                return Err(SharedResourceError::InvariantViolation {
                    resource: lock.name().to_string(),
                    detail: "admitted lock has no resource".to_string(),
                });
            };
            let granted = allocator.allocate(
                lock,
                resource,
                taken.get(resource.name()),
                candidate.affinity.as_deref(),
            )?;
            taken.add(candidate.id, &granted, resource);
            if let Some(entry) = taken.get(resource.name()) {
                entry.check_admitted(candidate.id)?;
            }
            assigned.push(granted);
        }
        Ok(assigned)
    }

    fn record_audit(&mut self, pass_id: &str, outcome: &PassOutcome) {
        let Some(sink) = self.audit.as_mut() else {
            return;
        };
        let event = match &outcome.result {
            AdmitResult::Admit => {
                let payload = outcome
                    .assigned
                    .iter()
                    .map(|l| match l.value() {
                        Some(v) => format!("{l}={v}"),
                        None => l.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                build_audit_event(pass_id, outcome.holder, "admit", None, Some(payload))
            }
            AdmitResult::Reject(rejection) => build_audit_event(
                pass_id,
                outcome.holder,
                "reject",
                Some(rejection.resource.clone()),
                Some(rejection.to_string()),
            ),
        };
        sink.record(event);
    }
}

/// Locks with repeated names removed; the first declaration wins.
fn dedup_by_name(locks: &[Lock]) -> Vec<Lock> {
    let mut seen = HashSet::new();
    locks
        .iter()
        .filter(|lock| seen.insert(*lock))
        .cloned()
        .collect()
}

/// Mark `holder` as a waiting writer on every quoted resource where one of
/// its exclusive locks is refused by current holders or the quota. Locks on
/// resources that are free do not mark anything, whatever blocked the
/// candidate as a whole.
fn record_pending_writers(
    pending: &mut PendingWriters,
    holder: HolderId,
    locks: &[Lock],
    resources: &ResourceMap,
    taken: &TakenLocks,
) {
    let checker = AdmissionChecker::new(resources);
    for lock in locks.iter().filter(|l| l.kind().is_exclusive()) {
        let Some(Resource::Quoted(quoted)) = resources.get(lock.name()) else {
            continue;
        };
        if let Err(rejection) = checker.check_lock(holder, lock, taken) {
            if matches!(
                rejection.reason,
                RejectReason::LockConflict | RejectReason::QuotaExhausted
            ) {
                pending.record(&quoted.name, holder);
            }
        }
    }
}
