//! Admission checks of a candidate's locks against taken locks.
//!
//! A candidate is admitted only if every one of its locks passes. Locks are
//! checked in declaration order and the first failure names the blocking
//! resource. Checks per lock, in order:
//!
//! 1. the resource is defined and enabled;
//! 2. lock kinds are compatible with current holders;
//! 3. a finite quota has a free slot;
//! 4. a custom resource has a free (or the requested) value.
//!
//! On a custom resource the unit of exclusion is a single value and no two
//! holders ever share one, so read and write locks only contend for values.
//! Simple locks stay exclusive on the whole resource name: a held simple lock
//! blocks every request, and a simple request waits for every holder.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::{TakenLock, TakenLocks};
use crate::model::{CustomResource, HolderId, Lock, LockKind, QuotedResource, Resource, ResourceMap};

/// Why a candidate has to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Resource exists but is switched off.
    ResourceDisabled,
    /// No resource with the lock's name is visible to the candidate.
    ResourceUndefined,
    /// Held lock kinds are incompatible with the requested kind.
    LockConflict,
    /// An exclusive request on the resource is already waiting in this pass.
    WritePending,
    /// Every slot of a finite quota is taken.
    QuotaExhausted,
    /// Every value of a custom resource is taken, or the requested value does
    /// not exist.
    NoFreeValue,
    /// The specific value requested is held by someone else.
    ValueOccupied,
}

impl RejectReason {
    /// Short diagnostic text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceDisabled => "resource disabled",
            Self::ResourceUndefined => "resource undefined",
            Self::LockConflict => "lock conflict",
            Self::WritePending => "write pending",
            Self::QuotaExhausted => "quota exhausted",
            Self::NoFreeValue => "no free value",
            Self::ValueOccupied => "value occupied",
        }
    }

    /// Whether waiting for the next pass can help without a configuration
    /// change.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        !matches!(self, Self::ResourceDisabled | Self::ResourceUndefined)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected lock with the resource that blocked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Category of the rejection.
    pub reason: RejectReason,
    /// Name of the blocking resource.
    pub resource: String,
    /// Human-readable detail, e.g. the holders in the way.
    pub detail: Option<String>,
}

impl Rejection {
    fn new(reason: RejectReason, resource: impl Into<String>) -> Self {
        Self {
            reason,
            resource: resource.into(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Wait reason suitable for a queue view.
    #[must_use]
    pub fn wait_reason(&self) -> String {
        format!(
            "waiting for resource `{}` to become available: {self}",
            self.resource
        )
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Outcome of checking one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmitResult {
    /// Every lock can be granted.
    Admit,
    /// The first lock that could not be granted.
    Reject(Rejection),
}

impl AdmitResult {
    /// Whether the candidate may start.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }

    /// Rejection details, if rejected.
    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Admit => None,
            Self::Reject(r) => Some(r),
        }
    }

    /// Reason, if rejected.
    #[must_use]
    pub fn reason(&self) -> Option<RejectReason> {
        self.rejection().map(|r| r.reason)
    }
}

/// Exclusive requests rejected earlier in the current pass, per resource.
///
/// Once a writer is waiting on a quoted resource, later readers in the same
/// pass are turned away so the resource can drain.
#[derive(Debug, Clone, Default)]
pub struct PendingWriters {
    by_resource: BTreeMap<String, BTreeSet<HolderId>>,
}

impl PendingWriters {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `holder` waits for exclusive access to `resource`.
    pub fn record(&mut self, resource: &str, holder: HolderId) {
        self.by_resource
            .entry(resource.to_string())
            .or_default()
            .insert(holder);
    }

    /// Writers waiting on `resource`, other than `holder`.
    #[must_use]
    pub fn others(&self, resource: &str, holder: HolderId) -> Vec<HolderId> {
        self.by_resource
            .get(resource)
            .map(|set| set.iter().copied().filter(|h| *h != holder).collect())
            .unwrap_or_default()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_resource.values().all(BTreeSet::is_empty)
    }
}

/// Decide whether `locks` can all be granted against `taken`.
#[must_use]
pub fn can_admit(locks: &[Lock], taken: &TakenLocks, resources: &ResourceMap) -> AdmitResult {
    AdmissionChecker::new(resources).check(HolderId::MAX, locks, taken)
}

/// Admission checker bound to one resource catalog.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionChecker<'a> {
    resources: &'a ResourceMap,
    pending: Option<&'a PendingWriters>,
}

impl<'a> AdmissionChecker<'a> {
    /// Checker without writer preference.
    #[must_use]
    pub const fn new(resources: &'a ResourceMap) -> Self {
        Self {
            resources,
            pending: None,
        }
    }

    /// Consult `pending` so readers yield to waiting writers.
    #[must_use]
    pub const fn with_pending_writers(mut self, pending: &'a PendingWriters) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Check all of `holder`'s locks; all-or-nothing.
    #[must_use]
    pub fn check(&self, holder: HolderId, locks: &[Lock], taken: &TakenLocks) -> AdmitResult {
        for lock in locks {
            if let Err(rejection) = self.check_lock(holder, lock, taken) {
                return AdmitResult::Reject(rejection);
            }
        }
        AdmitResult::Admit
    }

    /// Check a single lock.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] describing why the lock cannot be granted.
    pub fn check_lock(
        &self,
        holder: HolderId,
        lock: &Lock,
        taken: &TakenLocks,
    ) -> Result<(), Rejection> {
        let Some(resource) = self.resources.get(lock.name()) else {
            return Err(Rejection::new(RejectReason::ResourceUndefined, lock.name()));
        };
        if !resource.is_enabled() {
            return Err(Rejection::new(RejectReason::ResourceDisabled, resource.name()));
        }
        let held = taken.get(resource.name());
        match resource {
            Resource::Quoted(quoted) => self.check_quoted(holder, lock, quoted, held),
            Resource::Custom(custom) => check_custom(lock, custom, held),
        }
    }

    fn check_quoted(
        &self,
        holder: HolderId,
        lock: &Lock,
        resource: &QuotedResource,
        held: Option<&TakenLock>,
    ) -> Result<(), Rejection> {
        if lock.kind() == LockKind::Read {
            if let Some(pending) = self.pending {
                let writers = pending.others(&resource.name, holder);
                if !writers.is_empty() {
                    return Err(Rejection::new(RejectReason::WritePending, &resource.name)
                        .with_detail(format!("write lock requested by {}", describe(&writers))));
                }
            }
        }

        if let Some(held) = held.filter(|h| !h.is_empty()) {
            let compatible = held
                .entries()
                .all(|(_, held_kind, _)| lock.kind().is_compatible_with(held_kind));
            if !compatible {
                return Err(Rejection::new(RejectReason::LockConflict, &resource.name)
                    .with_detail(format!("locked by {}", describe(&held.holders()))));
            }
        }

        if let Some(quota) = resource.quota.limit() {
            let count = held.map_or(0, TakenLock::holder_count);
            if count >= quota as usize {
                let rejection = Rejection::new(RejectReason::QuotaExhausted, &resource.name);
                let detail = if quota == 0 {
                    "has zero quota available".to_string()
                } else {
                    format!("held by {}", describe(&held.map(TakenLock::holders).unwrap_or_default()))
                };
                return Err(rejection.with_detail(detail));
            }
        }
        Ok(())
    }
}

fn check_custom(
    lock: &Lock,
    resource: &CustomResource,
    held: Option<&TakenLock>,
) -> Result<(), Rejection> {
    let count = held.map_or(0, TakenLock::holder_count);
    let occupied = held.map(TakenLock::occupied_values).unwrap_or_default();

    if let Some(held) = held {
        let simple_held = !held.simple_holders().is_empty();
        if simple_held || (lock.kind() == LockKind::Simple && !held.is_empty()) {
            return Err(Rejection::new(RejectReason::LockConflict, &resource.name)
                .with_detail(format!("locked by {}", describe(&held.holders()))));
        }
    }

    if let Some(requested) = lock.value() {
        if !resource.values.contains(requested) {
            return Err(Rejection::new(RejectReason::NoFreeValue, &resource.name)
                .with_detail(format!("value '{requested}' is not defined")));
        }
        if occupied.contains(requested) {
            let mut detail = format!("required value '{requested}' is occupied");
            if let Some(owner) = held.and_then(|h| h.holder_of(requested)) {
                detail.push_str(&format!(" by {owner}"));
            }
            return Err(Rejection::new(RejectReason::ValueOccupied, &resource.name).with_detail(detail));
        }
    }

    let free = resource
        .values
        .iter()
        .filter(|v| !occupied.contains(v.as_str()))
        .count();
    if count >= resource.values.len() || free == 0 {
        return Err(Rejection::new(RejectReason::NoFreeValue, &resource.name).with_detail(format!(
            "all available values are occupied by {}",
            describe(&held.map(TakenLock::holders).unwrap_or_default())
        )));
    }
    Ok(())
}

fn describe(holders: &[HolderId]) -> String {
    if holders.is_empty() {
        return "unknown".to_string();
    }
    holders
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(resources: impl IntoIterator<Item = Resource>) -> ResourceMap {
        resources
            .into_iter()
            .map(|r| (r.name().to_string(), r))
            .collect()
    }

    fn taken_with(resources: &ResourceMap, holders: &[(HolderId, Vec<Lock>)]) -> TakenLocks {
        TakenLocks::index(holders.iter().map(|(h, l)| (*h, l.as_slice())), resources)
    }

    #[test]
    fn test_compatibility_table_on_shared_resource() {
        use LockKind::{Read, Simple, Write};
        let resources = catalog([Resource::infinite("r1", "p", "lock1")]);
        for held in [Simple, Read, Write] {
            for requested in [Simple, Read, Write] {
                let taken = taken_with(&resources, &[(1, vec![Lock::new("lock1", held)])]);
                let result = can_admit(&[Lock::new("lock1", requested)], &taken, &resources);
                if held == Read && requested == Read {
                    assert!(result.is_admitted(), "held={held} requested={requested}");
                } else {
                    assert_eq!(
                        result.reason(),
                        Some(RejectReason::LockConflict),
                        "held={held} requested={requested}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_undefined_and_disabled() {
        let resources = catalog([Resource::quoted("r1", "p", "db", 1).with_enabled(false)]);
        let taken = TakenLocks::new();

        let result = can_admit(&[Lock::read("nope")], &taken, &resources);
        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.reason, RejectReason::ResourceUndefined);
        assert_eq!(rejection.resource, "nope");
        assert!(!rejection.reason.is_transient());

        let result = can_admit(&[Lock::read("db")], &taken, &resources);
        assert_eq!(result.reason(), Some(RejectReason::ResourceDisabled));
    }

    #[test]
    fn test_first_failing_lock_is_reported() {
        let resources = catalog([
            Resource::quoted("r1", "p", "a", 0),
            Resource::quoted("r2", "p", "b", 0),
        ]);
        let result = can_admit(
            &[Lock::read("a"), Lock::read("b")],
            &TakenLocks::new(),
            &resources,
        );
        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.resource, "a");
        assert_eq!(rejection.reason, RejectReason::QuotaExhausted);
        assert_eq!(rejection.to_string(), "quota exhausted (has zero quota available)");
    }

    #[test]
    fn test_quota_counts_all_holders() {
        let resources = catalog([Resource::quoted("r1", "p", "db", 2)]);
        let taken = taken_with(
            &resources,
            &[(1, vec![Lock::read("db")]), (2, vec![Lock::read("db")])],
        );
        let result = can_admit(&[Lock::read("db")], &taken, &resources);
        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.reason, RejectReason::QuotaExhausted);
        assert_eq!(rejection.detail.as_deref(), Some("held by 1, 2"));
        assert_eq!(
            rejection.wait_reason(),
            "waiting for resource `db` to become available: quota exhausted (held by 1, 2)"
        );
    }

    #[test]
    fn test_custom_resource_ignores_kinds_but_not_values() {
        let resources = catalog([Resource::custom("r1", "p", "env", ["a", "b"])]);
        let taken = taken_with(&resources, &[(1, vec![Lock::write("env").with_value("a")])]);
        assert!(can_admit(&[Lock::write("env")], &taken, &resources).is_admitted());

        let taken = taken_with(
            &resources,
            &[
                (1, vec![Lock::write("env").with_value("a")]),
                (2, vec![Lock::read("env").with_value("b")]),
            ],
        );
        let result = can_admit(&[Lock::read("env")], &taken, &resources);
        assert_eq!(result.reason(), Some(RejectReason::NoFreeValue));
    }

    #[test]
    fn test_simple_locks_exclusive_on_custom_resource() {
        use LockKind::{Read, Simple, Write};
        let resources = catalog([Resource::custom("r1", "p", "env", ["a", "b"])]);
        for held in [Simple, Read, Write] {
            for requested in [Simple, Read, Write] {
                let taken = taken_with(&resources, &[(1, vec![Lock::new("env", held).with_value("a")])]);
                let result = can_admit(&[Lock::new("env", requested)], &taken, &resources);
                if held == Simple || requested == Simple {
                    let rejection = result.rejection().unwrap();
                    assert_eq!(
                        rejection.reason,
                        RejectReason::LockConflict,
                        "held={held} requested={requested}"
                    );
                    assert_eq!(rejection.detail.as_deref(), Some("locked by 1"));
                } else {
                    assert!(result.is_admitted(), "held={held} requested={requested}");
                }
            }
        }

        // a simple request on an idle custom resource still gets a value
        let idle = can_admit(&[Lock::simple("env")], &TakenLocks::new(), &resources);
        assert!(idle.is_admitted());
    }

    #[test]
    fn test_custom_unvalued_holders_consume_capacity() {
        let resources = catalog([Resource::custom("r1", "p", "env", ["a", "b"])]);
        let taken = taken_with(
            &resources,
            &[(1, vec![Lock::read("env")]), (2, vec![Lock::read("env")])],
        );
        let result = can_admit(&[Lock::read("env")], &taken, &resources);
        assert_eq!(result.reason(), Some(RejectReason::NoFreeValue));
    }

    #[test]
    fn test_specific_value_requests() {
        let resources = catalog([Resource::custom("r1", "p", "env", ["a", "b"])]);
        let taken = taken_with(&resources, &[(4, vec![Lock::read("env").with_value("a")])]);

        let occupied = can_admit(&[Lock::read("env").with_value("a")], &taken, &resources);
        let rejection = occupied.rejection().unwrap();
        assert_eq!(rejection.reason, RejectReason::ValueOccupied);
        assert_eq!(
            rejection.detail.as_deref(),
            Some("required value 'a' is occupied by 4")
        );

        let missing = can_admit(&[Lock::read("env").with_value("z")], &taken, &resources);
        assert_eq!(missing.reason(), Some(RejectReason::NoFreeValue));

        let free = can_admit(&[Lock::read("env").with_value("b")], &taken, &resources);
        assert!(free.is_admitted());
    }

    #[test]
    fn test_pending_writer_blocks_readers() {
        let resources = catalog([Resource::quoted("r1", "p", "db", 5)]);
        let taken = TakenLocks::new();
        let mut pending = PendingWriters::new();
        pending.record("db", 9);

        let checker = AdmissionChecker::new(&resources).with_pending_writers(&pending);
        let result = checker.check(1, &[Lock::read("db")], &taken);
        assert_eq!(result.reason(), Some(RejectReason::WritePending));

        // the writer itself is not blocked by its own pending entry
        assert!(checker.check(9, &[Lock::write("db")], &taken).is_admitted());
        assert!(!pending.is_empty());
    }
}
