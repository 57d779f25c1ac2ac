//! Per-resource index of locks held by running and already-admitted holders.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::SharedResourceError;
use crate::model::{HolderId, Lock, LockKind, Resource, ResourceMap};

/// All holders of one resource, split by lock kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakenLock {
    resource: Resource,
    read_holders: BTreeMap<HolderId, Option<String>>,
    write_holders: BTreeMap<HolderId, Option<String>>,
    simple_holders: BTreeMap<HolderId, Option<String>>,
}

impl TakenLock {
    /// Empty entry for `resource`.
    #[must_use]
    pub const fn new(resource: Resource) -> Self {
        Self {
            resource,
            read_holders: BTreeMap::new(),
            write_holders: BTreeMap::new(),
            simple_holders: BTreeMap::new(),
        }
    }

    /// Record that `holder` holds `lock`. A holder appears under one kind only.
    pub fn add(&mut self, holder: HolderId, lock: &Lock) {
        self.remove(holder);
        let value = lock.value().map(str::to_string);
        match lock.kind() {
            LockKind::Read => self.read_holders.insert(holder, value),
            LockKind::Write => self.write_holders.insert(holder, value),
            LockKind::Simple => self.simple_holders.insert(holder, value),
        };
    }

    /// Drop whatever `holder` holds on this resource.
    pub fn remove(&mut self, holder: HolderId) {
        self.read_holders.remove(&holder);
        self.write_holders.remove(&holder);
        self.simple_holders.remove(&holder);
    }

    /// Resource this entry belongs to.
    #[must_use]
    pub const fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Shared holders and their values.
    #[must_use]
    pub const fn read_holders(&self) -> &BTreeMap<HolderId, Option<String>> {
        &self.read_holders
    }

    /// Exclusive holders and their values.
    #[must_use]
    pub const fn write_holders(&self) -> &BTreeMap<HolderId, Option<String>> {
        &self.write_holders
    }

    /// Legacy simple-lock holders and their values.
    #[must_use]
    pub const fn simple_holders(&self) -> &BTreeMap<HolderId, Option<String>> {
        &self.simple_holders
    }

    /// Number of holders regardless of kind.
    #[must_use]
    pub fn holder_count(&self) -> usize {
        self.read_holders.len() + self.write_holders.len() + self.simple_holders.len()
    }

    /// Whether nobody holds the resource.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holder_count() == 0
    }

    /// Whether any holder uses an exclusive kind.
    #[must_use]
    pub fn has_exclusive(&self) -> bool {
        !self.write_holders.is_empty() || !self.simple_holders.is_empty()
    }

    /// Whether `holder` holds this resource.
    #[must_use]
    pub fn is_held_by(&self, holder: HolderId) -> bool {
        self.read_holders.contains_key(&holder)
            || self.write_holders.contains_key(&holder)
            || self.simple_holders.contains_key(&holder)
    }

    /// All holders with their kind and value, ordered by holder id.
    pub fn entries(&self) -> impl Iterator<Item = (HolderId, LockKind, Option<&str>)> + '_ {
        let mut all: Vec<_> = self
            .read_holders
            .iter()
            .map(|(h, v)| (*h, LockKind::Read, v.as_deref()))
            .chain(
                self.write_holders
                    .iter()
                    .map(|(h, v)| (*h, LockKind::Write, v.as_deref())),
            )
            .chain(
                self.simple_holders
                    .iter()
                    .map(|(h, v)| (*h, LockKind::Simple, v.as_deref())),
            )
            .collect();
        all.sort_by_key(|(h, _, _)| *h);
        all.into_iter()
    }

    /// Sorted holder ids.
    #[must_use]
    pub fn holders(&self) -> Vec<HolderId> {
        self.entries().map(|(h, _, _)| h).collect()
    }

    /// Values currently assigned to holders.
    #[must_use]
    pub fn occupied_values(&self) -> BTreeSet<&str> {
        self.entries().filter_map(|(_, _, v)| v).collect()
    }

    /// Holder that owns `value`, if any.
    #[must_use]
    pub fn holder_of(&self, value: &str) -> Option<HolderId> {
        self.entries()
            .find(|(_, _, v)| *v == Some(value))
            .map(|(h, _, _)| h)
    }

    /// Verify the quota and distinct-value invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::InvariantViolation`] when the holders
    /// exceed a finite capacity or two holders share a custom value.
    pub fn check_invariants(&self) -> Result<(), SharedResourceError> {
        let violation = |detail: String| SharedResourceError::InvariantViolation {
            resource: self.resource.name().to_string(),
            detail,
        };
        if let Some(capacity) = self.resource.capacity() {
            if self.holder_count() > capacity {
                return Err(violation(format!(
                    "{} holders exceed capacity {capacity}",
                    self.holder_count()
                )));
            }
        }
        let mut seen = BTreeSet::new();
        for (holder, _, value) in self.entries() {
            if let Some(value) = value {
                if !seen.insert(value) {
                    return Err(violation(format!(
                        "value `{value}` assigned twice (holder {holder})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Verify that a freshly admitted `holder` left the entry consistent:
    /// capacity is respected and its value is not shared with anyone else.
    ///
    /// Unlike [`TakenLock::check_invariants`] this tolerates a snapshot that
    /// was already inconsistent among running holders (for example after a
    /// quota was lowered while builds were running).
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::InvariantViolation`] on a breach.
    pub fn check_admitted(&self, holder: HolderId) -> Result<(), SharedResourceError> {
        let violation = |detail: String| SharedResourceError::InvariantViolation {
            resource: self.resource.name().to_string(),
            detail,
        };
        if let Some(capacity) = self.resource.capacity() {
            if self.holder_count() > capacity {
                return Err(violation(format!(
                    "admitting holder {holder} exceeds capacity {capacity}"
                )));
            }
        }
        let own = self
            .entries()
            .find(|(h, _, _)| *h == holder)
            .and_then(|(_, _, v)| v);
        if let Some(value) = own {
            if let Some(other) = self
                .entries()
                .find(|(h, _, v)| *h != holder && *v == Some(value))
            {
                return Err(violation(format!(
                    "value `{value}` given to holder {holder} is held by {}",
                    other.0
                )));
            }
        }
        Ok(())
    }
}

/// Taken locks of every resource touched in the current pass, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TakenLocks {
    by_resource: HashMap<String, TakenLock>,
}

impl TakenLocks {
    /// Empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from a snapshot of holders.
    ///
    /// Locks naming a resource that is not in `resources` are skipped; the
    /// resource may have been deleted after the holder started.
    pub fn index<'a, I>(holders: I, resources: &ResourceMap) -> Self
    where
        I: IntoIterator<Item = (HolderId, &'a [Lock])>,
    {
        let mut taken = Self::new();
        for (holder, locks) in holders {
            for lock in locks {
                match resources.get(lock.name()) {
                    Some(resource) => taken.add(holder, lock, resource),
                    None => tracing::debug!(
                        holder,
                        lock = lock.name(),
                        "skipping lock on unknown resource"
                    ),
                }
            }
        }
        taken
    }

    /// Record `lock` on `resource` for `holder`.
    pub fn add(&mut self, holder: HolderId, lock: &Lock, resource: &Resource) {
        self.by_resource
            .entry(resource.name().to_string())
            .or_insert_with(|| TakenLock::new(resource.clone()))
            .add(holder, lock);
    }

    /// Entry for a resource name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TakenLock> {
        self.by_resource.get(name)
    }

    /// Number of resources with at least one recorded lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_resource.len()
    }

    /// Whether no locks are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_resource.is_empty()
    }

    /// Iterate entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TakenLock)> {
        self.by_resource.iter().map(|(k, v)| (k.as_str(), v))
    }
}
