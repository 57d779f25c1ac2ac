//! Value allocation for admitted locks.
//!
//! Quoted resources with a finite quota hand out slot indices in
//! `[0, quota)`, custom resources hand out one of their values. Both follow
//! the same policy: the value the holder's affinity key held last time if it
//! is free, otherwise the lowest free value (numeric order for slots,
//! lexicographic for custom values). Infinite quotas need no value.

use std::collections::{BTreeSet, HashMap};

use crate::core::{SharedResourceError, TakenLock};
use crate::model::{AffinityKey, Lock, Resource, ResourceId};

#[derive(Debug, Clone, Default)]
struct AffinityEntry {
    values: HashMap<ResourceId, String>,
    last_used: u64,
}

/// Remembers the last value each affinity key held, per resource id.
///
/// Bounded: when a new key would exceed `capacity`, the least recently used
/// key is evicted. Not synchronized; see [`crate::service::SharedGate`] for
/// multi-threaded use.
#[derive(Debug, Clone)]
pub struct AffinityCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<AffinityKey, AffinityEntry>,
}

impl AffinityCache {
    /// Cache holding at most `capacity` keys. Zero disables affinity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::new(),
        }
    }

    /// Value `key` last held on `resource_id`.
    #[must_use]
    pub fn preferred(&self, key: &str, resource_id: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|e| e.values.get(resource_id))
            .map(String::as_str)
    }

    /// Record that `key` now holds `value` on `resource_id`.
    pub fn remember(&mut self, key: &str, resource_id: &str, value: &str) {
        if self.capacity == 0 {
            return;
        }
        self.tick += 1;
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.last_used = self.tick;
        entry
            .values
            .insert(resource_id.to_string(), value.to_string());
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by(|a, b| a.1.last_used.cmp(&b.1.last_used).then_with(|| a.0.cmp(b.0)))
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            tracing::trace!(key = %key, "evicting affinity entry");
            self.entries.remove(&key);
        }
    }

    /// Drop everything remembered for `key`.
    pub fn forget(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry for `resource_id`, e.g. after the resource changed.
    pub fn forget_resource(&mut self, resource_id: &str) {
        for entry in self.entries.values_mut() {
            entry.values.remove(resource_id);
        }
        self.entries.retain(|_, e| !e.values.is_empty());
    }

    /// Keep only keys for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|k, _| keep(k));
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of keys remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of keys.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Assigns concrete values to admitted locks.
#[derive(Debug)]
pub struct ValueAllocator<'c> {
    cache: &'c mut AffinityCache,
}

impl<'c> ValueAllocator<'c> {
    /// Allocator that reads and updates `cache`.
    pub fn new(cache: &'c mut AffinityCache) -> Self {
        Self { cache }
    }

    /// Bind `lock` on `resource` to a value, given the current holders.
    ///
    /// Returns the lock unchanged for infinite quotas.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::InvariantViolation`] when no value is
    /// free; admission must have ruled that out.
    pub fn allocate(
        &mut self,
        lock: &Lock,
        resource: &Resource,
        held: Option<&TakenLock>,
        affinity: Option<&str>,
    ) -> Result<Lock, SharedResourceError> {
        let occupied: BTreeSet<&str> = held.map(TakenLock::occupied_values).unwrap_or_default();
        let preferred = affinity.and_then(|key| self.cache.preferred(key, resource.id()));

        let chosen = match resource {
            Resource::Quoted(quoted) => match quoted.quota.limit() {
                None => return Ok(lock.clone()),
                Some(quota) => {
                    let taken_slots: BTreeSet<u32> = occupied
                        .iter()
                        .filter_map(|v| v.parse::<u32>().ok())
                        .collect();
                    preferred
                        .and_then(|p| p.parse::<u32>().ok())
                        .filter(|slot| *slot < quota && !taken_slots.contains(slot))
                        .or_else(|| (0..quota).find(|slot| !taken_slots.contains(slot)))
                        .map(|slot| slot.to_string())
                }
            },
            Resource::Custom(custom) => match lock.value() {
                Some(requested) => Some(requested.to_string()),
                None => preferred
                    .filter(|p| custom.values.contains(*p) && !occupied.contains(p))
                    .map(str::to_string)
                    .or_else(|| {
                        custom
                            .values
                            .iter()
                            .find(|v| !occupied.contains(v.as_str()))
                            .cloned()
                    }),
            },
        };

        let Some(value) = chosen else {
            return Err(SharedResourceError::InvariantViolation {
                resource: resource.name().to_string(),
                detail: "no free value left after admission".to_string(),
            });
        };

        if let Some(key) = affinity {
            self.cache.remember(key, resource.id(), &value);
        }
        tracing::debug!(
            resource = resource.name(),
            value = %value,
            affinity = affinity.unwrap_or("-"),
            "allocated lock value"
        );
        Ok(lock.clone().with_value(value))
    }
}
