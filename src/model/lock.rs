//! Lock declarations and lock kinds.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::SharedResourceError;

/// Identifier of a running or queued job.
pub type HolderId = u64;

/// Stable identity used to keep value assignments across passes
/// (for example a build configuration id).
pub type AffinityKey = String;

/// Kind of access a lock requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Legacy lock without read/write distinction. Exclusive.
    Simple,
    /// Shared lock.
    Read,
    /// Exclusive lock.
    Write,
}

impl LockKind {
    /// Keyword used inside parentheses in a declaration, if any.
    #[must_use]
    pub const fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Simple => None,
            Self::Read => Some("read"),
            Self::Write => Some("write"),
        }
    }

    /// Parses a declaration keyword. Case-sensitive: only `read` and `write`.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }

    /// Name used in persisted usage reports.
    #[must_use]
    pub const fn storage_name(self) -> &'static str {
        match self {
            Self::Simple => "lock",
            Self::Read => "readLock",
            Self::Write => "writeLock",
        }
    }

    /// Inverse of [`LockKind::storage_name`].
    #[must_use]
    pub fn from_storage_name(name: &str) -> Option<Self> {
        match name {
            "lock" => Some(Self::Simple),
            "readLock" => Some(Self::Read),
            "writeLock" => Some(Self::Write),
            _ => None,
        }
    }

    /// Whether a request of this kind may coexist with a lock of kind `held`
    /// on the same unit of exclusion. Only read/read is compatible.
    #[must_use]
    pub const fn is_compatible_with(self, held: Self) -> bool {
        matches!((held, self), (Self::Read, Self::Read))
    }

    /// Whether this kind excludes every other holder.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Simple => "simple",
            Self::Read => "read",
            Self::Write => "write",
        };
        f.write_str(text)
    }
}

/// A named request for access to a shared resource.
///
/// # Identity
///
/// Two locks are equal when their names are equal. `kind` and `value` take no
/// part in equality or hashing, so `name(read)` and `name(write)` are the same
/// lock when collected into a set or used as a map key. Code that needs to
/// distinguish kinds must compare [`Lock::kind`] explicitly.
///
/// `value` is empty until the allocator binds the lock to a slot or custom
/// value. A lock on a custom resource may also carry a requested value before
/// admission, in which case only that value is acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    name: String,
    kind: LockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl Lock {
    /// Create a lock without a value.
    pub fn new(name: impl Into<String>, kind: LockKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
        }
    }

    /// Shorthand for a simple lock.
    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(name, LockKind::Simple)
    }

    /// Shorthand for a read lock.
    pub fn read(name: impl Into<String>) -> Self {
        Self::new(name, LockKind::Read)
    }

    /// Shorthand for a write lock.
    pub fn write(name: impl Into<String>) -> Self {
        Self::new(name, LockKind::Write)
    }

    /// Copy of this lock bound to `value`.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.value = if value.is_empty() { None } else { Some(value) };
        self
    }

    /// Lock name, which is also the name of the resource it targets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested access kind.
    #[must_use]
    pub const fn kind(&self) -> LockKind {
        self.kind
    }

    /// Assigned or requested value.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl PartialEq for Lock {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Lock {}

impl Hash for Lock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Renders the declaration form: `name`, `name(read)` or `name(write)`.
impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.keyword() {
            Some(keyword) => write!(f, "{}({keyword})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for Lock {
    type Err = SharedResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse_lock(s).ok_or_else(|| SharedResourceError::InvalidLock(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    fn hash_of(lock: &Lock) -> u64 {
        let mut hasher = DefaultHasher::new();
        lock.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_identity_is_name_only() {
        let read = Lock::read("x");
        let write = Lock::write("x");
        assert_eq!(read, write);
        assert_eq!(hash_of(&read), hash_of(&write));

        let valued = Lock::read("x").with_value("a");
        assert_eq!(read, valued);
        assert_ne!(Lock::read("x"), Lock::read("y"));
    }

    #[test]
    fn test_set_collapses_kinds() {
        let set: HashSet<Lock> = [Lock::read("db"), Lock::write("db"), Lock::simple("db")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().map(Lock::kind), Some(LockKind::Read));
    }

    #[test]
    fn test_compatibility_table_exhaustive() {
        use LockKind::{Read, Simple, Write};
        let kinds = [Simple, Read, Write];
        for held in kinds {
            for requested in kinds {
                let expected = held == Read && requested == Read;
                assert_eq!(
                    requested.is_compatible_with(held),
                    expected,
                    "held={held} requested={requested}"
                );
            }
        }
    }

    #[test]
    fn test_display_round_trips_through_parser() {
        for lock in [Lock::simple("a_1"), Lock::read("db"), Lock::write("env")] {
            let parsed: Lock = lock.to_string().parse().unwrap();
            assert_eq!(parsed.name(), lock.name());
            assert_eq!(parsed.kind(), lock.kind());
        }
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        let err = "db(Read)".parse::<Lock>().unwrap_err();
        assert_eq!(err.to_string(), "invalid lock declaration: db(Read)");
    }

    #[test]
    fn test_storage_names() {
        for kind in [LockKind::Simple, LockKind::Read, LockKind::Write] {
            assert_eq!(LockKind::from_storage_name(kind.storage_name()), Some(kind));
        }
        assert_eq!(LockKind::from_storage_name("exclusive"), None);
    }

    #[test]
    fn test_empty_value_is_no_value() {
        assert_eq!(Lock::read("x").with_value("").value(), None);
        assert_eq!(Lock::read("x").with_value("1").value(), Some("1"));
    }
}
