//! Record of the locks a build actually used.
//!
//! Written once when a build finishes and read back for history views. The
//! line form stores one lock per line as `name<TAB>kind<TAB>value`, with a
//! single space standing in for "no value".

use serde::{Deserialize, Serialize};

use crate::core::SharedResourceError;
use crate::model::{HolderId, Lock, LockKind};

/// One used lock: `(name, kind, assigned value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedLock {
    /// Lock (and resource) name.
    pub name: String,
    /// Access kind.
    pub kind: LockKind,
    /// Slot index or custom value, if any was assigned.
    pub value: Option<String>,
}

impl From<&Lock> for UsedLock {
    fn from(lock: &Lock) -> Self {
        Self {
            name: lock.name().to_string(),
            kind: lock.kind(),
            value: lock.value().map(str::to_string),
        }
    }
}

impl From<&UsedLock> for Lock {
    fn from(used: &UsedLock) -> Self {
        let lock = Self::new(used.name.clone(), used.kind);
        match &used.value {
            Some(v) => lock.with_value(v.clone()),
            None => lock,
        }
    }
}

/// Locks used by one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Holder the report belongs to.
    pub holder: HolderId,
    /// Used locks in assignment order.
    pub locks: Vec<UsedLock>,
}

impl UsageReport {
    /// Report from the locks assigned by an admission pass.
    #[must_use]
    pub fn from_assigned(holder: HolderId, locks: &[Lock]) -> Self {
        Self {
            holder,
            locks: locks.iter().map(UsedLock::from).collect(),
        }
    }

    /// Locks with their values, ready to feed back into a pass as a running
    /// holder.
    #[must_use]
    pub fn to_locks(&self) -> Vec<Lock> {
        self.locks.iter().map(Lock::from).collect()
    }

    /// Tab-separated line form.
    #[must_use]
    pub fn to_lines(&self) -> String {
        self.locks
            .iter()
            .map(|l| {
                format!(
                    "{}\t{}\t{}",
                    l.name,
                    l.kind.storage_name(),
                    l.value.as_deref().unwrap_or(" ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse the line form. Malformed lines are skipped.
    #[must_use]
    pub fn from_lines(holder: HolderId, content: &str) -> Self {
        let mut locks = Vec::new();
        for line in content.lines() {
            match parse_line(line) {
                Some(lock) => locks.push(lock),
                None => tracing::debug!(holder, line, "wrong usage report line format"),
            }
        }
        Self { holder, locks }
    }

    /// JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::Report`] if serialization fails.
    pub fn to_json(&self) -> Result<String, SharedResourceError> {
        serde_json::to_string(self).map_err(|e| SharedResourceError::Report(e.to_string()))
    }

    /// Parse the JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SharedResourceError::Report`] on malformed input.
    pub fn from_json(input: &str) -> Result<Self, SharedResourceError> {
        serde_json::from_str(input).map_err(|e| SharedResourceError::Report(e.to_string()))
    }
}

fn parse_line(line: &str) -> Option<UsedLock> {
    let parts: Vec<&str> = line.split('\t').collect();
    let [name, kind, value] = parts.as_slice() else {
        return None;
    };
    if name.is_empty() {
        return None;
    }
    let kind = LockKind::from_storage_name(kind)?;
    let value = value.trim();
    Some(UsedLock {
        name: (*name).to_string(),
        kind,
        value: (!value.is_empty()).then(|| value.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let report = UsageReport::from_assigned(
            3,
            &[
                Lock::read("db").with_value("1"),
                Lock::write("gate"),
                Lock::simple("legacy"),
            ],
        );
        assert_eq!(
            report.to_lines(),
            "db\treadLock\t1\ngate\twriteLock\t \nlegacy\tlock\t "
        );
        assert_eq!(UsageReport::from_lines(3, &report.to_lines()), report);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let report = UsageReport::from_lines(1, "db\treadLock\t0\nbroken\nx\tshared\t1\n\treadLock\t2");
        assert_eq!(report.locks.len(), 1);
        assert_eq!(report.locks[0].value.as_deref(), Some("0"));
    }

    #[test]
    fn test_json_and_locks() {
        let report = UsageReport::from_assigned(5, &[Lock::write("env").with_value("b")]);
        let back = UsageReport::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(back, report);

        let locks = back.to_locks();
        assert_eq!(locks[0].kind(), LockKind::Write);
        assert_eq!(locks[0].value(), Some("b"));
        assert!(UsageReport::from_json("{").is_err());
    }
}
