//! Parser for free-text lock declarations.
//!
//! One declaration per line, in one of three forms:
//!
//! ```text
//! name
//! name(read)
//! name(write)
//! ```
//!
//! Spaces and tabs may surround the keyword and the parentheses of the
//! read/write form. A bare name must be exactly `[A-Za-z0-9_]+`. Keywords are
//! case-sensitive, so `db(Read)` is not a lock. A line that matches neither
//! form yields `None`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::Lock;
use crate::model::LockKind;

static RW_LOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*([A-Za-z0-9_]+)[ \t]*\([ \t]*(read|write)[ \t]*\)[ \t]*$")
        .expect("Invalid read/write lock regex")
});

static SIMPLE_LOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_]+)$").expect("Invalid simple lock regex"));

/// Parse a single declaration line.
#[must_use]
pub fn parse_lock(input: &str) -> Option<Lock> {
    if let Some(caps) = RW_LOCK_REGEX.captures(input) {
        let kind = LockKind::from_keyword(&caps[2])?;
        return Some(Lock::new(&caps[1], kind));
    }
    SIMPLE_LOCK_REGEX
        .captures(input)
        .map(|caps| Lock::simple(&caps[1]))
}

/// A declaration line that did not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLine {
    /// 1-based line number within the block.
    pub line_no: usize,
    /// Original text of the line.
    pub text: String,
}

/// Result of parsing a block of declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLocks {
    /// Parsed locks in declaration order, one per name.
    pub locks: Vec<Lock>,
    /// Lines that were ignored.
    pub invalid: Vec<InvalidLine>,
    /// Names declared more than once; only the first declaration is kept.
    pub duplicates: Vec<String>,
}

/// Parse a multi-line declaration block.
///
/// Blank lines are skipped. Invalid lines are dropped and reported; the
/// caller decides whether they make the configuration invalid.
#[must_use]
pub fn parse_declarations(text: &str) -> ParsedLocks {
    let mut parsed = ParsedLocks::default();
    let mut seen = HashSet::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_lock(line) {
            Some(lock) => {
                if seen.contains(&lock) {
                    parsed.duplicates.push(lock.name().to_string());
                } else {
                    seen.insert(lock.clone());
                    parsed.locks.push(lock);
                }
            }
            None => {
                tracing::debug!(line_no = idx + 1, line, "ignoring invalid lock declaration");
                parsed.invalid.push(InvalidLine {
                    line_no: idx + 1,
                    text: line.to_string(),
                });
            }
        }
    }
    parsed
}
