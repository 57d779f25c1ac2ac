//! Audit sink implementations.
//!
//! Records one event per admission decision so "why did this build wait"
//! can be answered after the fact.

use std::collections::VecDeque;

use crate::model::HolderId;
use crate::util::clock::now_ms;

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Pass that produced the event.
    pub pass_id: String,
    /// Candidate the decision is about.
    pub holder: HolderId,
    /// Action taken (admit, reject).
    pub action: String,
    /// Blocking resource for rejections.
    pub resource: Option<String>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context, e.g. assigned locks or the rejection text.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);

    /// Events still held by the sink, oldest first. Sinks that forward
    /// elsewhere keep nothing.
    fn events(&self) -> Vec<AuditEvent> {
        Vec::new()
    }
}

/// In-memory audit sink for testing and dev.
#[derive(Debug)]
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

/// Helper to build an audit event from context. The event id is a fresh v4 uuid.
pub fn build_audit_event(
    pass_id: impl Into<String>,
    holder: HolderId,
    action: impl Into<String>,
    resource: Option<String>,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        pass_id: pass_id.into(),
        holder,
        action: action.into(),
        resource,
        created_at_ms: now_ms(),
        payload,
    }
}
