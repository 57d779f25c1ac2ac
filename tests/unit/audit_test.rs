//! Tests for audit sink

use shared_resources::core::{build_audit_event, AuditSink, InMemoryAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event("pass-1", 7, "admit", None, Some("db(read)=0".to_string()));

    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0], event);
    assert_eq!(events[0].holder, 7);
    assert_eq!(events[0].action, "admit");
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event("pass-1", 1, "admit", None, None));
    sink.record(build_audit_event("pass-1", 2, "admit", None, None));
    sink.record(build_audit_event("pass-1", 3, "reject", Some("db".to_string()), None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].holder, 2); // First one popped
    assert_eq!(events[1].holder, 3);
}

#[test]
fn test_zero_sized_sink_keeps_nothing() {
    let mut sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("pass-1", 1, "admit", None, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_build_audit_event() {
    let event = build_audit_event(
        "pass-3",
        42,
        "reject",
        Some("env".to_string()),
        Some("no free value".to_string()),
    );

    assert_eq!(event.pass_id, "pass-3");
    assert_eq!(event.holder, 42);
    assert_eq!(event.action, "reject");
    assert_eq!(event.resource, Some("env".to_string()));
    assert_eq!(event.payload, Some("no free value".to_string()));
    assert_eq!(event.event_id.len(), 36);
    assert!(event.created_at_ms > 0);
}
