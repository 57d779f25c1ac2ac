//! Tests for error types

use shared_resources::core::SharedResourceError;

#[test]
fn test_invalid_lock_error() {
    let err = SharedResourceError::InvalidLock("db(Read)".to_string());
    assert_eq!(format!("{}", err), "invalid lock declaration: db(Read)");
}

#[test]
fn test_unknown_project_error() {
    let err = SharedResourceError::UnknownProject("p9".to_string());
    assert_eq!(format!("{}", err), "unknown project: p9");
}

#[test]
fn test_resource_not_found_error() {
    let err = SharedResourceError::ResourceNotFound {
        project: "p1".to_string(),
        name: "db".to_string(),
    };
    assert_eq!(format!("{}", err), "resource `db` not found in project p1");
}

#[test]
fn test_invariant_violation_error() {
    let err = SharedResourceError::InvariantViolation {
        resource: "env".to_string(),
        detail: "value `a` assigned twice (holder 2)".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "invariant violated on resource `env`: value `a` assigned twice (holder 2)"
    );
}

#[test]
fn test_config_error() {
    let err = SharedResourceError::Config("at least one project must be defined".to_string());
    assert_eq!(format!("{}", err), "config invalid: at least one project must be defined");
}
