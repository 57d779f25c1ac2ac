//! Core admission abstractions: taken-lock index, admission checks, value
//! allocation and the admission pass.

pub mod admission;
pub mod allocator;
pub mod audit;
pub mod error;
pub mod gate;
pub mod report;
pub mod taken;

pub use admission::{can_admit, AdmissionChecker, AdmitResult, PendingWriters, RejectReason, Rejection};
pub use allocator::{AffinityCache, ValueAllocator};
pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, SharedResourceError};
pub use gate::{Holder, PassOutcome, SharedResourceGate};
pub use report::{UsageReport, UsedLock};
pub use taken::{TakenLock, TakenLocks};
