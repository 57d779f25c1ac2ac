//! Typed description of locks and resources.

pub mod lock;
pub mod resource;

pub use lock::{AffinityKey, HolderId, Lock, LockKind};
pub use resource::{
    CustomResource, ProjectId, Quota, QuotedResource, Resource, ResourceId, ResourceMap,
    ResourceType,
};
