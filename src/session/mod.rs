//! Session Module
//!
//! Replication session descriptors and the locator that finds them.

mod types;
pub mod locator;

pub use types::{
    ClusterIdentity, MetroPreference, ReplicationSession, ResourceKind, ResourceSummary,
    SessionRole, SessionState, SessionType, StateCategory, TargetState,
};
pub use locator::{ResourceRef, SessionLocator, SessionTarget};
