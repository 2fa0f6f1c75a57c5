//! WolfRepl - Replication Session Manager
//!
//! Drives replication sessions between a pair of storage arrays. A session
//! binds a protected resource (volume, volume group, file system or NAS
//! server) on one array to its replica on the other.
//!
//! # Architecture
//!
//! A request flows through four stages:
//!
//! - the session locator resolves a session id or owning resource to one
//!   session descriptor
//! - the transition engine checks the requested state against the session's
//!   current state, role and type, and picks the remote action
//! - the role mutator changes a Metro session's preferred side
//! - the result composer reports the final descriptor and whether anything
//!   changed
//!
//! All state lives on the array. Each request re-reads it, issues at most one
//! lifecycle action and one role change, and never retries.

pub mod config;
pub mod error;
pub mod session;
pub mod control;
pub mod context;
pub mod engine;
pub mod manager;
pub mod api;

pub use config::WolfReplConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfReplConfig;
    pub use crate::control::{ControlPlane, HttpControlPlane, MemoryControlPlane};
    pub use crate::engine::{Action, SessionOutcome, TransitionEngine};
    pub use crate::error::{Error, RemoteError, Result};
    pub use crate::manager::{SessionManager, SessionRequest};
    pub use crate::session::{
        MetroPreference, ReplicationSession, ResourceKind, ResourceRef, SessionRole,
        SessionState, SessionTarget, TargetState,
    };
}
