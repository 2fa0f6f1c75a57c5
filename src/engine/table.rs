//! Transition Table
//!
//! Every `(current state, requested state)` pair the engine accepts, as data.
//! Locked states have no rows; they are rejected before the lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::{SessionRole, SessionState, TargetState};

/// Remote action that realizes a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Pause,
    Sync,
    Resume,
    Failover,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Pause => write!(f, "pause"),
            Action::Sync => write!(f, "sync"),
            Action::Resume => write!(f, "resume"),
            Action::Failover => write!(f, "failover"),
        }
    }
}

/// Roles allowed to issue an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGate {
    Any,
    SourceOnly,
}

impl RoleGate {
    pub fn admits(&self, role: SessionRole) -> bool {
        match self {
            RoleGate::Any => true,
            RoleGate::SourceOnly => role == SessionRole::Source,
        }
    }

    /// Role to name when a caller is turned away
    pub fn required_role(&self) -> SessionRole {
        SessionRole::Source
    }
}

/// Outcome of a table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// Already satisfied
    NoOp,
    Act { action: Action, roles: RoleGate },
    /// No direct action; the session must reach `via` first
    Reject { via: SessionState },
}

use self::Cell::{Act, NoOp, Reject};
use self::RoleGate::{Any, SourceOnly};
use crate::session::SessionState as S;
use crate::session::TargetState as T;

pub const TRANSITIONS: &[(SessionState, TargetState, Cell)] = &[
    (S::Idle, T::Synchronizing, NoOp),
    (S::Idle, T::Paused, Act { action: Action::Pause, roles: Any }),
    (S::Idle, T::FailedOver, Act { action: Action::Failover, roles: Any }),
    (S::Synchronizing, T::Synchronizing, NoOp),
    (S::Synchronizing, T::Paused, Act { action: Action::Pause, roles: Any }),
    (S::Synchronizing, T::FailedOver, Act { action: Action::Failover, roles: Any }),
    (S::Paused, T::Synchronizing, Act { action: Action::Sync, roles: SourceOnly }),
    (S::Paused, T::Paused, NoOp),
    (S::Paused, T::FailedOver, Act { action: Action::Failover, roles: Any }),
    (S::FailingOver, T::Synchronizing, Act { action: Action::Sync, roles: Any }),
    (S::FailingOver, T::Paused, Act { action: Action::Pause, roles: Any }),
    (S::FailingOver, T::FailedOver, NoOp),
    (S::FailedOver, T::Synchronizing, Act { action: Action::Sync, roles: SourceOnly }),
    (S::FailedOver, T::Paused, Reject { via: S::Synchronizing }),
    (S::FailedOver, T::FailedOver, NoOp),
];

/// Find the rule for a pair; `None` for locked states
pub fn lookup(from: SessionState, to: TargetState) -> Option<Cell> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, cell)| *cell)
}
