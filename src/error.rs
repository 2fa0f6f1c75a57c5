//! WolfRepl Error Types

use std::fmt;
use thiserror::Error;

use crate::engine::Action;
use crate::session::{MetroPreference, SessionRole, SessionState, TargetState};

/// Result type alias for WolfRepl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for raw control plane calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Failure reported by (or while talking to) the array control plane
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("array returned HTTP {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("array request failed: {0}")]
    Transport(String),

    #[error("array request timed out: {0}")]
    Timeout(String),

    #[error("unexpected array response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Check if the array reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Api { status: 404, .. })
    }

    /// Check if a later attempt could succeed without operator action
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(_) | RemoteError::Timeout(_) => true,
            RemoteError::Api { status, .. } => *status == 503 || *status == 429,
            RemoteError::Decode(_) => false,
        }
    }
}

/// Why a requested transition has no legal action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalReason {
    /// The action exists but must be issued from the other side of the pairing
    RoleAsymmetric { required: SessionRole },
    /// No action exists; the session has to pass through another state first
    StateAsymmetric { via: SessionState },
}

impl fmt::Display for IllegalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllegalReason::RoleAsymmetric { required } => {
                write!(f, "this transition must be initiated from the {} role", required)
            }
            IllegalReason::StateAsymmetric { via } => {
                write!(f, "no direct transition exists, move the session to {} first", via)
            }
        }
    }
}

/// WolfRepl error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Lookup errors
    #[error("Replication session not found: {0}")]
    NotFound(String),

    #[error("Ambiguous lookup: {0}")]
    Ambiguous(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Transition errors
    #[error("Replication session {session_id} is {state}; retry once the array leaves this state")]
    TransitionLocked {
        session_id: String,
        state: SessionState,
    },

    #[error("Cannot move replication session {session_id} from {from} to {to}: {reason}")]
    IllegalTransition {
        session_id: String,
        from: SessionState,
        to: TargetState,
        reason: IllegalReason,
    },

    #[error("{action} failed for replication session {session_id}: {source}")]
    RemoteAction {
        action: Action,
        session_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("Role change to {preference} failed for replication session {session_id} (lifecycle applied: {lifecycle_applied}): {source}")]
    RoleModify {
        session_id: String,
        preference: MetroPreference,
        lifecycle_applied: bool,
        #[source]
        source: RemoteError,
    },

    #[error("{change} was applied to replication session {session_id} but re-reading it failed: {source}")]
    RefreshAfterChange {
        change: String,
        session_id: String,
        #[source]
        source: RemoteError,
    },

    // Control plane read errors
    #[error("Array error: {0}")]
    Remote(#[from] RemoteError),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Ambiguous(_) => "AMBIGUOUS",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::TransitionLocked { .. } => "TRANSITION_LOCKED",
            Error::IllegalTransition {
                reason: IllegalReason::RoleAsymmetric { .. },
                ..
            } => "ROLE_REQUIRED",
            Error::IllegalTransition {
                reason: IllegalReason::StateAsymmetric { .. },
                ..
            } => "NO_DIRECT_TRANSITION",
            Error::RemoteAction { .. } => "REMOTE_ACTION_FAILED",
            Error::RoleModify { .. } => "ROLE_MODIFY_FAILED",
            Error::RefreshAfterChange { .. } => "REFRESH_FAILED",
            Error::Remote(_) => "ARRAY_ERROR",
            Error::Network(_) | Error::Io(_) | Error::Json(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error was decided before any mutating call was issued
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::Ambiguous(_)
                | Error::InvalidRequest(_)
                | Error::TransitionLocked { .. }
                | Error::IllegalTransition { .. }
        )
    }

    /// Check if the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TransitionLocked { .. } => true,
            Error::RemoteAction { source, .. }
            | Error::RoleModify { source, .. }
            | Error::RefreshAfterChange { source, .. } => source.is_retryable(),
            Error::Remote(e) => e.is_retryable(),
            _ => false,
        }
    }
}
