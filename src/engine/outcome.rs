//! Result Composer

use serde::{Deserialize, Serialize};

use crate::session::ReplicationSession;

/// What a caller gets back from a session request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// True if any remote mutating call was made
    pub changed: bool,
    pub session: ReplicationSession,
}

impl SessionOutcome {
    /// Merge the final descriptor with the per-step change flags
    pub fn compose(session: ReplicationSession, steps: impl IntoIterator<Item = bool>) -> Self {
        Self {
            changed: steps.into_iter().any(|c| c),
            session,
        }
    }

    pub fn unchanged(session: ReplicationSession) -> Self {
        Self {
            changed: false,
            session,
        }
    }
}
