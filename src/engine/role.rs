//! Role Mutator
//!
//! Changes which side of a Metro session is preferred. Independent of the
//! lifecycle state; applied after any lifecycle action in the same request.

use crate::context::ClusterContext;
use crate::control::{ControlPlane, SessionModify};
use crate::error::{Error, Result};
use crate::session::{MetroPreference, ReplicationSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePlan {
    NoChange,
    Modify(MetroPreference),
}

/// Result of a role request
#[derive(Debug, Clone)]
pub struct RoleChange {
    pub session: ReplicationSession,
    pub changed: bool,
}

pub struct RoleMutator<'a> {
    control: &'a dyn ControlPlane,
    context: &'a ClusterContext,
}

impl<'a> RoleMutator<'a> {
    pub fn new(control: &'a dyn ControlPlane, context: &'a ClusterContext) -> Self {
        Self { control, context }
    }

    /// Decide whether `requested` needs a modify call
    pub fn plan(session: &ReplicationSession, requested: MetroPreference) -> Result<RolePlan> {
        if !session.is_metro() {
            return Err(Error::InvalidRequest(format!(
                "session {} is {}; only Metro sessions have a preferred side",
                session.id, session.session_type
            )));
        }

        if session.preference == Some(requested) {
            Ok(RolePlan::NoChange)
        } else {
            Ok(RolePlan::Modify(requested))
        }
    }

    /// Apply `requested` to `session`.
    ///
    /// `lifecycle_applied` is carried into the error so a caller can tell a
    /// half-applied request from a clean failure.
    pub async fn apply(
        &self,
        session: ReplicationSession,
        requested: MetroPreference,
        lifecycle_applied: bool,
    ) -> Result<RoleChange> {
        let preference = match Self::plan(&session, requested)? {
            RolePlan::NoChange => {
                return Ok(RoleChange {
                    session,
                    changed: false,
                })
            }
            RolePlan::Modify(p) => p,
        };

        tracing::info!(
            "Changing session {} preference {} -> {} via {}",
            session.id,
            session
                .preference
                .map(|p| p.to_string())
                .unwrap_or_else(|| "none".to_string()),
            preference,
            self.context.cluster_name
        );

        let changes = SessionModify {
            role: Some(preference),
        };
        if let Err(source) = self.control.modify(&session.id, &changes).await {
            tracing::warn!("Role change failed for session {}: {}", session.id, source);
            return Err(Error::RoleModify {
                session_id: session.id.clone(),
                preference,
                lifecycle_applied,
                source,
            });
        }

        let refreshed = super::refresh(
            self.control,
            &session.id,
            format!("role change to {}", preference),
        )
        .await?;

        Ok(RoleChange {
            session: refreshed,
            changed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{MemoryControlPlane, Operation};
    use crate::error::RemoteError;
    use crate::session::ResourceKind;

    fn metro(preference: MetroPreference) -> ReplicationSession {
        ReplicationSession::new("rs-m", ResourceKind::VolumeGroup, "vg-1", "remote-b").metro(preference)
    }

    fn context() -> ClusterContext {
        ClusterContext {
            cluster_id: "c-1".into(),
            cluster_name: "array-a".into(),
        }
    }

    #[test]
    fn test_plan() {
        let session = metro(MetroPreference::Preferred);
        assert_eq!(
            RoleMutator::plan(&session, MetroPreference::Preferred).unwrap(),
            RolePlan::NoChange
        );
        assert_eq!(
            RoleMutator::plan(&session, MetroPreference::NonPreferred).unwrap(),
            RolePlan::Modify(MetroPreference::NonPreferred)
        );

        let plain = ReplicationSession::new("rs-a", ResourceKind::Volume, "v-1", "remote-b");
        assert!(matches!(
            RoleMutator::plan(&plain, MetroPreference::Preferred),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_changes_only_preference() {
        let array = MemoryControlPlane::new("c-1", "array-a");
        array.insert_session(metro(MetroPreference::NonPreferred)).await;
        let ctx = context();
        let mutator = RoleMutator::new(&array, &ctx);

        let change = mutator
            .apply(metro(MetroPreference::NonPreferred), MetroPreference::Preferred, false)
            .await
            .unwrap();
        assert!(change.changed);
        assert_eq!(change.session.preference, Some(MetroPreference::Preferred));
        assert_eq!(array.mutating_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_same_preference_is_noop() {
        let array = MemoryControlPlane::new("c-1", "array-a");
        let ctx = context();
        let mutator = RoleMutator::new(&array, &ctx);

        let change = mutator
            .apply(metro(MetroPreference::Preferred), MetroPreference::Preferred, false)
            .await
            .unwrap();
        assert!(!change.changed);
        assert!(array.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_modify_failure_reports_lifecycle_flag() {
        let array = MemoryControlPlane::new("c-1", "array-a");
        array.insert_session(metro(MetroPreference::Preferred)).await;
        array
            .fail_next(Operation::Modify, RemoteError::Transport("reset".into()))
            .await;
        let ctx = context();
        let mutator = RoleMutator::new(&array, &ctx);

        let err = mutator
            .apply(metro(MetroPreference::Preferred), MetroPreference::NonPreferred, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RoleModify {
                lifecycle_applied: true,
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_failed_reread_after_modify_reports_applied_change() {
        let array = MemoryControlPlane::new("c-1", "array-a");
        array.insert_session(metro(MetroPreference::Preferred)).await;
        array
            .fail_next(Operation::GetSession, RemoteError::Timeout("read".into()))
            .await;
        let ctx = context();
        let mutator = RoleMutator::new(&array, &ctx);

        let err = mutator
            .apply(metro(MetroPreference::Preferred), MetroPreference::NonPreferred, false)
            .await
            .unwrap_err();
        match &err {
            Error::RefreshAfterChange { change, .. } => {
                assert_eq!(change, "role change to Metro_Non_Preferred")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_rejection());

        let stored = array.get_session("rs-m").await.unwrap().unwrap();
        assert_eq!(stored.preference, Some(MetroPreference::NonPreferred));
    }
}
