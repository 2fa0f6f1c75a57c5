//! Transition Engine
//!
//! Decides how a replication session reaches a requested state and drives
//! the single remote action that gets it there. Every rejection is decided
//! before a mutating call is issued.

pub mod table;
mod role;
mod outcome;

pub use table::{Action, Cell, RoleGate};
pub use role::{RoleChange, RoleMutator, RolePlan};
pub use outcome::SessionOutcome;

use crate::context::ClusterContext;
use crate::control::ControlPlane;
use crate::error::{Error, IllegalReason, RemoteError, Result};
use crate::session::{ReplicationSession, SessionState, SessionType, TargetState};

/// What the engine will do for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// The request is already satisfied
    NoChange,
    Invoke(Action),
}

/// Result of driving a lifecycle transition
#[derive(Debug, Clone)]
pub struct Transition {
    /// Descriptor after the action (re-read from the array), or the input
    pub session: ReplicationSession,
    /// Action that was invoked, if any
    pub action: Option<Action>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.action.is_some()
    }
}

/// Decide how `session` reaches `target` without touching the array
pub fn plan(session: &ReplicationSession, target: TargetState) -> Result<Plan> {
    let from = session.state;

    if from.is_locked() {
        return Err(Error::TransitionLocked {
            session_id: session.id.clone(),
            state: from,
        });
    }

    let cell = table::lookup(from, target).ok_or_else(|| {
        Error::InvalidRequest(format!("no transition rule from {} to {}", from, target))
    })?;

    match cell {
        Cell::NoOp => Ok(Plan::NoChange),
        Cell::Reject { via } => Err(Error::IllegalTransition {
            session_id: session.id.clone(),
            from,
            to: target,
            reason: IllegalReason::StateAsymmetric { via },
        }),
        Cell::Act { action, roles } => {
            if !roles.admits(session.role) {
                return Err(Error::IllegalTransition {
                    session_id: session.id.clone(),
                    from,
                    to: target,
                    reason: IllegalReason::RoleAsymmetric {
                        required: roles.required_role(),
                    },
                });
            }
            Ok(Plan::Invoke(session_type_override(
                session.session_type,
                from,
                action,
            )))
        }
    }
}

/// Metro re-establishes a paused pairing with `resume`, not `sync`
fn session_type_override(session_type: SessionType, from: SessionState, action: Action) -> Action {
    match (session_type, from, action) {
        (SessionType::Metro, SessionState::Paused, Action::Sync) => Action::Resume,
        _ => action,
    }
}

/// Re-read a session after the array accepted `change`
pub(crate) async fn refresh(
    control: &dyn ControlPlane,
    session_id: &str,
    change: String,
) -> Result<ReplicationSession> {
    let source = match control.get_session(session_id).await {
        Ok(Some(session)) => return Ok(session),
        Ok(None) => RemoteError::Api {
            status: 404,
            code: String::new(),
            message: format!("session {} is no longer listed", session_id),
        },
        Err(e) => e,
    };

    tracing::warn!(
        "Session {} could not be re-read after {}: {}",
        session_id,
        change,
        source
    );
    Err(Error::RefreshAfterChange {
        change,
        session_id: session_id.to_string(),
        source,
    })
}

/// Drives lifecycle transitions against one array
pub struct TransitionEngine<'a> {
    control: &'a dyn ControlPlane,
    context: &'a ClusterContext,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(control: &'a dyn ControlPlane, context: &'a ClusterContext) -> Self {
        Self { control, context }
    }

    /// Move `session` to `target`, invoking at most one remote action
    pub async fn apply(&self, session: ReplicationSession, target: TargetState) -> Result<Transition> {
        let decided = match plan(&session, target) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    "Rejected {} -> {} for session {} on {}: {}",
                    session.state,
                    target,
                    session.id,
                    self.context.cluster_name,
                    e
                );
                return Err(e);
            }
        };
        self.execute(session, decided).await
    }

    /// Carry out a plan produced by [`plan`]
    pub async fn execute(&self, session: ReplicationSession, plan: Plan) -> Result<Transition> {
        let action = match plan {
            Plan::NoChange => {
                tracing::debug!(
                    "Session {} already {}, nothing to do",
                    session.id,
                    session.state
                );
                return Ok(Transition {
                    session,
                    action: None,
                });
            }
            Plan::Invoke(action) => action,
        };

        tracing::info!(
            "Invoking {} on replication session {} ({}, {} role, {}) via {}",
            action,
            session.id,
            session.state,
            session.role,
            session.session_type,
            self.context.cluster_name
        );

        let id = session.id.as_str();
        let result = match action {
            Action::Pause => self.control.pause(id).await,
            Action::Sync => self.control.sync(id).await,
            Action::Resume => self.control.resume(id).await,
            Action::Failover => self.control.failover(id).await,
        };

        if let Err(source) = result {
            tracing::warn!("{} failed for session {}: {}", action, id, source);
            return Err(Error::RemoteAction {
                action,
                session_id: session.id.clone(),
                source,
            });
        }

        let refreshed = refresh(self.control, id, action.to_string()).await?;

        tracing::info!(
            "Session {} is now {} after {}",
            refreshed.id,
            refreshed.state,
            action
        );

        Ok(Transition {
            session: refreshed,
            action: Some(action),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{MemoryControlPlane, Operation};
    use crate::session::{MetroPreference, ResourceKind, SessionRole};

    fn session(state: SessionState, role: SessionRole) -> ReplicationSession {
        ReplicationSession::new("rs-1", ResourceKind::Volume, "v-1", "remote-b")
            .with_state(state)
            .with_role(role)
    }

    fn context() -> ClusterContext {
        ClusterContext {
            cluster_id: "c-1".into(),
            cluster_name: "array-a".into(),
        }
    }

    async fn array_with(session: ReplicationSession) -> MemoryControlPlane {
        let array = MemoryControlPlane::new("c-1", "array-a");
        array.insert_session(session).await;
        array
    }

    #[test]
    fn test_plan_current_state_is_noop() {
        let stable = [
            SessionState::Synchronizing,
            SessionState::Paused,
            SessionState::FailedOver,
        ];
        for state in stable {
            for role in [SessionRole::Source, SessionRole::Destination] {
                let target = match state {
                    SessionState::Synchronizing => TargetState::Synchronizing,
                    SessionState::Paused => TargetState::Paused,
                    _ => TargetState::FailedOver,
                };
                assert_eq!(plan(&session(state, role), target).unwrap(), Plan::NoChange);
            }
        }
        let converging = session(SessionState::FailingOver, SessionRole::Destination);
        assert_eq!(plan(&converging, TargetState::FailedOver).unwrap(), Plan::NoChange);
        let idle = session(SessionState::Idle, SessionRole::Source);
        assert_eq!(plan(&idle, TargetState::Synchronizing).unwrap(), Plan::NoChange);
    }

    #[test]
    fn test_plan_locked_states_reject_everything() {
        for state in [SessionState::Resuming, SessionState::SystemPaused] {
            for role in [SessionRole::Source, SessionRole::Destination] {
                for target in TargetState::ALL {
                    let err = plan(&session(state, role), target).unwrap_err();
                    assert!(
                        matches!(err, Error::TransitionLocked { state: s, .. } if s == state),
                        "{} -> {}: {:?}",
                        state,
                        target,
                        err
                    );
                }
            }
        }
    }

    #[test]
    fn test_plan_destination_cannot_sync() {
        for state in [SessionState::Paused, SessionState::FailedOver] {
            let err = plan(&session(state, SessionRole::Destination), TargetState::Synchronizing)
                .unwrap_err();
            match err {
                Error::IllegalTransition {
                    reason: IllegalReason::RoleAsymmetric { required },
                    ..
                } => assert_eq!(required, SessionRole::Source),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_plan_metro_resumes() {
        let metro = session(SessionState::Paused, SessionRole::Source).metro(MetroPreference::Preferred);
        assert_eq!(
            plan(&metro, TargetState::Synchronizing).unwrap(),
            Plan::Invoke(Action::Resume)
        );

        // Only the paused cell changes
        let failed = session(SessionState::FailedOver, SessionRole::Source).metro(MetroPreference::Preferred);
        assert_eq!(
            plan(&failed, TargetState::Synchronizing).unwrap(),
            Plan::Invoke(Action::Sync)
        );

        let metro_dest = session(SessionState::Paused, SessionRole::Destination)
            .metro(MetroPreference::NonPreferred);
        assert!(plan(&metro_dest, TargetState::Synchronizing).is_err());
    }

    #[test]
    fn test_plan_failover_from_either_role() {
        for role in [SessionRole::Source, SessionRole::Destination] {
            for state in [SessionState::Idle, SessionState::Synchronizing, SessionState::Paused] {
                assert_eq!(
                    plan(&session(state, role), TargetState::FailedOver).unwrap(),
                    Plan::Invoke(Action::Failover)
                );
            }
        }
    }

    #[tokio::test]
    async fn test_scenario_pause_from_idle() {
        let start = session(SessionState::Idle, SessionRole::Source);
        let array = array_with(start.clone()).await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let transition = engine.apply(start, TargetState::Paused).await.unwrap();
        assert!(transition.changed());
        assert_eq!(transition.action, Some(Action::Pause));
        assert_eq!(transition.session.state, SessionState::Paused);

        let mutating = array.mutating_calls().await;
        assert_eq!(mutating.len(), 1);
        assert_eq!(mutating[0].operation, Operation::Pause);
    }

    #[tokio::test]
    async fn test_scenario_destination_sync_rejected_without_calls() {
        let start = session(SessionState::Paused, SessionRole::Destination);
        let array = array_with(start.clone()).await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let err = engine
            .apply(start, TargetState::Synchronizing)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Source"));
        assert!(array.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_pause_from_failed_over_rejected() {
        let start = session(SessionState::FailedOver, SessionRole::Source);
        let array = array_with(start.clone()).await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let err = engine.apply(start, TargetState::Paused).await.unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalTransition {
                reason: IllegalReason::StateAsymmetric {
                    via: SessionState::Synchronizing
                },
                ..
            }
        ));
        assert!(array.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_pause_while_failing_over() {
        let start = session(SessionState::FailingOver, SessionRole::Source);
        let array = array_with(start.clone()).await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let transition = engine.apply(start, TargetState::Paused).await.unwrap();
        assert!(transition.changed());
        assert_eq!(transition.session.state, SessionState::Paused);
    }

    #[tokio::test]
    async fn test_scenario_resuming_is_locked() {
        for role in [SessionRole::Source, SessionRole::Destination] {
            let start = session(SessionState::Resuming, role);
            let array = array_with(start.clone()).await;
            let ctx = context();
            let engine = TransitionEngine::new(&array, &ctx);

            let err = engine.apply(start, TargetState::Paused).await.unwrap_err();
            assert!(matches!(err, Error::TransitionLocked { .. }));
            assert!(array.calls().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_metro_invokes_resume_not_sync() {
        let start = session(SessionState::Paused, SessionRole::Source).metro(MetroPreference::Preferred);
        let array = array_with(start.clone()).await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        engine.apply(start, TargetState::Synchronizing).await.unwrap();
        let ops: Vec<Operation> = array
            .mutating_calls()
            .await
            .into_iter()
            .map(|c| c.operation)
            .collect();
        assert_eq!(ops, vec![Operation::Resume]);
    }

    #[tokio::test]
    async fn test_noop_issues_no_calls() {
        let start = session(SessionState::Paused, SessionRole::Destination);
        let array = array_with(start.clone()).await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let transition = engine.apply(start.clone(), TargetState::Paused).await.unwrap();
        assert!(!transition.changed());
        assert_eq!(transition.session, start);
        assert!(array.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_surfaced_once() {
        let start = session(SessionState::Synchronizing, SessionRole::Destination);
        let array = array_with(start.clone()).await;
        array
            .fail_next(
                Operation::Failover,
                RemoteError::Api {
                    status: 422,
                    code: "0xE04040030002".into(),
                    message: "Remote system unreachable".into(),
                },
            )
            .await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let err = engine
            .apply(start, TargetState::FailedOver)
            .await
            .unwrap_err();
        match err {
            Error::RemoteAction { action, source, .. } => {
                assert_eq!(action, Action::Failover);
                assert!(source.to_string().contains("Remote system unreachable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // No retry and no re-read after the failure
        let calls = array.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, Operation::Failover);
    }

    #[test]
    fn test_synchronous_paused_uses_sync() {
        let sync = session(SessionState::Paused, SessionRole::Source).with_type(SessionType::Synchronous);
        assert_eq!(
            plan(&sync, TargetState::Synchronizing).unwrap(),
            Plan::Invoke(Action::Sync)
        );
    }

    #[tokio::test]
    async fn test_synchronous_session_invokes_sync() {
        let start = session(SessionState::Paused, SessionRole::Source).with_type(SessionType::Synchronous);
        let array = array_with(start.clone()).await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let transition = engine.apply(start, TargetState::Synchronizing).await.unwrap();
        assert_eq!(transition.action, Some(Action::Sync));
        assert_eq!(transition.session.state, SessionState::Synchronizing);
    }

    #[tokio::test]
    async fn test_failed_reread_reports_applied_action() {
        let start = session(SessionState::Idle, SessionRole::Source);
        let array = array_with(start.clone()).await;
        array
            .fail_next(Operation::GetSession, RemoteError::Transport("reset".into()))
            .await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let err = engine.apply(start, TargetState::Paused).await.unwrap_err();
        match &err {
            Error::RefreshAfterChange { change, source, .. } => {
                assert_eq!(change, "pause");
                assert_eq!(*source, RemoteError::Transport("reset".into()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_rejection());
        assert_eq!(err.code(), "REFRESH_FAILED");

        let mutating = array.mutating_calls().await;
        assert_eq!(mutating.len(), 1);
        assert_eq!(mutating[0].operation, Operation::Pause);
        let stored = array.get_session("rs-1").await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Paused);
    }

    #[tokio::test]
    async fn test_session_gone_after_action_is_not_a_lookup_failure() {
        let start = session(SessionState::Synchronizing, SessionRole::Source);
        let array = array_with(start.clone()).await;
        array.remove_after(Operation::Failover, "rs-1").await;
        let ctx = context();
        let engine = TransitionEngine::new(&array, &ctx);

        let err = engine.apply(start, TargetState::FailedOver).await.unwrap_err();
        match &err {
            Error::RefreshAfterChange { change, source, .. } => {
                assert_eq!(change, "failover");
                assert!(source.is_not_found());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_rejection());
    }
}
