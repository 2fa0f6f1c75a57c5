//! Session Manager
//!
//! Runs one caller request end to end: read the array identity, locate the
//! session, decide every step up front, then issue the lifecycle action
//! followed by the role change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ClusterContext;
use crate::control::ControlPlane;
use crate::engine::{self, Plan, RoleMutator, SessionOutcome, TransitionEngine};
use crate::error::{Error, Result};
use crate::session::{
    MetroPreference, ReplicationSession, SessionLocator, SessionTarget, TargetState,
};

/// Caller request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub target: SessionTarget,
    /// Remote system id choosing among several sessions of one resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TargetState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MetroPreference>,
}

impl SessionRequest {
    pub fn new(target: SessionTarget) -> Self {
        Self {
            target,
            remote_system: None,
            state: None,
            role: None,
        }
    }

    pub fn with_state(mut self, state: TargetState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_role(mut self, role: MetroPreference) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_remote_system(mut self, remote_system: impl Into<String>) -> Self {
        self.remote_system = Some(remote_system.into());
        self
    }
}

/// Entry point for session requests against one array
#[derive(Clone)]
pub struct SessionManager {
    control: Arc<dyn ControlPlane>,
}

impl SessionManager {
    pub fn new(control: Arc<dyn ControlPlane>) -> Self {
        Self { control }
    }

    /// Find a session, treating absence as an error
    pub async fn show(
        &self,
        target: &SessionTarget,
        remote_system: Option<&str>,
    ) -> Result<ReplicationSession> {
        let context = ClusterContext::fetch(self.control.as_ref()).await?;
        self.locate(&context, target, remote_system).await
    }

    /// Apply a request and report whether anything changed
    pub async fn apply(&self, request: &SessionRequest) -> Result<SessionOutcome> {
        let control = self.control.as_ref();
        let context = ClusterContext::fetch(control).await?;
        let session = self
            .locate(&context, &request.target, request.remote_system.as_deref())
            .await?;

        // Reject before touching anything
        let lifecycle = match request.state {
            Some(target) => engine::plan(&session, target).map_err(|e| {
                tracing::warn!("Rejected request for {}: {}", request.target, e);
                e
            })?,
            None => Plan::NoChange,
        };
        if let Some(role) = request.role {
            RoleMutator::plan(&session, role)?;
        }

        let transition = TransitionEngine::new(control, &context)
            .execute(session, lifecycle)
            .await?;
        let lifecycle_changed = transition.changed();
        let mut session = transition.session;

        let mut role_changed = false;
        if let Some(role) = request.role {
            let change = RoleMutator::new(control, &context)
                .apply(session, role, lifecycle_changed)
                .await?;
            role_changed = change.changed;
            session = change.session;
        }

        Ok(SessionOutcome::compose(session, [lifecycle_changed, role_changed]))
    }

    async fn locate(
        &self,
        context: &ClusterContext,
        target: &SessionTarget,
        remote_system: Option<&str>,
    ) -> Result<ReplicationSession> {
        SessionLocator::new(self.control.as_ref(), context)
            .locate(target, remote_system)
            .await?
            .ok_or_else(|| Error::NotFound(target.to_string()))
    }
}
