//! In-Memory Control Plane
//!
//! An array held in memory. Records every call it receives and can be told to
//! fail the next call of a given operation, which makes it the fixture for
//! exercising the locator, engine and API without a real array.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{ControlPlane, SessionModify};
use crate::error::{RemoteError, RemoteResult};
use crate::session::{
    ClusterIdentity, ReplicationSession, ResourceKind, ResourceSummary, SessionState,
};

/// Control plane operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ClusterIdentity,
    GetSession,
    GetSessionsByResource,
    GetResource,
    FindResources,
    Pause,
    Sync,
    Resume,
    Failover,
    Modify,
}

impl Operation {
    /// Check if the operation changes array state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::Pause
                | Operation::Sync
                | Operation::Resume
                | Operation::Failover
                | Operation::Modify
        )
    }
}

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    /// Session id, resource id or name the call addressed
    pub target: String,
}

#[derive(Default)]
struct Inner {
    sessions: Vec<ReplicationSession>,
    resources: Vec<(ResourceKind, ResourceSummary)>,
    calls: Vec<Call>,
    failures: HashMap<Operation, RemoteError>,
    removals: HashMap<Operation, String>,
}

/// In-memory array
pub struct MemoryControlPlane {
    identity: ClusterIdentity,
    inner: RwLock<Inner>,
}

impl MemoryControlPlane {
    /// Create an empty array with the given identity
    pub fn new(cluster_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            identity: ClusterIdentity {
                id: cluster_id.into(),
                name: cluster_name.into(),
            },
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Add or replace a session
    pub async fn insert_session(&self, session: ReplicationSession) {
        let mut inner = self.inner.write().await;
        inner.sessions.retain(|s| s.id != session.id);
        inner.sessions.push(session);
    }

    /// Add a resource
    pub async fn insert_resource(&self, kind: ResourceKind, resource: ResourceSummary) {
        self.inner.write().await.resources.push((kind, resource));
    }

    /// Set a session's state the way the array would on its own
    pub async fn set_state(&self, session_id: &str, state: SessionState) {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == session_id) {
            session.state = state;
        }
    }

    /// Fail the next call of `operation` with `error`
    pub async fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.inner.write().await.failures.insert(operation, error);
    }

    /// Delete a session right after the next successful `operation`, the
    /// way a concurrent delete on the array would
    pub async fn remove_after(&self, operation: Operation, session_id: &str) {
        self.inner
            .write()
            .await
            .removals
            .insert(operation, session_id.to_string());
    }

    /// All calls received so far
    pub async fn calls(&self) -> Vec<Call> {
        self.inner.read().await.calls.clone()
    }

    /// Calls that changed (or tried to change) array state
    pub async fn mutating_calls(&self) -> Vec<Call> {
        self.inner
            .read()
            .await
            .calls
            .iter()
            .filter(|c| c.operation.is_mutating())
            .cloned()
            .collect()
    }

    /// Record a call and consume an injected failure for it
    async fn record(&self, operation: Operation, target: &str) -> RemoteResult<()> {
        let mut inner = self.inner.write().await;
        inner.calls.push(Call {
            operation,
            target: target.to_string(),
        });
        match inner.failures.remove(&operation) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Record a mutating call and apply its effect to the session
    async fn act<F>(&self, operation: Operation, session_id: &str, f: F) -> RemoteResult<()>
    where
        F: FnOnce(&mut ReplicationSession),
    {
        self.record(operation, session_id).await?;

        let mut inner = self.inner.write().await;
        match inner.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => f(session),
            None => return Err(not_found(session_id)),
        }
        if let Some(id) = inner.removals.remove(&operation) {
            inner.sessions.retain(|s| s.id != id);
        }
        Ok(())
    }
}

fn not_found(id: &str) -> RemoteError {
    RemoteError::Api {
        status: 404,
        code: "0xE04040010005".to_string(),
        message: format!("The specified object {} does not exist", id),
    }
}

#[async_trait::async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn cluster_identity(&self) -> RemoteResult<ClusterIdentity> {
        self.record(Operation::ClusterIdentity, &self.identity.id).await?;
        Ok(self.identity.clone())
    }

    async fn get_session(&self, session_id: &str) -> RemoteResult<Option<ReplicationSession>> {
        self.record(Operation::GetSession, session_id).await?;
        let inner = self.inner.read().await;
        Ok(inner.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn get_sessions_by_resource(
        &self,
        resource_id: &str,
    ) -> RemoteResult<Vec<ReplicationSession>> {
        self.record(Operation::GetSessionsByResource, resource_id).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .filter(|s| s.local_resource_id == resource_id)
            .cloned()
            .collect())
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> RemoteResult<Option<ResourceSummary>> {
        self.record(Operation::GetResource, resource_id).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .resources
            .iter()
            .find(|(k, r)| *k == kind && r.id == resource_id)
            .map(|(_, r)| r.clone()))
    }

    async fn find_resources(
        &self,
        kind: ResourceKind,
        name: &str,
        nas_server_id: Option<&str>,
    ) -> RemoteResult<Vec<ResourceSummary>> {
        self.record(Operation::FindResources, name).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .resources
            .iter()
            .filter(|(k, r)| *k == kind && r.name == name)
            .filter(|(_, r)| match nas_server_id {
                Some(nas) => r.nas_server_id.as_deref() == Some(nas),
                None => true,
            })
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn pause(&self, session_id: &str) -> RemoteResult<()> {
        self.act(Operation::Pause, session_id, |s| s.state = SessionState::Paused)
            .await
    }

    async fn sync(&self, session_id: &str) -> RemoteResult<()> {
        self.act(Operation::Sync, session_id, |s| s.state = SessionState::Synchronizing)
            .await
    }

    async fn resume(&self, session_id: &str) -> RemoteResult<()> {
        self.act(Operation::Resume, session_id, |s| s.state = SessionState::Synchronizing)
            .await
    }

    async fn failover(&self, session_id: &str) -> RemoteResult<()> {
        self.act(Operation::Failover, session_id, |s| s.state = SessionState::FailedOver)
            .await
    }

    async fn modify(&self, session_id: &str, changes: &SessionModify) -> RemoteResult<()> {
        let role = changes.role;
        self.act(Operation::Modify, session_id, |s| {
            if role.is_some() {
                s.preference = role;
            }
        })
        .await
    }
}
