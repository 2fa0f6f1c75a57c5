//! Session Locator
//!
//! Resolves a caller's handle (explicit session id or owning resource) to a
//! single session descriptor. Read-only: only lookup calls are issued.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ReplicationSession, ResourceKind, ResourceSummary};
use crate::context::ClusterContext;
use crate::control::ControlPlane;
use crate::error::{Error, Result};

/// A protected resource named by id or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name_or_id: String,
    /// Owning NAS server (name or id); file systems only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nas_server: Option<String>,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name_or_id: impl Into<String>) -> Self {
        Self {
            kind,
            name_or_id: name_or_id.into(),
            nas_server: None,
        }
    }

    pub fn in_nas_server(mut self, nas_server: impl Into<String>) -> Self {
        self.nas_server = Some(nas_server.into());
        self
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.nas_server {
            Some(nas) => write!(f, "{} {} on NAS server {}", self.kind, self.name_or_id, nas),
            None => write!(f, "{} {}", self.kind, self.name_or_id),
        }
    }
}

/// What a request operates on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTarget {
    SessionId(String),
    Resource(ResourceRef),
}

impl std::fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionTarget::SessionId(id) => write!(f, "session {}", id),
            SessionTarget::Resource(r) => write!(f, "{}", r),
        }
    }
}

/// Resolves targets against one array
pub struct SessionLocator<'a> {
    control: &'a dyn ControlPlane,
    context: &'a ClusterContext,
}

impl<'a> SessionLocator<'a> {
    pub fn new(control: &'a dyn ControlPlane, context: &'a ClusterContext) -> Self {
        Self { control, context }
    }

    /// Find the session for `target`.
    ///
    /// `remote_system` picks one session when a resource is replicated to
    /// several remote systems. Returns `Ok(None)` when nothing matches.
    pub async fn locate(
        &self,
        target: &SessionTarget,
        remote_system: Option<&str>,
    ) -> Result<Option<ReplicationSession>> {
        match target {
            SessionTarget::SessionId(id) => {
                let session = self.control.get_session(id).await?;
                Ok(session.filter(|s| match remote_system {
                    Some(remote) => s.remote_system_id == remote,
                    None => true,
                }))
            }
            SessionTarget::Resource(resource) => {
                let summary = match self.resolve_resource(resource).await? {
                    Some(s) => s,
                    None => {
                        tracing::debug!(
                            "No {} on array {}",
                            resource,
                            self.context.cluster_name
                        );
                        return Ok(None);
                    }
                };

                let sessions = self.control.get_sessions_by_resource(&summary.id).await?;
                self.select(resource, sessions, remote_system)
            }
        }
    }

    /// Resolve a resource handle to the object it names.
    ///
    /// UUID-shaped handles are tried as ids first and fall back to a name
    /// lookup, so an object named like an id is still found.
    pub async fn resolve_resource(&self, resource: &ResourceRef) -> Result<Option<ResourceSummary>> {
        let scope = match &resource.nas_server {
            Some(_) if resource.kind != ResourceKind::FileSystem => {
                return Err(Error::InvalidRequest(format!(
                    "a NAS server scope only applies to file systems, not to {}",
                    resource
                )));
            }
            Some(nas) => match self.resolve_handle(ResourceKind::NasServer, nas, None).await? {
                Some(nas) => Some(nas.id),
                None => return Ok(None),
            },
            None => None,
        };

        self.resolve_handle(resource.kind, &resource.name_or_id, scope.as_deref())
            .await
    }

    async fn resolve_handle(
        &self,
        kind: ResourceKind,
        handle: &str,
        scope: Option<&str>,
    ) -> Result<Option<ResourceSummary>> {
        if Uuid::parse_str(handle).is_ok() {
            if let Some(found) = self.control.get_resource(kind, handle).await? {
                let in_scope = match scope {
                    Some(nas) => found.nas_server_id.as_deref() == Some(nas),
                    None => true,
                };
                if in_scope {
                    return Ok(Some(found));
                }
            }
        }

        let mut matches = self.control.find_resources(kind, handle, scope).await?;

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => Err(Error::Ambiguous(format!(
                "{} {} matches {} objects; use its id instead",
                kind, handle, n
            ))),
        }
    }

    fn select(
        &self,
        resource: &ResourceRef,
        sessions: Vec<ReplicationSession>,
        remote_system: Option<&str>,
    ) -> Result<Option<ReplicationSession>> {
        let mut candidates: Vec<ReplicationSession> = sessions
            .into_iter()
            .filter(|s| match remote_system {
                Some(remote) => s.remote_system_id == remote,
                None => true,
            })
            .collect();

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.pop()),
            n => Err(Error::Ambiguous(format!(
                "{} has {} replication sessions; pass a remote system to choose one",
                resource, n
            ))),
        }
    }
}
