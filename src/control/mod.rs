//! Array Control Plane
//!
//! The remote API of a storage array as seen by the session manager. Reads
//! report a missing object as `None`; every other failure is a `RemoteError`.

mod http;
pub mod memory;

pub use http::HttpControlPlane;
pub use memory::{Call, MemoryControlPlane, Operation};

use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;
use crate::session::{
    ClusterIdentity, MetroPreference, ReplicationSession, ResourceKind, ResourceSummary,
};

/// Attributes a `modify` call may change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModify {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MetroPreference>,
}

/// Remote operations exposed by an array
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    /// Identity of the array this client talks to
    async fn cluster_identity(&self) -> RemoteResult<ClusterIdentity>;

    async fn get_session(&self, session_id: &str) -> RemoteResult<Option<ReplicationSession>>;

    /// All sessions protecting a resource, one per remote system
    async fn get_sessions_by_resource(
        &self,
        resource_id: &str,
    ) -> RemoteResult<Vec<ReplicationSession>>;

    async fn get_resource(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> RemoteResult<Option<ResourceSummary>>;

    /// Resources of a kind carrying `name`, optionally scoped to a NAS server id
    async fn find_resources(
        &self,
        kind: ResourceKind,
        name: &str,
        nas_server_id: Option<&str>,
    ) -> RemoteResult<Vec<ResourceSummary>>;

    async fn pause(&self, session_id: &str) -> RemoteResult<()>;

    async fn sync(&self, session_id: &str) -> RemoteResult<()>;

    async fn resume(&self, session_id: &str) -> RemoteResult<()>;

    async fn failover(&self, session_id: &str) -> RemoteResult<()>;

    async fn modify(&self, session_id: &str, changes: &SessionModify) -> RemoteResult<()>;
}
