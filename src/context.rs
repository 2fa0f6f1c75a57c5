//! Cluster Context
//!
//! Identity of the array a request is driven against. Fetched once at the
//! start of every request and passed down explicitly.

use serde::Serialize;

use crate::control::ControlPlane;
use crate::error::Result;
use crate::session::ClusterIdentity;

/// Per-request view of the local array
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterContext {
    pub cluster_id: String,
    pub cluster_name: String,
}

impl ClusterContext {
    pub fn new(identity: ClusterIdentity) -> Self {
        Self {
            cluster_id: identity.id,
            cluster_name: identity.name,
        }
    }

    /// Read the identity of the array behind `control`
    pub async fn fetch(control: &dyn ControlPlane) -> Result<Self> {
        let identity = control.cluster_identity().await?;
        tracing::debug!("Driving array {} ({})", identity.name, identity.id);
        Ok(Self::new(identity))
    }
}
