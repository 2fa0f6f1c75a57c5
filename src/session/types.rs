//! Replication Session Types
//!
//! Descriptors as the array reports them. Enum variants serialize to the
//! array's wire names so descriptors round-trip through the REST API untouched.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a replication session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// In sync, not actively transferring
    #[serde(rename = "OK")]
    Idle,
    /// Transferring data to the destination
    Synchronizing,
    /// Transfer stopped by an operator
    Paused,
    /// Failover in progress; may still be steered by a new request
    #[serde(rename = "Failing_Over")]
    FailingOver,
    /// Destination promoted, coordinated replication halted
    #[serde(rename = "Failed_Over")]
    FailedOver,
    /// Array is re-establishing the pairing; no requests accepted
    Resuming,
    /// Paused by the array itself; no requests accepted
    #[serde(rename = "System_Paused")]
    SystemPaused,
}

/// Category of a lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCategory {
    Stable,
    Steerable,
    Locked,
}

impl SessionState {
    /// All states, in the order the array documents them
    pub const ALL: [SessionState; 7] = [
        SessionState::Idle,
        SessionState::Synchronizing,
        SessionState::Paused,
        SessionState::FailingOver,
        SessionState::FailedOver,
        SessionState::Resuming,
        SessionState::SystemPaused,
    ];

    /// Array wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "OK",
            SessionState::Synchronizing => "Synchronizing",
            SessionState::Paused => "Paused",
            SessionState::FailingOver => "Failing_Over",
            SessionState::FailedOver => "Failed_Over",
            SessionState::Resuming => "Resuming",
            SessionState::SystemPaused => "System_Paused",
        }
    }

    pub fn category(&self) -> StateCategory {
        match self {
            SessionState::Idle
            | SessionState::Synchronizing
            | SessionState::Paused
            | SessionState::FailedOver => StateCategory::Stable,
            SessionState::FailingOver => StateCategory::Steerable,
            SessionState::Resuming | SessionState::SystemPaused => StateCategory::Locked,
        }
    }

    /// Check if the array refuses every request while in this state
    pub fn is_locked(&self) -> bool {
        self.category() == StateCategory::Locked
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State a caller may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Synchronizing,
    Paused,
    FailedOver,
}

impl TargetState {
    pub const ALL: [TargetState; 3] = [
        TargetState::Synchronizing,
        TargetState::Paused,
        TargetState::FailedOver,
    ];

    /// The lifecycle state that satisfies this target
    pub fn as_state(&self) -> SessionState {
        match self {
            TargetState::Synchronizing => SessionState::Synchronizing,
            TargetState::Paused => SessionState::Paused,
            TargetState::FailedOver => SessionState::FailedOver,
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_state().as_str())
    }
}

impl FromStr for TargetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synchronizing" | "sync" => Ok(TargetState::Synchronizing),
            "paused" | "pause" => Ok(TargetState::Paused),
            "failed_over" | "failedover" | "failover" => Ok(TargetState::FailedOver),
            other => Err(format!(
                "unknown session state '{}' (expected synchronizing, paused or failed_over)",
                other
            )),
        }
    }
}

/// Role of the local array with respect to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionRole {
    Source,
    Destination,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Source => write!(f, "Source"),
            SessionRole::Destination => write!(f, "Destination"),
        }
    }
}

/// Preferred side of a Metro session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetroPreference {
    #[serde(rename = "Metro_Preferred")]
    Preferred,
    #[serde(rename = "Metro_Non_Preferred")]
    NonPreferred,
}

impl fmt::Display for MetroPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetroPreference::Preferred => write!(f, "Metro_Preferred"),
            MetroPreference::NonPreferred => write!(f, "Metro_Non_Preferred"),
        }
    }
}

impl FromStr for MetroPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metro_preferred" | "preferred" => Ok(MetroPreference::Preferred),
            "metro_non_preferred" | "non_preferred" => Ok(MetroPreference::NonPreferred),
            other => Err(format!(
                "unknown role '{}' (expected Metro_Preferred or Metro_Non_Preferred)",
                other
            )),
        }
    }
}

/// Replication mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    Asynchronous,
    Synchronous,
    /// Active-active; resumes instead of resyncing
    Metro,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Asynchronous => write!(f, "Asynchronous"),
            SessionType::Synchronous => write!(f, "Synchronous"),
            SessionType::Metro => write!(f, "Metro"),
        }
    }
}

/// Kind of resource a session protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Volume,
    VolumeGroup,
    FileSystem,
    NasServer,
}

impl ResourceKind {
    /// REST collection name
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Volume => "volume",
            ResourceKind::VolumeGroup => "volume_group",
            ResourceKind::FileSystem => "file_system",
            ResourceKind::NasServer => "nas_server",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Volume => write!(f, "volume"),
            ResourceKind::VolumeGroup => write!(f, "volume group"),
            ResourceKind::FileSystem => write!(f, "file system"),
            ResourceKind::NasServer => write!(f, "NAS server"),
        }
    }
}

/// Replication session descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationSession {
    /// Identifier shared by both arrays' views of the pairing
    pub id: String,
    pub state: SessionState,
    pub role: SessionRole,
    /// Only present on Metro sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<MetroPreference>,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub resource_type: ResourceKind,
    pub local_resource_id: String,
    #[serde(default)]
    pub remote_resource_id: Option<String>,
    pub remote_system_id: String,
    #[serde(default)]
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress_percentage: Option<u8>,
}

impl ReplicationSession {
    /// Create an idle asynchronous source-side session
    pub fn new(
        id: impl Into<String>,
        resource_type: ResourceKind,
        local_resource_id: impl Into<String>,
        remote_system_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Idle,
            role: SessionRole::Source,
            preference: None,
            session_type: SessionType::Asynchronous,
            resource_type,
            local_resource_id: local_resource_id.into(),
            remote_resource_id: None,
            remote_system_id: remote_system_id.into(),
            last_sync_timestamp: None,
            progress_percentage: None,
        }
    }

    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_role(mut self, role: SessionRole) -> Self {
        self.role = role;
        self
    }

    /// Mark as Metro with the given preference
    pub fn metro(mut self, preference: MetroPreference) -> Self {
        self.session_type = SessionType::Metro;
        self.preference = Some(preference);
        self
    }

    pub fn with_type(mut self, session_type: SessionType) -> Self {
        self.session_type = session_type;
        self
    }

    pub fn is_metro(&self) -> bool {
        self.session_type == SessionType::Metro
    }
}

/// A storage object as returned by the array's lookup endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: String,
    pub name: String,
    /// Owning NAS server, for file systems
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nas_server_id: Option<String>,
}

/// Identity of the array being driven
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_categories() {
        let locked: Vec<_> = SessionState::ALL.iter().filter(|s| s.is_locked()).collect();
        assert_eq!(locked, vec![&SessionState::Resuming, &SessionState::SystemPaused]);
        assert_eq!(SessionState::FailingOver.category(), StateCategory::Steerable);
        assert_eq!(SessionState::Idle.category(), StateCategory::Stable);
    }

    #[test]
    fn test_descriptor_from_array_json() {
        let json = r#"{
            "id": "b05b5108-26b6-4567-a1d8-1c7795b2e6bc",
            "state": "Failing_Over",
            "role": "Destination",
            "preference": "Metro_Non_Preferred",
            "type": "Metro",
            "resource_type": "volume_group",
            "local_resource_id": "634e4b95-e7bd-49e7-957b-6dc932642464",
            "remote_system_id": "b5f62edd-f6e3-4ea4-bd59-8cd9f4d01ca5",
            "last_sync_timestamp": "2024-03-01T10:15:00Z"
        }"#;

        let session: ReplicationSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.state, SessionState::FailingOver);
        assert_eq!(session.role, SessionRole::Destination);
        assert_eq!(session.preference, Some(MetroPreference::NonPreferred));
        assert!(session.is_metro());
        assert_eq!(session.resource_type, ResourceKind::VolumeGroup);
        assert!(session.last_sync_timestamp.is_some());
        assert!(session.remote_resource_id.is_none());
    }

    #[test]
    fn test_idle_wire_name() {
        let session: ReplicationSession = serde_json::from_str(
            r#"{"id":"s","state":"OK","role":"Source","type":"Asynchronous",
                "resource_type":"volume","local_resource_id":"v","remote_system_id":"r"}"#,
        )
        .unwrap();
        assert_eq!(session.state, SessionState::Idle);
        assert_eq!(serde_json::to_value(session.state).unwrap(), "OK");
    }

    #[test]
    fn test_parse_target_and_preference() {
        assert_eq!("Paused".parse::<TargetState>().unwrap(), TargetState::Paused);
        assert_eq!("failed_over".parse::<TargetState>().unwrap(), TargetState::FailedOver);
        assert!("idle".parse::<TargetState>().is_err());
        assert_eq!(
            "Metro_Preferred".parse::<MetroPreference>().unwrap(),
            MetroPreference::Preferred
        );
        assert!("source".parse::<MetroPreference>().is_err());
    }
}
