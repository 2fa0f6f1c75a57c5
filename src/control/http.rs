//! HTTP Control Plane
//!
//! REST client for the array management API. Lookups use the array's
//! filter syntax (`field=eq.value`) and listings are paged with
//! `offset`/`limit` until a short page comes back.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use super::{ControlPlane, SessionModify};
use crate::config::ArrayConfig;
use crate::error::{Error, RemoteError, RemoteResult, Result};
use crate::session::{ClusterIdentity, ReplicationSession, ResourceKind, ResourceSummary};

/// Fields requested for every session read
const SESSION_FIELDS: &str = "id,state,role,preference,type,resource_type,local_resource_id,\
remote_resource_id,remote_system_id,last_sync_timestamp,progress_percentage";

/// Array error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    messages: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message_l10n: String,
}

/// Control plane client speaking the array REST API
pub struct HttpControlPlane {
    client: reqwest::Client,
    api_root: String,
    user: String,
    password: String,
    page_size: usize,
}

impl HttpControlPlane {
    /// Create a client from the array configuration
    pub fn new(config: &ArrayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_root: config.api_root(),
            user: config.user.clone(),
            password: config.password.clone(),
            page_size: config.page_size.max(1),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.api_root, path))
            .basic_auth(&self.user, Some(&self.password))
    }

    /// Send a request, turning non-success statuses into `RemoteError::Api`
    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        let response = builder
            .header("X-Request-ID", &request_id)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        tracing::debug!(
            "Array {} {} -> {} (request {})",
            response.url().path(),
            response.url().query().unwrap_or(""),
            status.as_u16(),
            request_id
        );

        if status.is_success() {
            Ok(response)
        } else {
            Err(api_error(response).await)
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(format!("{}: {}", path, e)))
    }

    /// GET that maps 404 to `None`
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<Option<T>> {
        match self.get_json(path, query).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET a listing page by page until the array returns a short page
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, String)],
    ) -> RemoteResult<Vec<T>> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut query = filters.to_vec();
            query.push(("offset", offset.to_string()));
            query.push(("limit", self.page_size.to_string()));

            let page: Vec<T> = self.get_json(path, &query).await?;
            let count = page.len();
            items.extend(page);
            if count < self.page_size {
                break;
            }
            offset += count;
        }

        Ok(items)
    }

    async fn post_action(&self, session_id: &str, action: &str) -> RemoteResult<()> {
        let path = format!("replication_session/{}/{}", session_id, action);
        self.send(self.request(Method::POST, &path).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }
}

fn resource_fields(kind: ResourceKind) -> String {
    match kind {
        ResourceKind::FileSystem => "id,name,nas_server_id".to_string(),
        _ => "id,name".to_string(),
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(e.to_string())
    } else {
        RemoteError::Transport(e.to_string())
    }
}

async fn api_error(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let first = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.messages.into_iter().next());

    match first {
        Some(m) => RemoteError::Api {
            status,
            code: m.code,
            message: m.message_l10n,
        },
        None => RemoteError::Api {
            status,
            code: String::new(),
            message: body,
        },
    }
}

#[async_trait::async_trait]
impl ControlPlane for HttpControlPlane {
    async fn cluster_identity(&self) -> RemoteResult<ClusterIdentity> {
        let clusters: Vec<ClusterIdentity> = self
            .get_json("cluster", &[("select", "id,name".to_string())])
            .await?;
        clusters
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Decode("cluster listing is empty".to_string()))
    }

    async fn get_session(&self, session_id: &str) -> RemoteResult<Option<ReplicationSession>> {
        self.get_optional(
            &format!("replication_session/{}", session_id),
            &[("select", SESSION_FIELDS.to_string())],
        )
        .await
    }

    async fn get_sessions_by_resource(
        &self,
        resource_id: &str,
    ) -> RemoteResult<Vec<ReplicationSession>> {
        self.get_paged(
            "replication_session",
            &[
                ("local_resource_id", format!("eq.{}", resource_id)),
                ("select", SESSION_FIELDS.to_string()),
            ],
        )
        .await
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> RemoteResult<Option<ResourceSummary>> {
        self.get_optional(
            &format!("{}/{}", kind.collection(), resource_id),
            &[("select", resource_fields(kind))],
        )
        .await
    }

    async fn find_resources(
        &self,
        kind: ResourceKind,
        name: &str,
        nas_server_id: Option<&str>,
    ) -> RemoteResult<Vec<ResourceSummary>> {
        let mut query = vec![
            ("name", format!("eq.{}", name)),
            ("select", resource_fields(kind)),
        ];
        if let Some(nas) = nas_server_id {
            query.push(("nas_server_id", format!("eq.{}", nas)));
        }
        self.get_paged(kind.collection(), &query).await
    }

    async fn pause(&self, session_id: &str) -> RemoteResult<()> {
        self.post_action(session_id, "pause").await
    }

    async fn sync(&self, session_id: &str) -> RemoteResult<()> {
        self.post_action(session_id, "sync").await
    }

    async fn resume(&self, session_id: &str) -> RemoteResult<()> {
        self.post_action(session_id, "resume").await
    }

    async fn failover(&self, session_id: &str) -> RemoteResult<()> {
        self.post_action(session_id, "failover").await
    }

    async fn modify(&self, session_id: &str, changes: &SessionModify) -> RemoteResult<()> {
        let path = format!("replication_session/{}", session_id);
        self.send(self.request(Method::PATCH, &path).json(changes))
            .await?;
        Ok(())
    }
}
