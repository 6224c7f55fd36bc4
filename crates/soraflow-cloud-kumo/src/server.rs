//! Compute server resource

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use soraflow_cloud::{PatchEffect, ResourceHandle, ResourceOps};
use soraflow_engine::{ApiError, EngineError, RetryPolicy, StatusSet, collect_all, with_retry};

use crate::api::{CreateServerRequest, KumoApi, ServerDetail, ServerSummary, VolumeAttachment};

/// Desired configuration for a server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    pub flavor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_id: Option<String>,
}

/// Fully observed server state
#[derive(Debug, Clone)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: String,
    pub flavor: String,
    pub description: String,
    pub internal_ip: Option<String>,
    pub public_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Attached volumes, materialized from the paginated attachment listing
    pub volumes: Vec<VolumeAttachment>,
}

/// One pending field group of a server update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPatch {
    Name(String),
    Description(String),
    /// Resizing is asynchronous; the server passes through Resizing before
    /// settling back into Running
    Flavor(String),
}

/// Server operations against the Kumo API
pub struct ServerOps {
    api: Arc<KumoApi>,
    retry: RetryPolicy,
}

impl ServerOps {
    pub fn new(api: Arc<KumoApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Find a server by name, walking the full listing. The API offers no
    /// name filter, so this is how idempotent "does it exist already"
    /// checks are answered.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<ServerSummary>, EngineError> {
        let op = "list servers";
        let api = &*self.api;
        let retry = &self.retry;
        let servers = collect_all(op, move |cursor| async move {
            with_retry(op, retry, || api.list_servers(&cursor)).await
        })
        .await?;
        Ok(servers.into_iter().find(|server| server.name == name))
    }

    fn assemble(detail: ServerDetail, volumes: Vec<VolumeAttachment>) -> Server {
        Server {
            id: detail.id,
            name: detail.name,
            status: detail.status,
            flavor: detail.flavor,
            description: detail.description,
            internal_ip: detail.internal_ip,
            public_ip: detail.public_ip,
            created_at: detail.created_at,
            volumes,
        }
    }
}

#[async_trait]
impl ResourceOps for ServerOps {
    type Spec = ServerSpec;
    type Observed = Server;
    type Patch = ServerPatch;

    fn kind(&self) -> &'static str {
        "server"
    }

    fn create_statuses(&self) -> Option<StatusSet> {
        Some(StatusSet::new(
            ["Creating", "Starting"],
            ["Running"],
            ["CreateFailed", "Error"],
        ))
    }

    fn update_statuses(&self) -> Option<StatusSet> {
        Some(StatusSet::new(
            ["Resizing"],
            ["Running"],
            ["ResizeFailed", "Error"],
        ))
    }

    fn delete_statuses(&self) -> Option<StatusSet> {
        Some(StatusSet::new(
            ["Running", "Stopping", "Deleting"],
            ["Deleted"],
            Vec::<&str>::new(),
        ))
    }

    async fn create(&self, spec: &ServerSpec) -> Result<ResourceHandle, ApiError> {
        let request = CreateServerRequest {
            name: spec.name.clone(),
            flavor: spec.flavor.clone(),
            description: (!spec.description.is_empty()).then(|| spec.description.clone()),
            image_id: spec.image_id.clone(),
        };
        let created = self.api.create_server(&request).await?;
        Ok(ResourceHandle::new(created.server_id, created.status))
    }

    async fn read(&self, id: &str) -> Result<Server, EngineError> {
        let op = format!("read server {id}");
        let detail = with_retry(&op, &self.retry, || self.api.get_server(id)).await?;

        let list_op = format!("list volumes of server {id}");
        let op = list_op.as_str();
        let api = &*self.api;
        let retry = &self.retry;
        let volumes = collect_all(op, move |cursor| async move {
            with_retry(op, retry, || api.list_server_volumes(id, &cursor)).await
        })
        .await?;

        Ok(Self::assemble(detail, volumes))
    }

    fn status_of(&self, observed: &Server) -> String {
        observed.status.clone()
    }

    fn diff(&self, spec: &ServerSpec, observed: &Server) -> Vec<ServerPatch> {
        let mut patches = Vec::new();
        if spec.name != observed.name {
            patches.push(ServerPatch::Name(spec.name.clone()));
        }
        if spec.description != observed.description {
            patches.push(ServerPatch::Description(spec.description.clone()));
        }
        if spec.flavor != observed.flavor {
            patches.push(ServerPatch::Flavor(spec.flavor.clone()));
        }
        patches
    }

    async fn apply_patch(&self, id: &str, patch: &ServerPatch) -> Result<PatchEffect, ApiError> {
        match patch {
            ServerPatch::Name(name) => {
                self.api.update_server_name(id, name).await?;
                Ok(PatchEffect::Immediate)
            }
            ServerPatch::Description(description) => {
                self.api.update_server_description(id, description).await?;
                Ok(PatchEffect::Immediate)
            }
            ServerPatch::Flavor(flavor) => {
                self.api.resize_server(id, flavor).await?;
                Ok(PatchEffect::Converging)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete_server(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KumoConfig;

    fn ops() -> ServerOps {
        let api = Arc::new(KumoApi::new(&KumoConfig::new("k-test", "jp1")));
        ServerOps::new(api, RetryPolicy::default())
    }

    fn spec() -> ServerSpec {
        ServerSpec {
            name: "web-01".to_string(),
            flavor: "s2.small".to_string(),
            description: "frontend".to_string(),
            image_id: None,
        }
    }

    fn detail() -> ServerDetail {
        ServerDetail {
            id: "srv-001".to_string(),
            name: "web-01".to_string(),
            status: "Running".to_string(),
            flavor: "s2.small".to_string(),
            description: "frontend".to_string(),
            internal_ip: Some("10.0.0.5".to_string()),
            public_ip: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_diff_with_no_drift_is_empty() {
        let observed = ServerOps::assemble(detail(), Vec::new());
        assert!(ops().diff(&spec(), &observed).is_empty());
    }

    #[test]
    fn test_diff_orders_changed_field_groups() {
        let observed = ServerOps::assemble(detail(), Vec::new());
        let wanted = ServerSpec {
            name: "web-02".to_string(),
            flavor: "s2.large".to_string(),
            ..spec()
        };

        let patches = ops().diff(&wanted, &observed);
        assert_eq!(
            patches,
            vec![
                ServerPatch::Name("web-02".to_string()),
                ServerPatch::Flavor("s2.large".to_string()),
            ]
        );
    }

    #[test]
    fn test_assemble_carries_volumes() {
        let volumes = vec![VolumeAttachment {
            volume_id: "vol-1".to_string(),
            device: "/dev/vdb".to_string(),
            size_gb: Some(100),
        }];
        let server = ServerOps::assemble(detail(), volumes);

        assert_eq!(server.id, "srv-001");
        assert_eq!(server.volumes.len(), 1);
        assert_eq!(server.volumes[0].device, "/dev/vdb");
    }
}
