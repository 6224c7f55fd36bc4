//! Kumo Cloud API client
//!
//! Thin typed wrapper over the v2 REST API. Bearer token authentication,
//! JSON bodies, and the standard `{code, message, requestId}` error
//! envelope on non-2xx responses. Every method is one remote call
//! returning the raw [`ApiError`] — retry classification and pagination
//! walking happen in the resource layer on top.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use soraflow_engine::{ApiError, Page, PageCursor};

use crate::config::KumoConfig;

/// Kumo Cloud API client
pub struct KumoApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl KumoApi {
    pub fn new(config: &KumoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
        }
    }

    /// Create a server. Asynchronous: the response carries the new id and
    /// an initial pending status.
    pub async fn create_server(
        &self,
        request: &CreateServerRequest,
    ) -> Result<CreateServerResponse, ApiError> {
        let url = format!("{}/v2/servers", self.base_url);
        tracing::debug!(name = %request.name, flavor = %request.flavor, "creating server");
        self.execute(self.client.post(&url).json(request)).await
    }

    /// Fetch one server's detail
    pub async fn get_server(&self, id: &str) -> Result<ServerDetail, ApiError> {
        let url = format!("{}/v2/servers/{}", self.base_url, id);
        self.execute(self.client.get(&url)).await
    }

    /// List one page of servers
    pub async fn list_servers(&self, cursor: &PageCursor) -> Result<Page<ServerSummary>, ApiError> {
        let url = format!("{}/v2/servers", self.base_url);
        let response: ListResponse<ServerSummary> = self
            .execute(self.client.get(&url).query(&page_query(cursor)))
            .await?;
        Ok(response.into_page())
    }

    /// List one page of a server's volume attachments
    pub async fn list_server_volumes(
        &self,
        id: &str,
        cursor: &PageCursor,
    ) -> Result<Page<VolumeAttachment>, ApiError> {
        let url = format!("{}/v2/servers/{}/volumes", self.base_url, id);
        let response: ListResponse<VolumeAttachment> = self
            .execute(self.client.get(&url).query(&page_query(cursor)))
            .await?;
        Ok(response.into_page())
    }

    /// Rename a server (synchronous)
    pub async fn update_server_name(&self, id: &str, name: &str) -> Result<(), ApiError> {
        let url = format!("{}/v2/servers/{}/name", self.base_url, id);
        self.execute_empty(self.client.put(&url).json(&NamePayload { name })).await
    }

    /// Change a server's description (synchronous)
    pub async fn update_server_description(
        &self,
        id: &str,
        description: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/v2/servers/{}/description", self.base_url, id);
        self.execute_empty(
            self.client
                .put(&url)
                .json(&DescriptionPayload { description }),
        )
        .await
    }

    /// Resize a server. Asynchronous: the server passes through Resizing.
    pub async fn resize_server(&self, id: &str, flavor: &str) -> Result<(), ApiError> {
        let url = format!("{}/v2/servers/{}/flavor", self.base_url, id);
        self.execute_empty(self.client.put(&url).json(&FlavorPayload { flavor })).await
    }

    /// Delete a server. Asynchronous: the server passes through Deleting,
    /// then the detail endpoint starts returning 404.
    pub async fn delete_server(&self, id: &str) -> Result<(), ApiError> {
        let url = format!("{}/v2/servers/{}", self.base_url, id);
        self.execute_empty(self.client.delete(&url)).await
    }

    /// List one page of a security group's rules
    pub async fn list_security_group_rules(
        &self,
        group_id: &str,
        cursor: &PageCursor,
    ) -> Result<Page<ApiRule>, ApiError> {
        let url = format!("{}/v2/security-groups/{}/rules", self.base_url, group_id);
        let response: ListResponse<ApiRule> = self
            .execute(self.client.get(&url).query(&page_query(cursor)))
            .await?;
        Ok(response.into_page())
    }

    /// Authorize a rule on a security group (synchronous; the API assigns
    /// the rule no id of its own)
    pub async fn authorize_rule(&self, group_id: &str, rule: &ApiRule) -> Result<(), ApiError> {
        let url = format!("{}/v2/security-groups/{}/rules", self.base_url, group_id);
        tracing::debug!(group_id, direction = %rule.direction, "authorizing rule");
        self.execute_empty(self.client.post(&url).json(rule)).await
    }

    /// Revoke a rule from a security group, addressed by its field values
    pub async fn revoke_rule(&self, group_id: &str, rule: &ApiRule) -> Result<(), ApiError> {
        let url = format!("{}/v2/security-groups/{}/rules", self.base_url, group_id);
        tracing::debug!(group_id, direction = %rule.direction, "revoking rule");
        self.execute_empty(self.client.delete(&url).json(rule)).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(decode_error(status, response).await);
        }
        response.json::<T>().await.map_err(transport_error)
    }

    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(decode_error(status, response).await);
        }
        Ok(())
    }
}

/// Transport-level failures carry no provider code; "RequestFailed" lets
/// the retry policy classify them alongside the documented transient codes.
fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::new("RequestFailed", err.to_string())
}

async fn decode_error(status: reqwest::StatusCode, response: reqwest::Response) -> ApiError {
    match response.json::<ErrorBody>().await {
        Ok(body) => {
            let err = ApiError::new(body.code, body.message).with_status(status.as_u16());
            match body.request_id {
                Some(request_id) => err.with_request_id(request_id),
                None => err,
            }
        }
        Err(_) => ApiError::new(
            "UnexpectedResponse",
            format!("HTTP {status} with an undecodable error body"),
        )
        .with_status(status.as_u16()),
    }
}

fn page_query(cursor: &PageCursor) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if !cursor.marker.is_empty() {
        query.push(("marker", cursor.marker.clone()));
    }
    if let Some(max_keys) = cursor.max_keys {
        query.push(("maxKeys", max_keys.to_string()));
    }
    query
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default)]
    items: Vec<T>,
    #[serde(default)]
    next_marker: String,
    #[serde(default)]
    max_keys: Option<i64>,
    #[serde(default)]
    is_truncated: bool,
}

impl<T> ListResponse<T> {
    fn into_page(self) -> Page<T> {
        Page {
            items: self.items,
            next_marker: self.next_marker,
            max_keys: self.max_keys,
            is_truncated: self.is_truncated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerRequest {
    pub name: String,
    pub flavor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerResponse {
    pub server_id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetail {
    pub id: String,
    pub name: String,
    pub status: String,
    pub flavor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub internal_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAttachment {
    pub volume_id: String,
    pub device: String,
    #[serde(default)]
    pub size_gb: Option<i64>,
}

/// Wire shape of one security-group rule. The API echoes unspecified
/// fields back as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRule {
    pub direction: String,
    #[serde(default)]
    pub ether_type: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub port_range: String,
    #[serde(default)]
    pub source_ip: String,
    #[serde(default)]
    pub source_group_id: String,
    #[serde(default)]
    pub dest_ip: String,
    #[serde(default)]
    pub dest_group_id: String,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Serialize)]
struct NamePayload<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct DescriptionPayload<'a> {
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct FlavorPayload<'a> {
    flavor: &'a str,
}
