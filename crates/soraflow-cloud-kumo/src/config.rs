//! Kumo Cloud provider configuration

use crate::error::{KumoError, Result};

/// Configuration for the Kumo Cloud API
#[derive(Debug, Clone)]
pub struct KumoConfig {
    /// API key used as the Bearer token
    pub api_key: String,

    /// Region whose public endpoint is targeted (e.g. "jp1")
    pub region: String,

    /// Endpoint override. Defaults to the public endpoint for `region`.
    pub endpoint: Option<String>,
}

impl KumoConfig {
    pub fn new(api_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            region: region.into(),
            endpoint: None,
        }
    }

    /// Create KumoConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("KUMO_API_KEY")
            .map_err(|_| KumoError::MissingEnvVar("KUMO_API_KEY".to_string()))?;
        let region = std::env::var("KUMO_REGION")
            .map_err(|_| KumoError::MissingEnvVar("KUMO_REGION".to_string()))?;
        let endpoint = std::env::var("KUMO_ENDPOINT").ok();

        if region.is_empty() && endpoint.is_none() {
            return Err(KumoError::InvalidConfig(
                "KUMO_REGION must not be empty unless KUMO_ENDPOINT is set".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            region,
            endpoint,
        })
    }

    /// Resolved base URL for API requests
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.api.kumocloud.jp", self.region),
        }
    }
}
