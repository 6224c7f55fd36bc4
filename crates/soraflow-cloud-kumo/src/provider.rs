//! Kumo Cloud provider facade

use std::sync::Arc;
use std::time::Duration;

use soraflow_cloud::{Lifecycle, LifecycleConfig};
use soraflow_engine::{Backoff, RetryPolicy};

use crate::api::KumoApi;
use crate::config::KumoConfig;
use crate::error::Result;
use crate::security_group::SecurityGroupRuleOps;
use crate::server::ServerOps;

/// Error codes Kumo documents as safe to retry, plus the client-side
/// code transport failures map to.
const TRANSIENT_CODES: [&str; 4] = [
    "InternalError",
    "ServiceUnavailable",
    "RequestTimeout",
    "RequestFailed",
];

/// Kumo Cloud provider
///
/// Owns one API client and hands out configured lifecycles per resource
/// type. The client is passed explicitly into each resource's operations —
/// there is no package-level session state.
pub struct KumoProvider {
    api: Arc<KumoApi>,
    retry: RetryPolicy,
}

impl KumoProvider {
    pub fn new(config: KumoConfig) -> Self {
        let api = Arc::new(KumoApi::new(&config));
        let retry = RetryPolicy::new(TRANSIENT_CODES, Duration::from_secs(180))
            .with_backoff(Backoff::exponential(
                Duration::from_secs(1),
                Duration::from_secs(30),
            ));
        Self { api, retry }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(KumoConfig::from_env()?))
    }

    /// Lifecycle for compute servers
    pub fn servers(&self) -> Lifecycle<ServerOps> {
        Lifecycle::new(
            ServerOps::new(Arc::clone(&self.api), self.retry.clone()),
            self.lifecycle_config(),
        )
    }

    /// Lifecycle for security-group rules
    pub fn security_group_rules(&self) -> Lifecycle<SecurityGroupRuleOps> {
        Lifecycle::new(
            SecurityGroupRuleOps::new(Arc::clone(&self.api), self.retry.clone()),
            self.lifecycle_config(),
        )
    }

    fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            retry: self.retry.clone(),
            poll: Backoff::fixed(Duration::from_secs(5)),
            create_timeout: Duration::from_secs(600),
            update_timeout: Duration::from_secs(600),
            delete_timeout: Duration::from_secs(600),
        }
    }
}
