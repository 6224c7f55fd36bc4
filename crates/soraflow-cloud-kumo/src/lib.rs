//! Kumo Cloud provider for soraflow
//!
//! Implements the soraflow resource lifecycle against Kumo Cloud's v2 REST
//! API: compute servers (asynchronous create/resize/delete with status
//! convergence, volume attachments materialized through the paginated
//! listing) and security-group rules (identity-less sub-resources matched
//! by canonical field values).
//!
//! ```text
//! KumoProvider
//!   ├── servers()              → Lifecycle<ServerOps>
//!   └── security_group_rules() → Lifecycle<SecurityGroupRuleOps>
//!                 │
//!                 ▼
//!              KumoApi (reqwest, Bearer auth, {code,message} envelope)
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod provider;
pub mod security_group;
pub mod server;

// Re-exports
pub use api::{ApiRule, CreateServerRequest, KumoApi, ServerDetail, ServerSummary, VolumeAttachment};
pub use config::KumoConfig;
pub use error::{KumoError, Result};
pub use provider::KumoProvider;
pub use security_group::SecurityGroupRuleOps;
pub use server::{Server, ServerOps, ServerPatch, ServerSpec};
