//! Resource abstraction for provider implementations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use soraflow_engine::{ApiError, EngineError, StatusSet};

/// Handle to a remote resource, as returned by a create call.
///
/// `id` is either server-assigned or, for id-less sub-resources, derived
/// by the identity codec. `status` is provider-defined and opaque beyond
/// membership tests. Handles live for one operation; the only thing the
/// caller persists between invocations is the id string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: String,
    pub status: String,
}

impl ResourceHandle {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }
}

/// Whether a patch settles immediately or starts an asynchronous
/// transition the lifecycle must wait out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchEffect {
    /// The provider applied the change synchronously
    Immediate,

    /// The provider started a transition; the lifecycle re-runs the waiter
    /// with [`ResourceOps::update_statuses`] before the next patch
    Converging,
}

/// Remote operations for one resource type.
///
/// Implementations own their API client — passed in at construction, never
/// reached through ambient state — and express every result through the
/// typed associated types, so the compiler enforces each call's response
/// shape.
///
/// `create`, `apply_patch` and `delete` are single remote calls returning
/// the raw [`ApiError`]; the lifecycle runs them through the retry
/// classifier. `read` is already a composed fetch (detail call plus any
/// nested listings), so it retries its own constituent calls and returns a
/// classified [`EngineError`].
#[async_trait]
pub trait ResourceOps: Send + Sync {
    /// Desired configuration, as supplied by the caller
    type Spec: Send + Sync;

    /// Fully observed remote state, nested collections included
    type Observed: Send;

    /// One pending field group of an update
    type Patch: Send + Sync;

    /// Resource type name used in operation labels and logs
    fn kind(&self) -> &'static str;

    /// Status sets for create convergence. `None` for resource types whose
    /// create call is synchronous.
    fn create_statuses(&self) -> Option<StatusSet> {
        None
    }

    /// Status sets for the asynchronous transitions an update can start
    fn update_statuses(&self) -> Option<StatusSet> {
        None
    }

    /// Status sets for delete convergence. `None` when deletion is
    /// synchronous.
    fn delete_statuses(&self) -> Option<StatusSet> {
        None
    }

    /// Issue the create call and return the new resource's handle
    async fn create(&self, spec: &Self::Spec) -> Result<ResourceHandle, ApiError>;

    /// Fetch the full remote state, materializing nested collections
    async fn read(&self, id: &str) -> Result<Self::Observed, EngineError>;

    /// Extract the status string from an observed state
    fn status_of(&self, observed: &Self::Observed) -> String;

    /// Field groups whose remote value differs from `spec`, in apply order
    fn diff(&self, spec: &Self::Spec, observed: &Self::Observed) -> Vec<Self::Patch>;

    /// Apply one field group
    async fn apply_patch(&self, id: &str, patch: &Self::Patch) -> Result<PatchEffect, ApiError>;

    /// Issue the delete call
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}
