//! Resource lifecycle driver
//!
//! Composes the engine's retry classifier and convergence waiter with a
//! resource type's own operations into the standard flow:
//! create → converge → read, update by field group, delete with absence
//! tolerated.

use std::time::Duration;

use soraflow_engine::retry::{Backoff, RetryPolicy, with_retry};
use soraflow_engine::wait::{Observation, WaitConfig, wait_for_status};
use soraflow_engine::{EngineError, Result};

use crate::resource::{PatchEffect, ResourceOps};

/// Timing and retry parameters for one resource type's lifecycles.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Retry policy for the single-call operations (create, patch, delete)
    pub retry: RetryPolicy,

    /// Sleep schedule between convergence polls
    pub poll: Backoff,

    pub create_timeout: Duration,
    pub update_timeout: Duration,
    pub delete_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll: Backoff::fixed(Duration::from_secs(5)),
            create_timeout: Duration::from_secs(600),
            update_timeout: Duration::from_secs(600),
            delete_timeout: Duration::from_secs(600),
        }
    }
}

/// Drives one resource type through its lifecycle.
///
/// Stateless between calls: every operation is self-contained over its own
/// handle, so concurrent lifecycles of distinct resources are independent
/// call stacks. The driver assumes at most one active lifecycle per
/// resource identity — serializing concurrent operations on the same id is
/// the host orchestrator's job.
pub struct Lifecycle<O: ResourceOps> {
    ops: O,
    config: LifecycleConfig,
}

impl<O: ResourceOps> Lifecycle<O> {
    pub fn new(ops: O, config: LifecycleConfig) -> Self {
        Self { ops, config }
    }

    /// The underlying resource operations
    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Create the resource, wait for it to converge, and return the full
    /// observed state.
    pub async fn create(&self, spec: &O::Spec) -> Result<O::Observed> {
        let kind = self.ops.kind();
        let op = format!("create {kind}");
        let handle = with_retry(&op, &self.config.retry, || self.ops.create(spec)).await?;
        tracing::info!(kind, id = %handle.id, status = %handle.status, "created");

        if let Some(sets) = self.ops.create_statuses() {
            let wait = self.wait_config(self.config.create_timeout);
            let op = format!("create {kind} {id}", id = handle.id);
            let ops = &self.ops;
            let id = handle.id.as_str();
            wait_for_status(&op, &sets, &wait, move || async move {
                let observed = ops.read(id).await?;
                Ok(Observation::Status(ops.status_of(&observed)))
            })
            .await?;
        }

        self.ops.read(&handle.id).await
    }

    /// Fetch the full remote state. `Ok(None)` when the resource no longer
    /// exists — the caller clears its stored state.
    pub async fn read(&self, id: &str) -> Result<Option<O::Observed>> {
        match self.ops.read(id).await {
            Ok(observed) => Ok(Some(observed)),
            Err(EngineError::NotFound { .. }) => {
                tracing::debug!(kind = self.ops.kind(), id, "resource gone, clearing state");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Apply the field groups whose remote value differs from `spec`, one
    /// at a time. A patch the provider applies asynchronously re-runs the
    /// waiter before the next group is touched. Returns the re-read final
    /// state.
    pub async fn update(&self, id: &str, spec: &O::Spec) -> Result<O::Observed> {
        let kind = self.ops.kind();
        let observed = self.ops.read(id).await?;
        let pending = self.ops.diff(spec, &observed);
        if pending.is_empty() {
            tracing::debug!(kind, id, "nothing to update");
            return Ok(observed);
        }
        tracing::info!(kind, id, patches = pending.len(), "updating");

        let op = format!("update {kind} {id}");
        for patch in &pending {
            let effect = with_retry(&op, &self.config.retry, || self.ops.apply_patch(id, patch)).await?;

            if effect == PatchEffect::Converging {
                if let Some(sets) = self.ops.update_statuses() {
                    let wait = self.wait_config(self.config.update_timeout);
                    let ops = &self.ops;
                    wait_for_status(&op, &sets, &wait, move || async move {
                        let observed = ops.read(id).await?;
                        Ok(Observation::Status(ops.status_of(&observed)))
                    })
                    .await?;
                }
            }
        }

        self.ops.read(id).await
    }

    /// Delete the resource. Absence — before the call or mid-poll — counts
    /// as success.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let kind = self.ops.kind();
        let op = format!("delete {kind} {id}");
        match with_retry(&op, &self.config.retry, || self.ops.delete(id)).await {
            Ok(()) => {}
            Err(EngineError::NotFound { .. }) => {
                tracing::debug!(kind, id, "already absent");
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        if let Some(sets) = self.ops.delete_statuses() {
            let wait = self.wait_config(self.config.delete_timeout);
            let ops = &self.ops;
            wait_for_status(&op, &sets, &wait, move || async move {
                match ops.read(id).await {
                    Ok(observed) => Ok(Observation::Status(ops.status_of(&observed))),
                    Err(EngineError::NotFound { .. }) => Ok(Observation::Gone),
                    Err(err) => Err(err),
                }
            })
            .await?;
        }

        tracing::info!(kind, id, "deleted");
        Ok(())
    }

    fn wait_config(&self, deadline: Duration) -> WaitConfig {
        WaitConfig {
            deadline,
            poll: self.config.poll.clone(),
        }
    }
}
