//! Security-group rules — identity-less sub-resources
//!
//! Kumo manages rules without issuing them an id: a rule is addressed only
//! by its own field values. The id the caller stores is derived from the
//! canonical descriptor, and every read re-matches that descriptor against
//! the parent group's freshly-listed rules.

use std::sync::Arc;

use async_trait::async_trait;

use soraflow_cloud::{PatchEffect, ResourceHandle, ResourceOps};
use soraflow_engine::{
    ApiError, Direction, EngineError, RetryPolicy, RuleDescriptor, collect_all, with_retry,
};

use crate::api::{ApiRule, KumoApi};

/// Security-group rule operations against the Kumo API
pub struct SecurityGroupRuleOps {
    api: Arc<KumoApi>,
    retry: RetryPolicy,
}

impl SecurityGroupRuleOps {
    pub fn new(api: Arc<KumoApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }
}

fn invalid_id(err: EngineError) -> ApiError {
    ApiError::new("InvalidRuleId", err.to_string())
}

fn wire_rule(descriptor: &RuleDescriptor) -> ApiRule {
    ApiRule {
        direction: descriptor.direction.to_string(),
        ether_type: descriptor.ether_type.clone(),
        protocol: descriptor.protocol.clone(),
        port_range: descriptor.port_range.clone(),
        source_ip: descriptor.source_ip.clone(),
        source_group_id: descriptor.source_group_id.clone(),
        dest_ip: descriptor.dest_ip.clone(),
        dest_group_id: descriptor.dest_group_id.clone(),
        remark: descriptor.remark.clone(),
    }
}

/// Rules with a direction this client does not know cannot match any
/// descriptor, so they drop out of the candidate set.
fn descriptor_from_wire(group_id: &str, rule: &ApiRule) -> Option<RuleDescriptor> {
    let direction = match rule.direction.as_str() {
        "ingress" => Direction::Ingress,
        "egress" => Direction::Egress,
        other => {
            tracing::warn!(group_id, direction = other, "skipping rule with unknown direction");
            return None;
        }
    };
    Some(RuleDescriptor {
        security_group_id: group_id.to_string(),
        direction,
        ether_type: rule.ether_type.clone(),
        protocol: rule.protocol.clone(),
        port_range: rule.port_range.clone(),
        source_ip: rule.source_ip.clone(),
        source_group_id: rule.source_group_id.clone(),
        dest_ip: rule.dest_ip.clone(),
        dest_group_id: rule.dest_group_id.clone(),
        remark: rule.remark.clone(),
    })
}

#[async_trait]
impl ResourceOps for SecurityGroupRuleOps {
    type Spec = RuleDescriptor;
    type Observed = RuleDescriptor;
    type Patch = ();

    fn kind(&self) -> &'static str {
        "security-group-rule"
    }

    // Authorize and revoke are synchronous, so no status sets: the default
    // `None` hooks skip every convergence wait.

    async fn create(&self, spec: &RuleDescriptor) -> Result<ResourceHandle, ApiError> {
        let canon = spec.canonical();
        self.api
            .authorize_rule(&canon.security_group_id, &wire_rule(&canon))
            .await?;
        let id = canon.derive().map_err(invalid_id)?;
        Ok(ResourceHandle::new(id, ""))
    }

    async fn read(&self, id: &str) -> Result<RuleDescriptor, EngineError> {
        let wanted = RuleDescriptor::parse(id)?;
        let group_id = wanted.security_group_id.clone();

        let list_op = format!("list rules of security group {group_id}");
        let op = list_op.as_str();
        let group = group_id.as_str();
        let api = &*self.api;
        let retry = &self.retry;
        let rules = collect_all(op, move |cursor| async move {
            with_retry(op, retry, || api.list_security_group_rules(group, &cursor)).await
        })
        .await?;

        rules
            .iter()
            .filter_map(|rule| descriptor_from_wire(&group_id, rule))
            .find(|candidate| wanted.equivalent(candidate))
            .map(|found| found.canonical())
            .ok_or_else(|| EngineError::NotFound {
                op: format!("read rule of security group {group_id}"),
                source: ApiError::new("NoSuchRule", "no rule matches the stored identity")
                    .with_status(404),
            })
    }

    fn status_of(&self, _observed: &RuleDescriptor) -> String {
        // Rules carry no status; they are never polled.
        String::new()
    }

    fn diff(&self, _spec: &RuleDescriptor, _observed: &RuleDescriptor) -> Vec<()> {
        // Rules are immutable; any change is a replace, which the host
        // orchestrator expresses as delete + create.
        Vec::new()
    }

    async fn apply_patch(&self, _id: &str, _patch: &()) -> Result<PatchEffect, ApiError> {
        Ok(PatchEffect::Immediate)
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let descriptor = RuleDescriptor::parse(id).map_err(invalid_id)?;
        let canon = descriptor.canonical();
        self.api
            .revoke_rule(&canon.security_group_id, &wire_rule(&canon))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_wire() -> ApiRule {
        ApiRule {
            direction: "ingress".to_string(),
            ether_type: String::new(),
            protocol: "tcp".to_string(),
            port_range: "22".to_string(),
            source_ip: "0.0.0.0/0".to_string(),
            source_group_id: String::new(),
            dest_ip: String::new(),
            dest_group_id: String::new(),
            remark: "ssh".to_string(),
        }
    }

    #[test]
    fn test_wire_round_trip_preserves_equivalence() {
        let descriptor = descriptor_from_wire("sg-1", &ssh_wire()).unwrap();
        let back = wire_rule(&descriptor);

        assert_eq!(back.direction, "ingress");
        assert_eq!(back.port_range, "22");
        assert!(descriptor.equivalent(&descriptor_from_wire("sg-1", &back).unwrap()));
    }

    #[test]
    fn test_unknown_direction_is_skipped() {
        let rule = ApiRule {
            direction: "sideways".to_string(),
            ..ssh_wire()
        };
        assert!(descriptor_from_wire("sg-1", &rule).is_none());
    }

    #[test]
    fn test_listed_rule_matches_stored_identity_through_defaults() {
        // The stored identity spells the defaults out; the listing echoes
        // them back as empty strings. The equivalence comparator bridges
        // the two.
        let stored = RuleDescriptor {
            security_group_id: "sg-1".to_string(),
            direction: Direction::Ingress,
            ether_type: "IPv4".to_string(),
            protocol: "tcp".to_string(),
            port_range: "22".to_string(),
            source_ip: "0.0.0.0/0".to_string(),
            remark: "ssh".to_string(),
            ..Default::default()
        };
        let listed = descriptor_from_wire("sg-1", &ssh_wire()).unwrap();

        assert!(stored.equivalent(&listed));
        assert_eq!(
            stored.derive().unwrap(),
            listed.canonical().derive().unwrap()
        );
    }
}
