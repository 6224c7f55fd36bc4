//! Synthetic identity for security-group rules
//!
//! The remote API manages rules without issuing them an identifier: a rule
//! is addressed only by its own field values. A stable, opaque id is
//! derived from the canonical field bag and parsed back on read, and the
//! same canonical form backs the structural equivalence comparator — so a
//! rule's identity and its equality judgement can never disagree.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Traffic direction of a rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ingress,
    Egress,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

/// Values the provider substitutes for unspecified rule fields.
///
/// An empty field and its documented default are the same rule as far as
/// the provider is concerned.
pub const DEFAULT_PORT_RANGE: &str = "1-65535";
pub const DEFAULT_PROTOCOL: &str = "all";
pub const DEFAULT_ETHER_TYPE: &str = "IPv4";

/// Field bag describing one security-group rule.
///
/// Reconstructed from the parent group's freshly-listed rules on every
/// read — never cached between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub security_group_id: String,
    pub direction: Direction,
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

fn canonical_value(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl RuleDescriptor {
    /// Canonical form of the descriptor.
    ///
    /// Every defaulted field is replaced by the canonical representative of
    /// its equivalence class, and the endpoint fields of the irrelevant
    /// direction are cleared — an ingress rule carries no destination and
    /// an egress rule no source, so they cannot influence identity.
    pub fn canonical(&self) -> RuleDescriptor {
        let mut canon = RuleDescriptor {
            security_group_id: self.security_group_id.clone(),
            direction: self.direction,
            ether_type: canonical_value(&self.ether_type, DEFAULT_ETHER_TYPE),
            protocol: canonical_value(&self.protocol, DEFAULT_PROTOCOL),
            port_range: canonical_value(&self.port_range, DEFAULT_PORT_RANGE),
            source_ip: self.source_ip.clone(),
            source_group_id: self.source_group_id.clone(),
            dest_ip: self.dest_ip.clone(),
            dest_group_id: self.dest_group_id.clone(),
            remark: self.remark.clone(),
        };
        match canon.direction {
            Direction::Ingress => {
                canon.dest_ip.clear();
                canon.dest_group_id.clear();
            }
            Direction::Egress => {
                canon.source_ip.clear();
                canon.source_group_id.clear();
            }
        }
        canon
    }

    /// Derive the opaque identity stored as the rule's resource id.
    ///
    /// Deterministic over the canonical form, and URL-safe base64 keeps the
    /// id free of delimiters that could collide with the encoding itself.
    /// Two descriptors derive the same id exactly when [`Self::equivalent`]
    /// judges them equal.
    pub fn derive(&self) -> Result<String> {
        let canon = self.canonical();
        let json = serde_json::to_string(&canon).map_err(|err| EngineError::InvalidIdentity {
            reason: err.to_string(),
        })?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Parse a derived identity back into its canonical descriptor.
    pub fn parse(id: &str) -> Result<RuleDescriptor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(id)
            .map_err(|err| EngineError::InvalidIdentity {
                reason: format!("not base64: {err}"),
            })?;
        let descriptor: RuleDescriptor =
            serde_json::from_slice(&bytes).map_err(|err| EngineError::InvalidIdentity {
                reason: format!("not a rule descriptor: {err}"),
            })?;
        Ok(descriptor)
    }

    /// Structural equivalence over canonical forms.
    ///
    /// Unspecified fields match their documented defaults, and only the
    /// direction-relevant endpoint fields participate.
    pub fn equivalent(&self, other: &RuleDescriptor) -> bool {
        self.canonical() == other.canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_rule() -> RuleDescriptor {
        RuleDescriptor {
            security_group_id: "sg-1f2e3d".to_string(),
            direction: Direction::Ingress,
            ether_type: "IPv4".to_string(),
            protocol: "tcp".to_string(),
            port_range: "22".to_string(),
            source_ip: "0.0.0.0/0".to_string(),
            remark: "ssh".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_and_empty_fields_are_equivalent() {
        let unspecified = RuleDescriptor {
            security_group_id: "sg-1f2e3d".to_string(),
            direction: Direction::Ingress,
            source_ip: "10.0.0.0/8".to_string(),
            ..Default::default()
        };
        let spelled_out = RuleDescriptor {
            security_group_id: "sg-1f2e3d".to_string(),
            direction: Direction::Ingress,
            ether_type: "IPv4".to_string(),
            protocol: "all".to_string(),
            port_range: "1-65535".to_string(),
            source_ip: "10.0.0.0/8".to_string(),
            ..Default::default()
        };

        assert!(unspecified.equivalent(&spelled_out));
        assert_eq!(unspecified.derive().unwrap(), spelled_out.derive().unwrap());
    }

    #[test]
    fn test_equivalence_is_reflexive_and_symmetric() {
        let a = ssh_rule();
        let b = RuleDescriptor {
            ether_type: String::new(),
            ..ssh_rule()
        };

        assert!(a.equivalent(&a));
        assert!(a.equivalent(&b));
        assert!(b.equivalent(&a));
    }

    #[test]
    fn test_different_rules_are_not_equivalent() {
        let https = RuleDescriptor {
            port_range: "443".to_string(),
            ..ssh_rule()
        };

        assert!(!ssh_rule().equivalent(&https));
        assert_ne!(ssh_rule().derive().unwrap(), https.derive().unwrap());
    }

    #[test]
    fn test_irrelevant_direction_fields_are_ignored() {
        let with_dest = RuleDescriptor {
            dest_ip: "192.168.0.0/16".to_string(),
            dest_group_id: "sg-other".to_string(),
            ..ssh_rule()
        };
        assert!(ssh_rule().equivalent(&with_dest));

        // On the relevant side the same difference matters.
        let other_source = RuleDescriptor {
            source_ip: "172.16.0.0/12".to_string(),
            ..ssh_rule()
        };
        assert!(!ssh_rule().equivalent(&other_source));
    }

    #[test]
    fn test_round_trip_of_canonical_descriptor() {
        let canon = ssh_rule().canonical();
        let id = canon.derive().unwrap();
        let parsed = RuleDescriptor::parse(&id).unwrap();

        assert_eq!(parsed, canon);
    }

    #[test]
    fn test_derived_id_is_opaque_and_delimiter_free() {
        let id = ssh_rule().derive().unwrap();

        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_malformed_id_is_rejected() {
        assert!(matches!(
            RuleDescriptor::parse("not/base64!"),
            Err(EngineError::InvalidIdentity { .. })
        ));

        let garbage = URL_SAFE_NO_PAD.encode("[1, 2, 3]");
        assert!(matches!(
            RuleDescriptor::parse(&garbage),
            Err(EngineError::InvalidIdentity { .. })
        ));
    }
}
