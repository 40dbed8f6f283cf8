//! Access control
//!
//! Entries are keyed by a regular expression over the caller identity and
//! grant whole-API operations, or outlet-scoped operations gated by a
//! second expression over the outlet id. Allow-only: the first grant wins,
//! no grant denies.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::pdu::Operation;
use crate::error::{PduError, Result};

/// Outlet-scoped grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletRule {
    /// Expression over the outlet id
    pub id: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// One ACL entry as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    /// Expression over the caller identity
    pub name: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub outlets: Vec<OutletRule>,
}

#[derive(Debug)]
struct CompiledOutletRule {
    id: Regex,
    operations: Vec<Operation>,
}

#[derive(Debug)]
struct CompiledEntry {
    name: Regex,
    operations: Vec<Operation>,
    outlets: Vec<CompiledOutletRule>,
}

impl CompiledEntry {
    fn grants(&self, operation: Operation, outlet_id: Option<&str>) -> bool {
        if self.operations.contains(&operation) {
            return true;
        }
        let Some(outlet_id) = outlet_id else {
            return false;
        };
        self.outlets
            .iter()
            .any(|rule| rule.id.is_match(outlet_id) && rule.operations.contains(&operation))
    }
}

/// Compiled access control list
#[derive(Debug, Default)]
pub struct AccessControlList {
    entries: Vec<CompiledEntry>,
}

impl AccessControlList {
    pub fn new(entries: &[AccessControlEntry]) -> Result<Self> {
        let entries = entries
            .iter()
            .map(|entry| {
                let outlets = entry
                    .outlets
                    .iter()
                    .map(|rule| {
                        Ok(CompiledOutletRule {
                            id: compile(&rule.id, "outlet ID")?,
                            operations: rule.operations.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledEntry {
                    name: compile(&entry.name, "ACL name")?,
                    operations: entry.operations.clone(),
                    outlets,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `identity` may run `operation`
    ///
    /// Outlet rules only apply when an outlet id is given.
    pub fn check(&self, identity: &str, operation: Operation, outlet_id: Option<&str>) -> bool {
        let allowed = self
            .entries
            .iter()
            .filter(|entry| entry.name.is_match(identity))
            .any(|entry| entry.grants(operation, outlet_id));

        debug!(
            identity,
            %operation,
            outlet = outlet_id.unwrap_or("-"),
            allowed,
            "ACL check"
        );
        allowed
    }
}

fn compile(pattern: &str, what: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| PduError::config(format!("invalid {what} expression: {pattern}: {e}")))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn client1_switch_any_outlet() -> AccessControlList {
        let entries: Vec<AccessControlEntry> = serde_yaml::from_str(
            r#"
- name: "^client1$"
  outlets:
    - id: ".*"
      operations: [switch]
"#,
        )
        .unwrap();
        AccessControlList::new(&entries).unwrap()
    }

    #[test]
    fn test_outlet_grant() {
        let acl = client1_switch_any_outlet();
        assert!(acl.check("client1", Operation::Switch, Some("7")));
        assert!(acl.check("client1", Operation::Switch, Some("all")));
        assert!(!acl.check("client1", Operation::Reboot, Some("7")));
        assert!(!acl.check("client2", Operation::Switch, Some("7")));
    }

    #[test]
    fn test_outlet_rule_needs_outlet_id() {
        let acl = client1_switch_any_outlet();
        assert!(!acl.check("client1", Operation::Switch, None));
    }

    #[test]
    fn test_whole_api_grant_and_unanchored_names() {
        let acl = AccessControlList::new(&[AccessControlEntry {
            name: "monitor".to_string(),
            operations: vec![Operation::Status, Operation::Temperature],
            outlets: vec![OutletRule {
                id: "^(1|2)$".to_string(),
                operations: vec![Operation::Reboot],
            }],
        }])
        .unwrap();

        assert!(acl.check("rack-monitor-3", Operation::Status, None));
        assert!(acl.check("monitor", Operation::Temperature, Some("9")));
        assert!(acl.check("monitor", Operation::Reboot, Some("2")));
        assert!(!acl.check("monitor", Operation::Reboot, Some("12")));
        assert!(!acl.check("monitor", Operation::Clear, None));
    }

    #[test]
    fn test_empty_list_denies() {
        let acl = AccessControlList::default();
        assert!(acl.is_empty());
        assert!(!acl.check("admin", Operation::Status, None));
    }

    #[test]
    fn test_invalid_expression_is_config_error() {
        let err = AccessControlList::new(&[AccessControlEntry {
            name: "(".to_string(),
            operations: vec![],
            outlets: vec![],
        }])
        .unwrap_err();
        assert!(matches!(err, PduError::Config(msg) if msg.contains("ACL name")));
    }
}
