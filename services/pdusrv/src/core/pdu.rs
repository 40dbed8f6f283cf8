//! PDU capability traits
//!
//! [`Pdu`] is the base surface every layer implements: the console driver,
//! the freshness cache and the poller, so they compose by wrapping an
//! `Arc<dyn Pdu>`. Authentication is an optional extension reached through
//! [`Pdu::as_login`].

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::status::Status;
use crate::error::{PduError, Result};

/// Outlet identifier addressing every outlet at once
pub const ALL_OUTLETS: &str = "all";

/// Base PDU capability
#[async_trait]
pub trait Pdu: Send + Sync {
    /// Release the device; no other call is valid afterwards
    async fn close(&self) -> Result<()>;

    async fn switch_outlet(&self, id: &str, state: bool) -> Result<()>;

    async fn lock_outlet(&self, id: &str, state: bool) -> Result<()>;

    async fn reboot_outlet(&self, id: &str) -> Result<()>;

    /// Current snapshot; `detailed` adds per-outlet readings
    async fn status(&self, detailed: bool) -> Result<Status>;

    /// Reset peak current readings
    async fn clear_maximum_currents(&self) -> Result<()>;

    /// Internal temperature in °C
    async fn temperature(&self) -> Result<f64>;

    /// Name of the console user the session is logged in as
    async fn who_am_i(&self) -> Result<String>;

    /// The authentication capability, when this PDU has one
    fn as_login(&self) -> Option<&dyn LoginPdu> {
        None
    }
}

/// Optional authentication capability
#[async_trait]
pub trait LoginPdu: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<()>;

    async fn logout(&self) -> Result<()>;

    /// Run `body` while logged in as `username`
    ///
    /// No other identity's login or command bracket interleaves with the
    /// body. Logs out afterwards.
    async fn with_login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
        body: BoxFuture<'a, ()>,
    ) -> Result<()>;
}

/// Operation names used for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Status,
    Temperature,
    Whoami,
    Clear,
    Switch,
    Lock,
    Reboot,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Status,
        Operation::Temperature,
        Operation::Whoami,
        Operation::Clear,
        Operation::Switch,
        Operation::Lock,
        Operation::Reboot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::Temperature => "temperature",
            Operation::Whoami => "whoami",
            Operation::Clear => "clear",
            Operation::Switch => "switch",
            Operation::Lock => "lock",
            Operation::Reboot => "reboot",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = PduError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| PduError::NotFound(format!("operation {s}")))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("shutdown".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_wire_name() {
        assert_eq!(
            serde_json::to_string(&Operation::Whoami).unwrap(),
            "\"whoami\""
        );
    }
}
