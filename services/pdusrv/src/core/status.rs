//! Status snapshot types
//!
//! A [`Status`] is an immutable value once published by the cache or the
//! poller; consumers get their own clone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PduError, Result};

/// Electrical readings shared by groups and outlets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    /// True RMS current (A)
    pub true_rms_current: f64,
    /// Peak RMS current since last clear (A)
    pub peak_rms_current: f64,
    /// True RMS voltage (V)
    pub true_rms_voltage: f64,
    /// Average power as reported by the device (W)
    #[serde(rename = "avg_power")]
    pub average_power: f64,
    /// Apparent power (VA)
    #[serde(rename = "va")]
    pub volt_amps: f64,
    /// Cumulative energy derived by integration (kWh)
    pub energy: f64,
}

impl Measurements {
    /// Real power from current and voltage (W)
    pub fn power(&self) -> f64 {
        self.true_rms_current * self.true_rms_voltage
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub name: String,
    pub id: u32,
    pub true_rms_current: f64,
    pub peak_rms_current: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub name: String,
    pub id: u32,
    pub breaker_id: u32,
    #[serde(flatten)]
    pub measurements: Measurements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutletStatus {
    pub name: String,
    pub id: u32,
    pub group_id: u32,
    pub breaker_id: u32,
    /// Powered on
    pub state: bool,
    pub locked: bool,
    #[serde(flatten)]
    pub measurements: Measurements,
}

/// One snapshot of the whole PDU
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Internal temperature (°C)
    #[serde(rename = "temp")]
    pub temperature: f64,
    /// Device-wide cumulative energy (kWh)
    #[serde(rename = "kwh")]
    pub total_energy: f64,
    pub timestamp: DateTime<Utc>,
    /// Auxiliary switch inputs, `true` when closed
    pub switches: Vec<bool>,
    pub breakers: Vec<BreakerStatus>,
    pub groups: Vec<GroupStatus>,
    /// Empty for summary snapshots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outlets: Vec<OutletStatus>,
}

impl Status {
    /// Copy of this snapshot without per-outlet data
    pub fn summary(&self) -> Status {
        Status {
            outlets: Vec::new(),
            ..self.clone()
        }
    }

    /// Find an outlet by numeric id or by name
    pub fn outlet(&self, id: &str) -> Result<&OutletStatus> {
        let numeric = id.parse::<u32>().ok();
        self.outlets
            .iter()
            .find(|o| Some(o.id) == numeric || o.name == id)
            .ok_or_else(|| PduError::NotFound(id.to_string()))
    }
}
