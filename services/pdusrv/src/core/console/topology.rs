//! Outlet banking
//!
//! The device reports outlets and groups by position only; which breaker
//! and group an outlet hangs off is a property of the model's wiring.

use serde::{Deserialize, Serialize};

use crate::error::{PduError, Result};

/// A contiguous range of outlets fed by one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletBank {
    pub first_outlet: u32,
    pub last_outlet: u32,
    pub breaker_id: u32,
    pub group_id: u32,
}

impl OutletBank {
    pub const fn new(first_outlet: u32, last_outlet: u32, breaker_id: u32, group_id: u32) -> Self {
        Self {
            first_outlet,
            last_outlet,
            breaker_id,
            group_id,
        }
    }

    fn contains(&self, outlet_id: u32) -> bool {
        (self.first_outlet..=self.last_outlet).contains(&outlet_id)
    }
}

/// Outlet → (breaker, group) table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    banks: Vec<OutletBank>,
}

impl Default for Topology {
    /// MMP-14 wiring: 20 outlets, two breakers, four groups of five
    fn default() -> Self {
        Self {
            banks: vec![
                OutletBank::new(1, 5, 1, 1),
                OutletBank::new(6, 10, 1, 2),
                OutletBank::new(11, 15, 2, 3),
                OutletBank::new(16, 20, 2, 4),
            ],
        }
    }
}

impl Topology {
    pub fn new(banks: Vec<OutletBank>) -> Result<Self> {
        let topology = Self { banks };
        topology.validate()?;
        Ok(topology)
    }

    pub fn validate(&self) -> Result<()> {
        if self.banks.is_empty() {
            return Err(PduError::config("topology needs at least one outlet bank"));
        }

        for (i, bank) in self.banks.iter().enumerate() {
            if bank.first_outlet == 0 || bank.first_outlet > bank.last_outlet {
                return Err(PduError::config(format!(
                    "outlet bank {}..{} is empty or starts at 0",
                    bank.first_outlet, bank.last_outlet
                )));
            }
            let overlapping = self.banks[i + 1..]
                .iter()
                .any(|other| bank.first_outlet <= other.last_outlet && other.first_outlet <= bank.last_outlet);
            if overlapping {
                return Err(PduError::config(format!(
                    "outlet bank {}..{} overlaps another bank",
                    bank.first_outlet, bank.last_outlet
                )));
            }
        }

        Ok(())
    }

    pub fn banks(&self) -> &[OutletBank] {
        &self.banks
    }

    /// `(breaker_id, group_id)` for an outlet
    pub fn locate(&self, outlet_id: u32) -> Option<(u32, u32)> {
        self.banks
            .iter()
            .find(|bank| bank.contains(outlet_id))
            .map(|bank| (bank.breaker_id, bank.group_id))
    }

    /// Breaker feeding a group, 0 when the group is not wired
    pub fn breaker_for_group(&self, group_id: u32) -> u32 {
        self.banks
            .iter()
            .find(|bank| bank.group_id == group_id)
            .map_or(0, |bank| bank.breaker_id)
    }

    /// Highest outlet id on the device
    pub fn max_outlet(&self) -> u32 {
        self.banks
            .iter()
            .map(|bank| bank.last_outlet)
            .max()
            .unwrap_or(0)
    }
}
