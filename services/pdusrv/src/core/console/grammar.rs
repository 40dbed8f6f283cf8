//! Report grammar
//!
//! Decodes the console's ASCII reports (`Status`, `Ostatus`, `Temp`,
//! `Whoami`) with one anchored multi-line pattern per row shape. The
//! patterns are configuration so another firmware revision can be
//! accommodated without code changes.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::topology::Topology;
use crate::core::status::{BreakerStatus, GroupStatus, Measurements, OutletStatus, Status};
use crate::error::{PduError, Result};

pub const SECTION_TEMPERATURE: &str = "temperature";
pub const SECTION_TOTAL_ENERGY: &str = "total-energy";
pub const SECTION_SWITCHES: &str = "switches";
pub const SECTION_BREAKERS: &str = "breakers";
pub const SECTION_GROUPS: &str = "groups";
pub const SECTION_OUTLETS: &str = "outlets";
pub const SECTION_WHOAMI: &str = "whoami";

/// Row patterns as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// One capture: temperature in °F
    pub temperature: String,
    /// One capture: user name
    pub whoami: String,
    /// One capture: kWh
    pub total_energy: String,
    /// One capture per switch: `Open` or `Closed`
    pub switches: String,
    /// Name, current, peak current
    pub breaker_row: String,
    /// Name, current, peak current, voltage, power, VA
    pub group_row: String,
    /// Name, current, peak current, voltage, power, VA, `On|Off`, `Locked|`
    pub outlet_row: String,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            temperature: r"(?m)^Int\. Temp:\s*([0-9\.]+)\s*F".to_string(),
            whoami: r"(?m)^Current User:\s*([A-Za-z0-9-]+)\s*$".to_string(),
            total_energy: r"(?m)^Total kW-h: ([0-9\.]+)".to_string(),
            switches: r"(?m)^Switch 1: (Open|Closed) 2: (Open|Closed)".to_string(),
            breaker_row: concat!(
                r"(?m)^\|\s*(CKT[1-2]|Input [A-Z]|Circuit M[1-4])\s*",
                r"\|\s*([0-9\.]+)\s+Amps\s*\|\s*([0-9\.]+)\s+Amps\s*\|\s*$"
            )
            .to_string(),
            group_row: concat!(
                r"(?m)^\|\s*(CKT[1-2]|Input [A-Z]|Circuit M[1-4])\s*",
                r"\|\s*([0-9\.]+)\s+Amps\s*\|\s*([0-9\.]+)\s+Amps\s*",
                r"\|\s*([0-9\.]+)\s+Volts\s*\|\s*([0-9\.]+)\s+Watts\s*\|\s*([0-9\.]+)\s+VA\s*\|"
            )
            .to_string(),
            outlet_row: concat!(
                r"(?m)^\|\s*([A-Za-z0-9- ]+?)\s*",
                r"\|\s*([0-9\.]+)\s+A\s*\|\s*([0-9\.]+)\s+A\s*\|\s*([0-9\.]+)\s+V\s*",
                r"\|\s*([0-9\.]+)\s+W\s*\|\s*([0-9\.]+)\s+VA\s*\|\s*(On|Off)\s*?(Locked|)\s*\|"
            )
            .to_string(),
        }
    }
}

/// Compiled report grammar
#[derive(Debug, Clone)]
pub struct ReportGrammar {
    temperature: Regex,
    whoami: Regex,
    total_energy: Regex,
    switches: Regex,
    breaker_row: Regex,
    group_row: Regex,
    outlet_row: Regex,
}

fn compile(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| PduError::config(format!("invalid {name} pattern: {e}")))
}

fn number(caps: &Captures<'_>, index: usize, section: &str) -> Result<f64> {
    caps.get(index)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| PduError::decode(section))
}

fn text<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}

fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

impl ReportGrammar {
    pub fn compile(config: &GrammarConfig) -> Result<Self> {
        Ok(Self {
            temperature: compile("temperature", &config.temperature)?,
            whoami: compile("whoami", &config.whoami)?,
            total_energy: compile("total_energy", &config.total_energy)?,
            switches: compile("switches", &config.switches)?,
            breaker_row: compile("breaker_row", &config.breaker_row)?,
            group_row: compile("group_row", &config.group_row)?,
            outlet_row: compile("outlet_row", &config.outlet_row)?,
        })
    }

    /// Temperature in °C from a `Temp` or `Status` report
    pub fn parse_temperature(&self, report: &str) -> Result<f64> {
        let caps = self
            .temperature
            .captures(report)
            .ok_or_else(|| PduError::decode(SECTION_TEMPERATURE))?;
        Ok(fahrenheit_to_celsius(number(&caps, 1, SECTION_TEMPERATURE)?))
    }

    pub fn parse_whoami(&self, report: &str) -> Result<String> {
        let caps = self
            .whoami
            .captures(report)
            .ok_or_else(|| PduError::decode(SECTION_WHOAMI))?;
        Ok(text(&caps, 1).trim().to_string())
    }

    /// Summary snapshot from a `Status` report; outlets stay empty
    pub fn parse_status(&self, report: &str, topology: &Topology) -> Result<Status> {
        let temperature = self.parse_temperature(report)?;

        let total_energy = self
            .total_energy
            .captures(report)
            .ok_or_else(|| PduError::decode(SECTION_TOTAL_ENERGY))
            .and_then(|caps| number(&caps, 1, SECTION_TOTAL_ENERGY))?;

        let switches = self
            .switches
            .captures(report)
            .ok_or_else(|| PduError::decode(SECTION_SWITCHES))?
            .iter()
            .skip(1)
            .map(|m| m.is_some_and(|m| m.as_str() == "Closed"))
            .collect();

        Ok(Status {
            temperature,
            total_energy,
            timestamp: chrono::Utc::now(),
            switches,
            breakers: self.parse_breakers(report)?,
            groups: self.parse_groups(report, topology)?,
            outlets: Vec::new(),
        })
    }

    fn parse_breakers(&self, report: &str) -> Result<Vec<BreakerStatus>> {
        let breakers = self
            .breaker_row
            .captures_iter(report)
            .enumerate()
            .map(|(i, caps)| {
                Ok(BreakerStatus {
                    name: text(&caps, 1).to_string(),
                    // Row order: the input feed is breaker 0, circuits follow
                    id: i as u32,
                    true_rms_current: number(&caps, 2, SECTION_BREAKERS)?,
                    peak_rms_current: number(&caps, 3, SECTION_BREAKERS)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if breakers.is_empty() {
            return Err(PduError::decode(SECTION_BREAKERS));
        }
        Ok(breakers)
    }

    fn parse_groups(&self, report: &str, topology: &Topology) -> Result<Vec<GroupStatus>> {
        let groups = self
            .group_row
            .captures_iter(report)
            .enumerate()
            .map(|(i, caps)| {
                let id = i as u32 + 1;
                Ok(GroupStatus {
                    name: text(&caps, 1).to_string(),
                    id,
                    breaker_id: topology.breaker_for_group(id),
                    measurements: measurements(&caps, SECTION_GROUPS)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if groups.is_empty() {
            return Err(PduError::decode(SECTION_GROUPS));
        }
        Ok(groups)
    }

    /// Per-outlet readings from an `Ostatus` report
    pub fn parse_outlets(&self, report: &str, topology: &Topology) -> Result<Vec<OutletStatus>> {
        let outlets = self
            .outlet_row
            .captures_iter(report)
            .enumerate()
            .map(|(i, caps)| {
                let id = i as u32 + 1;
                let (breaker_id, group_id) = topology.locate(id).unwrap_or((0, 0));
                Ok(OutletStatus {
                    name: text(&caps, 1).to_string(),
                    id,
                    group_id,
                    breaker_id,
                    state: text(&caps, 7) == "On",
                    locked: text(&caps, 8) == "Locked",
                    measurements: measurements(&caps, SECTION_OUTLETS)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if outlets.is_empty() {
            return Err(PduError::decode(SECTION_OUTLETS));
        }
        Ok(outlets)
    }
}

/// Columns 2..=6 of a group or outlet row
fn measurements(caps: &Captures<'_>, section: &str) -> Result<Measurements> {
    Ok(Measurements {
        true_rms_current: number(caps, 2, section)?,
        peak_rms_current: number(caps, 3, section)?,
        true_rms_voltage: number(caps, 4, section)?,
        average_power: number(caps, 5, section)?,
        volt_amps: number(caps, 6, section)?,
        energy: 0.0,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    const OSTATUS: &str = "\
| Outlet Name     | True RMS | Peak RMS | True RMS | Average | Volt-  |           |\r
|                 | Current  | Current  | Voltage  | Power   | Amps   | State     |\r
| Outlet 1        |   0.5 A  |   0.9 A  | 120.1 V  |   55 W  |  60 VA | On        |\r
| router-b        |   0.0 A  |   0.0 A  | 120.1 V  |    0 W  |   0 VA | Off Locked|\r
";

    fn grammar() -> ReportGrammar {
        ReportGrammar::compile(&GrammarConfig::default()).unwrap()
    }

    #[test]
    fn test_temperature_converts_to_celsius() {
        let celsius = grammar().parse_temperature("Int. Temp:  77.0 F\r\n").unwrap();
        assert!((celsius - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_whoami() {
        let user = grammar()
            .parse_whoami("Current User: admin-2\r\n")
            .unwrap();
        assert_eq!(user, "admin-2");
        assert_eq!(
            grammar().parse_whoami("nobody here").unwrap_err(),
            PduError::Decode("whoami".to_string())
        );
    }

    #[test]
    fn test_outlet_rows() {
        let outlets = grammar()
            .parse_outlets(OSTATUS, &Topology::default())
            .unwrap();
        assert_eq!(outlets.len(), 2);

        assert_eq!(outlets[0].name, "Outlet 1");
        assert_eq!(outlets[0].id, 1);
        assert!(outlets[0].state);
        assert!(!outlets[0].locked);
        assert!((outlets[0].measurements.true_rms_voltage - 120.1).abs() < 1e-9);
        assert!((outlets[0].measurements.volt_amps - 60.0).abs() < 1e-9);

        assert_eq!(outlets[1].name, "router-b");
        assert!(!outlets[1].state);
        assert!(outlets[1].locked);
        assert_eq!((outlets[1].breaker_id, outlets[1].group_id), (1, 1));
    }

    #[test]
    fn test_empty_outlet_report_is_decode_error() {
        let err = grammar()
            .parse_outlets("Unknown command\r\n", &Topology::default())
            .unwrap_err();
        assert_eq!(err, PduError::Decode("outlets".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let config = GrammarConfig {
            switches: "(unclosed".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ReportGrammar::compile(&config),
            Err(PduError::Config(_))
        ));
    }
}
