use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

/// Inputs of the "run simulation" form.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SimulationParams {
    pub available_drivers: u32,
    /// Start of the working day, `HH:MM` in 24h.
    pub route_start_time: String,
    pub max_hours_per_driver: u32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            available_drivers: 3,
            route_start_time: "09:00".to_string(),
            max_hours_per_driver: 8,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_hh_mm(&self.route_start_time) {
            return Err(ApiError::validation(
                "route_start_time",
                "must be in HH:MM (24h) format",
            ));
        }
        if self.available_drivers == 0 {
            return Err(ApiError::validation("available_drivers", "must be positive"));
        }
        if self.max_hours_per_driver == 0 {
            return Err(ApiError::validation("max_hours_per_driver", "must be positive"));
        }
        Ok(())
    }
}

/// `00:00` through `23:59`, zero padded.
fn is_hh_mm(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hours = (digits[0] - b'0') * 10 + (digits[1] - b'0');
    let minutes = (digits[2] - b'0') * 10 + (digits[3] - b'0');
    hours < 24 && minutes < 60
}

/// One stored simulation run, as computed by the backend.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Simulation {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub ran_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub kpis: Kpis,
    #[serde(default)]
    pub totals: Totals,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Kpis {
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_profit: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub efficiency: f64,
    #[serde(default)]
    pub on_time: u32,
    #[serde(default)]
    pub late: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Totals {
    /// Litres of fuel per traffic level.
    #[serde(default)]
    pub fuel_by_traffic: BTreeMap<String, f64>,
}

impl Simulation {
    /// Fuel breakdown as (traffic level, litres) rows, ready for a table or chart.
    pub fn fuel_rows(&self) -> Vec<(String, f64)> {
        self.totals
            .fuel_by_traffic
            .iter()
            .map(|(traffic, value)| (traffic.clone(), *value))
            .collect()
    }
}

// Some backends format money as "25,340".
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_time_must_be_24h_clock() {
        for ok in ["00:00", "09:00", "23:59"] {
            assert!(is_hh_mm(ok), "{ok} should be accepted");
        }
        for bad in ["24:00", "9:00", "09:60", "0900", "ab:cd", "09:00 "] {
            assert!(!is_hh_mm(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn params_reject_zero_drivers_and_hours() {
        let mut params = SimulationParams::default();
        assert!(params.validate().is_ok());

        params.available_drivers = 0;
        assert!(matches!(
            params.validate(),
            Err(ApiError::Validation { ref field, .. }) if field == "available_drivers"
        ));

        params.available_drivers = 2;
        params.max_hours_per_driver = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn simulation_tolerates_formatted_profit_and_missing_sections() {
        let body = r#"{"kpis": {"total_profit": "25,340", "efficiency": 87, "on_time": 45, "late": 5}}"#;
        let sim: Simulation = serde_json::from_str(body).unwrap();
        assert_eq!(sim.kpis.total_profit, 25340.0);
        assert_eq!(sim.kpis.on_time, 45);
        assert!(sim.fuel_rows().is_empty());
    }

    #[test]
    fn fuel_rows_flatten_the_breakdown() {
        let body = r#"{"totals": {"fuel_by_traffic": {"High": 45, "Low": 120, "Medium": 85}}}"#;
        let sim: Simulation = serde_json::from_str(body).unwrap();
        assert_eq!(
            sim.fuel_rows(),
            vec![
                ("High".to_string(), 45.0),
                ("Low".to_string(), 120.0),
                ("Medium".to_string(), 85.0)
            ]
        );
    }
}
