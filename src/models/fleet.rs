use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// List endpoints answer either with a bare array or a paginated envelope.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Paginated { results: Vec<T> },
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Plain(items) | Listing::Paginated { results: items } => items,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Driver {
    pub id: u64,
    pub name: String,
    pub shift_hours: f64,
    /// Hours worked on each of the last seven days, `|` separated.
    pub past_week_hours: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewDriver {
    pub name: String,
    pub shift_hours: f64,
    pub past_week_hours: String,
}

impl NewDriver {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("name", "must not be empty"));
        }
        if !(self.shift_hours > 0.0 && self.shift_hours <= 24.0) {
            return Err(ApiError::validation("shift_hours", "must be between 0 and 24"));
        }
        parse_week_hours(&self.past_week_hours)?;
        Ok(())
    }
}

/// Parse `8|9|7|8|8|0|0` into seven daily hour counts.
pub fn parse_week_hours(raw: &str) -> Result<Vec<u32>, ApiError> {
    let hours = raw
        .split('|')
        .map(|h| h.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ApiError::validation("past_week_hours", "entries must be whole hours"))?;
    if hours.len() != 7 {
        return Err(ApiError::validation(
            "past_week_hours",
            format!("expected 7 entries, got {}", hours.len()),
        ));
    }
    if hours.iter().any(|h| *h > 24) {
        return Err(ApiError::validation("past_week_hours", "a day has at most 24 hours"));
    }
    Ok(hours)
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrafficLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrafficLevel::Low => "Low",
            TrafficLevel::Medium => "Medium",
            TrafficLevel::High => "High",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TrafficLevel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TrafficLevel::Low),
            "medium" => Ok(TrafficLevel::Medium),
            "high" => Ok(TrafficLevel::High),
            _ => Err(ApiError::validation(
                "traffic_level",
                "expected Low, Medium or High",
            )),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Route {
    pub id: u64,
    pub route_id: String,
    pub distance_km: f64,
    pub traffic_level: TrafficLevel,
    pub base_time_min: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewRoute {
    pub route_id: String,
    pub distance_km: f64,
    pub traffic_level: TrafficLevel,
    pub base_time_min: u32,
}

impl NewRoute {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.route_id.trim().is_empty() {
            return Err(ApiError::validation("route_id", "must not be empty"));
        }
        if self.distance_km <= 0.0 {
            return Err(ApiError::validation("distance_km", "must be positive"));
        }
        if self.base_time_min == 0 {
            return Err(ApiError::validation("base_time_min", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub id: u64,
    pub order_id: u64,
    pub value_rs: f64,
    /// `route_id` of the route the order is delivered on.
    pub route: String,
    pub delivery_time_min: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub order_id: u64,
    pub value_rs: f64,
    pub route: String,
    pub delivery_time_min: u32,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.value_rs < 0.0 {
            return Err(ApiError::validation("value_rs", "must not be negative"));
        }
        if self.route.trim().is_empty() {
            return Err(ApiError::validation("route", "must not be empty"));
        }
        if self.delivery_time_min == 0 {
            return Err(ApiError::validation("delivery_time_min", "must be positive"));
        }
        Ok(())
    }
}
