//! Typed calls behind the dashboard screens.
//!
//! All of them go through [`crate::client::ApiClient::request`], so they carry
//! the session token and take part in the refresh protocol.

pub mod fleet;
pub mod simulations;

pub use fleet::{DRIVERS_PATH, ORDERS_PATH, ROUTES_PATH};
pub use simulations::{RUN_SIMULATION_PATH, SIMULATIONS_PATH};
