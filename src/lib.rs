//! Library exports for fleetops, shared between the binary and tests.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod utils;

pub use client::ApiClient;
pub use error::{ApiError, RefreshError};
