use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fleetops::models::TrafficLevel;

#[derive(Parser, Debug)]
#[command(name = "fleetops", about = "Logistics dashboard client", version)]
pub struct Cli {
    /// YAML configuration file. Missing files fall back to defaults.
    #[arg(long, default_value = "./config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the configuration JSON schema.
    Schema,
    Login(CredentialArgs),
    /// Create an account and log in with it.
    Register(CredentialArgs),
    Logout,
    /// Report whether a session is stored.
    Status,
    /// KPIs of the most recent simulation run.
    Dashboard,
    /// Run a simulation with the given parameters.
    Simulate {
        #[arg(long, default_value_t = 3)]
        drivers: u32,
        /// Route start time, HH:MM (24h).
        #[arg(long, default_value = "09:00")]
        start: String,
        #[arg(long, default_value_t = 8)]
        max_hours: u32,
    },
    #[command(subcommand)]
    Drivers(DriverCommand),
    #[command(subcommand)]
    Routes(RouteCommand),
    #[command(subcommand)]
    Orders(OrderCommand),
}

#[derive(Args, Debug)]
pub struct CredentialArgs {
    pub username: String,
    #[arg(long, env = "FLEETOPS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Subcommand, Debug)]
pub enum DriverCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        shift_hours: f64,
        /// Seven `|`-separated daily hour counts, e.g. 8|9|7|8|8|0|0.
        #[arg(long)]
        past_week_hours: String,
    },
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum RouteCommand {
    List,
    Add {
        #[arg(long)]
        route_id: String,
        #[arg(long)]
        distance_km: f64,
        #[arg(long, value_parser = parse_traffic)]
        traffic_level: TrafficLevel,
        #[arg(long)]
        base_time_min: u32,
    },
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    List,
    Add {
        #[arg(long)]
        order_id: u64,
        #[arg(long)]
        value_rs: f64,
        /// `route_id` of the delivering route.
        #[arg(long)]
        route: String,
        #[arg(long)]
        delivery_time_min: u32,
    },
    Delete { id: u64 },
}

fn parse_traffic(raw: &str) -> Result<TrafficLevel, String> {
    raw.parse().map_err(|e: fleetops::ApiError| e.to_string())
}
