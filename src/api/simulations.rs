use tracing::info;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{Listing, Simulation, SimulationParams};

pub const SIMULATIONS_PATH: &str = "/api/simulations/";
pub const RUN_SIMULATION_PATH: &str = "/api/simulations/run/";

impl ApiClient {
    /// Stored simulation runs, most recent first.
    pub async fn list_simulations(&self) -> Result<Vec<Simulation>, ApiError> {
        let listing: Listing<Simulation> = self.get_json(SIMULATIONS_PATH).await?;
        Ok(listing.into_vec())
    }

    /// The run the KPI dashboard shows, if any simulation was run yet.
    pub async fn latest_simulation(&self) -> Result<Option<Simulation>, ApiError> {
        Ok(self.list_simulations().await?.into_iter().next())
    }

    pub async fn run_simulation(&self, params: &SimulationParams) -> Result<Simulation, ApiError> {
        params.validate()?;
        let simulation: Simulation = self.post_json(RUN_SIMULATION_PATH, params).await?;
        info!(
            drivers = params.available_drivers,
            start = %params.route_start_time,
            "Simulation run completed"
        );
        Ok(simulation)
    }
}
