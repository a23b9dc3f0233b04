use std::sync::Arc;

use rp_service::{Providers, RentPilotService};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RentPilotService>,
}
impl AppState {
	pub fn new(config: rp_config::Config) -> color_eyre::Result<Self> {
		Ok(Self::from_service(RentPilotService::new(config)?))
	}

	pub fn with_providers(config: rp_config::Config, providers: Providers) -> color_eyre::Result<Self> {
		Ok(Self::from_service(RentPilotService::with_providers(config, providers)?))
	}

	pub fn from_service(service: RentPilotService) -> Self {
		Self { service: Arc::new(service) }
	}
}
