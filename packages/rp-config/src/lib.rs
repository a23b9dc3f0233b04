mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Config, Dataset, DatasetMode, Defaults, Ledger, LedgerMirror, LlmProviderConfig, Nlu,
	Preferences, Prompts, Providers, Scoring, Service, Verify,
};

use std::{fs, path::Path};

/// Scoring weights must sum to one within this tolerance.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.agent.agent_version.trim().is_empty() {
		return Err(Error::Validation {
			message: "agent.agent_version must be non-empty.".to_string(),
		});
	}

	let reasoning = &cfg.providers.reasoning;

	if reasoning.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider reasoning api_key must be non-empty.".to_string(),
		});
	}
	if reasoning.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.reasoning.model must be non-empty.".to_string(),
		});
	}
	if reasoning.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.reasoning.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !reasoning.temperature.is_finite() || reasoning.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.reasoning.temperature must be a finite number of zero or greater."
				.to_string(),
		});
	}
	if reasoning.planning_max_tokens == 0 || reasoning.finalize_max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.reasoning token caps must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &reasoning.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("providers.reasoning.default_headers.{key} must be a string."),
			});
		}
	}

	if cfg.dataset.mode == DatasetMode::Remote && cfg.dataset.remote_url.is_none() {
		return Err(Error::Validation {
			message: "dataset.remote_url is required when dataset.mode is remote.".to_string(),
		});
	}
	if cfg.dataset.remote_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "dataset.remote_timeout_ms must be greater than zero.".to_string(),
		});
	}

	if let Some(mirror) = cfg.ledger.mirror.as_ref() {
		if mirror.url.trim().is_empty() {
			return Err(Error::Validation {
				message: "ledger.mirror.url must be non-empty.".to_string(),
			});
		}
		if mirror.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "ledger.mirror.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}

	validate_preferences(&cfg.preferences)?;
	validate_scoring(&cfg.scoring)?;

	if !is_supported_property_type(&cfg.defaults.property_type) {
		return Err(Error::Validation {
			message: "defaults.property_type must be one of studio, 1bed, 2bed, or 3bed."
				.to_string(),
		});
	}

	let verify = &cfg.verify;

	if !(verify.min_listing_to_median.is_finite() && verify.max_listing_to_median.is_finite()) {
		return Err(Error::Validation {
			message: "verify listing-to-median bounds must be finite numbers.".to_string(),
		});
	}
	if !(0.0 < verify.min_listing_to_median
		&& verify.min_listing_to_median < 1.0
		&& 1.0 < verify.max_listing_to_median)
	{
		return Err(Error::Validation {
			message: "verify bounds must satisfy 0 < min_listing_to_median < 1 < max_listing_to_median."
				.to_string(),
		});
	}

	if verify.max_hints == 0 {
		return Err(Error::Validation {
			message: "verify.max_hints must be greater than zero.".to_string(),
		});
	}

	if cfg.nlu.cities.iter().any(|city| city.trim().is_empty()) {
		return Err(Error::Validation {
			message: "nlu.cities must not contain empty names.".to_string(),
		});
	}

	Ok(())
}

pub fn validate_scoring(scoring: &Scoring) -> Result<()> {
	let weights = [
		("scoring.affordability_weight", scoring.affordability_weight),
		("scoring.transit_weight", scoring.transit_weight),
		("scoring.distance_weight", scoring.distance_weight),
	];

	for (label, weight) in weights {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&weight) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	let sum: f64 = weights.iter().map(|(_, weight)| weight).sum();

	if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::Validation {
			message: format!("scoring weights must sum to 1.0 (got {sum})."),
		});
	}
	if scoring.max_results == 0 {
		return Err(Error::Validation {
			message: "scoring.max_results must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_preferences(prefs: &Preferences) -> Result<()> {
	if !prefs.max_distance_km.is_finite() || prefs.max_distance_km <= 0.0 {
		return Err(Error::Validation {
			message: "preferences.max_distance_km must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=100.0).contains(&prefs.min_transit) {
		return Err(Error::Validation {
			message: "preferences.min_transit must be in the range 0-100.".to_string(),
		});
	}
	if !(prefs.target_rent_to_income > 0.0 && prefs.target_rent_to_income < 1.0) {
		return Err(Error::Validation {
			message: "preferences.target_rent_to_income must be between 0 and 1.".to_string(),
		});
	}

	Ok(())
}

fn is_supported_property_type(value: &str) -> bool {
	matches!(value, "studio" | "1bed" | "2bed" | "3bed")
}

fn normalize(cfg: &mut Config) {
	if cfg.agent.session_id.as_deref().map(|id| id.trim().is_empty()).unwrap_or(false) {
		cfg.agent.session_id = None;
	}
	if cfg.dataset.remote_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
		cfg.dataset.remote_url = None;
	}
	if cfg.defaults.city.as_deref().map(|city| city.trim().is_empty()).unwrap_or(false) {
		cfg.defaults.city = None;
	}
	if let Some(mirror) = cfg.ledger.mirror.as_mut()
		&& mirror.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false)
	{
		mirror.api_key = None;
	}

	cfg.defaults.property_type = cfg.defaults.property_type.trim().to_lowercase();
}
