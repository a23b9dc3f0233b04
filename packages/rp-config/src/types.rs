use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub agent: Agent,
	pub providers: Providers,
	#[serde(default)]
	pub prompts: Prompts,
	pub dataset: Dataset,
	#[serde(default)]
	pub ledger: Ledger,
	#[serde(default)]
	pub preferences: Preferences,
	#[serde(default)]
	pub defaults: Defaults,
	#[serde(default)]
	pub scoring: Scoring,
	#[serde(default)]
	pub verify: Verify,
	#[serde(default)]
	pub nlu: Nlu,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Agent {
	/// Reported as `meta.agent_version`; bump when the envelope schema changes.
	pub agent_version: String,
	/// Optional. Pins every request to one ledger session instead of a fresh id per request.
	pub session_id: Option<String>,
}
impl Default for Agent {
	fn default() -> Self {
		Self { agent_version: "v2".to_string(), session_id: None }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub reasoning: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default = "default_planning_max_tokens")]
	pub planning_max_tokens: u32,
	#[serde(default = "default_finalize_max_tokens")]
	pub finalize_max_tokens: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Prompts {
	pub planning_path: Option<PathBuf>,
	pub finalize_path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetMode {
	#[default]
	Local,
	Remote,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Dataset {
	#[serde(default)]
	pub mode: DatasetMode,
	pub local_path: PathBuf,
	/// Required when `mode = "remote"`. Fetched once per process; the local snapshot is the
	/// fallback.
	pub remote_url: Option<String>,
	#[serde(default = "default_remote_timeout_ms")]
	pub remote_timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
	pub local_enabled: bool,
	pub local_path: PathBuf,
	pub mirror: Option<LedgerMirror>,
}
impl Default for Ledger {
	fn default() -> Self {
		Self { local_enabled: true, local_path: PathBuf::from("out/ledger.jsonl"), mirror: None }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct LedgerMirror {
	pub url: String,
	#[serde(default = "default_mirror_prefix")]
	pub prefix: String,
	pub api_key: Option<String>,
	#[serde(default = "default_mirror_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Preferences {
	pub max_distance_km: f64,
	pub min_transit: f64,
	pub target_rent_to_income: f64,
}
impl Default for Preferences {
	fn default() -> Self {
		Self { max_distance_km: 12.0, min_transit: 60.0, target_rent_to_income: 0.30 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Defaults {
	pub property_type: String,
	pub city: Option<String>,
}
impl Default for Defaults {
	fn default() -> Self {
		Self { property_type: "1bed".to_string(), city: None }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Scoring {
	pub affordability_weight: f64,
	pub transit_weight: f64,
	pub distance_weight: f64,
	pub max_results: u32,
}
impl Default for Scoring {
	fn default() -> Self {
		Self {
			affordability_weight: 0.5,
			transit_weight: 0.3,
			distance_weight: 0.2,
			max_results: 5,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Verify {
	/// Emit up to `max_hints` relaxation hints when a suggestion run comes back empty. When off,
	/// only the single nearest-miss hint is emitted.
	pub hints: bool,
	pub max_hints: u32,
	pub min_listing_to_median: f64,
	pub max_listing_to_median: f64,
}
impl Default for Verify {
	fn default() -> Self {
		Self { hints: true, max_hints: 3, min_listing_to_median: 0.3, max_listing_to_median: 3.0 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Nlu {
	pub cities: Vec<String>,
}
impl Default for Nlu {
	fn default() -> Self {
		Self {
			cities: [
				"Toronto",
				"Montreal",
				"Vancouver",
				"Ottawa",
				"Calgary",
				"Edmonton",
				"Winnipeg",
				"Quebec City",
				"Hamilton",
				"Mississauga",
				"Brampton",
				"Markham",
			]
			.into_iter()
			.map(str::to_string)
			.collect(),
		}
	}
}

fn default_planning_max_tokens() -> u32 {
	700
}

fn default_finalize_max_tokens() -> u32 {
	600
}

fn default_remote_timeout_ms() -> u64 {
	3_000
}

fn default_mirror_prefix() -> String {
	"ledger/".to_string()
}

fn default_mirror_timeout_ms() -> u64 {
	5_000
}
