mod error;

pub use error::{Error, Result};

use std::{
	env, fs,
	path::{Path, PathBuf},
};

use serde_json::Value;
use uuid::Uuid;

/// Three cities; Toronto is shaped so that `min_transit = 90` with `max_distance_km = 5` leaves
/// no candidate and Annex is the nearest miss.
pub const SAMPLE_SNAPSHOT_JSON: &str = include_str!("../fixtures/snapshot.json");
pub const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("../fixtures/config.template.toml");

const DATASET_PLACEHOLDER: &str = "{{DATASET_PATH}}";
const LEDGER_PLACEHOLDER: &str = "{{LEDGER_PATH}}";

/// A scratch directory removed on drop.
pub struct TestDir {
	path: PathBuf,
	cleaned: bool,
}
impl TestDir {
	pub fn new(prefix: &str) -> Result<Self> {
		let path = env::temp_dir().join(format!("rp_{prefix}_{}", Uuid::new_v4().simple()));

		fs::create_dir_all(&path)?;

		Ok(Self { path, cleaned: false })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn join(&self, name: &str) -> PathBuf {
		self.path.join(name)
	}

	pub fn cleanup(mut self) -> Result<()> {
		self.cleaned = true;

		fs::remove_dir_all(&self.path)?;

		Ok(())
	}
}
impl Drop for TestDir {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}
		if let Err(err) = fs::remove_dir_all(&self.path) {
			eprintln!("Test directory cleanup failed for {}: {err}.", self.path.display());
		}
	}
}

pub fn sample_snapshot_value() -> Result<Value> {
	Ok(serde_json::from_str(SAMPLE_SNAPSHOT_JSON)?)
}

/// Renders the config template against files inside `dir`. The snapshot is written to
/// `snapshot.json`; the ledger goes to `ledger.jsonl`.
pub fn sample_config_toml(dir: &TestDir) -> Result<String> {
	let dataset_path = dir.join("snapshot.json");

	fs::write(&dataset_path, SAMPLE_SNAPSHOT_JSON)?;

	Ok(SAMPLE_CONFIG_TEMPLATE_TOML
		.replace(DATASET_PLACEHOLDER, &toml_path(&dataset_path))
		.replace(LEDGER_PLACEHOLDER, &toml_path(&dir.join("ledger.jsonl"))))
}

/// Writes and loads the sample config through the regular validation path.
pub fn sample_config(dir: &TestDir) -> Result<rp_config::Config> {
	let config_path = dir.join("config.toml");

	fs::write(&config_path, sample_config_toml(dir)?)?;

	Ok(rp_config::load(&config_path)?)
}

pub fn read_lines(path: &Path) -> Result<Vec<Value>> {
	let raw = fs::read_to_string(path)?;

	raw.lines()
		.filter(|line| !line.trim().is_empty())
		.map(|line| serde_json::from_str(line).map_err(Error::from))
		.collect()
}

fn toml_path(path: &Path) -> String {
	path.display().to_string().replace('\\', "/")
}
