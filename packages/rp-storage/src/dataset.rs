//! Dataset Provider: loads the reference snapshot once per process and serves lookups.
//!
//! `remote` mode fetches the snapshot over HTTP and falls back to the local file when the fetch
//! fails. The cache is a `OnceCell`, so concurrent first callers trigger a single load.

use std::{path::Path, sync::Arc, time::Duration};

use reqwest::Client;
use tokio::sync::OnceCell;

use rp_config::DatasetMode;
use rp_domain::dataset::{LookupError, NeighbourhoodRecord, Snapshot};

use crate::{Error, Result};

/// Lookup failures keep "unknown city" apart from "could not load data at all".
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
	#[error(transparent)]
	Lookup(#[from] LookupError),
	#[error("Dataset unavailable: {message}")]
	Unavailable { message: String },
}
impl DatasetError {
	pub fn is_city_not_found(&self) -> bool {
		matches!(self, Self::Lookup(LookupError::CityNotFound { .. }))
	}
}
impl From<Error> for DatasetError {
	fn from(err: Error) -> Self {
		Self::Unavailable { message: err.to_string() }
	}
}

pub struct DatasetProvider {
	cfg: rp_config::Dataset,
	cell: OnceCell<Arc<Snapshot>>,
}
impl DatasetProvider {
	pub fn new(cfg: rp_config::Dataset) -> Self {
		Self { cfg, cell: OnceCell::new() }
	}

	/// A provider that never touches the filesystem or network.
	pub fn from_snapshot(snapshot: Snapshot) -> Self {
		let cfg = rp_config::Dataset {
			mode: DatasetMode::Local,
			local_path: "<in-memory>".into(),
			remote_url: None,
			remote_timeout_ms: 0,
		};

		Self { cfg, cell: OnceCell::new_with(Some(Arc::new(snapshot))) }
	}

	pub fn is_loaded(&self) -> bool {
		self.cell.initialized()
	}

	pub async fn snapshot(&self) -> Result<Arc<Snapshot>> {
		self.cell.get_or_try_init(|| load(&self.cfg)).await.cloned()
	}

	pub async fn city_median(
		&self,
		city: &str,
		property_type: &str,
	) -> std::result::Result<f64, DatasetError> {
		Ok(self.snapshot().await?.city_median(city, property_type)?)
	}

	pub async fn list_neighbourhoods(
		&self,
		city: &str,
	) -> std::result::Result<Vec<NeighbourhoodRecord>, DatasetError> {
		Ok(self.snapshot().await?.list_neighbourhoods(city)?.to_vec())
	}
}

async fn load(cfg: &rp_config::Dataset) -> Result<Arc<Snapshot>> {
	if cfg.mode == DatasetMode::Remote
		&& let Some(url) = cfg.remote_url.as_deref()
	{
		match fetch_remote(url, cfg.remote_timeout_ms).await {
			Ok(mut snapshot) => {
				snapshot.live = true;

				tracing::info!(url, cities = snapshot.cities.len(), "Loaded remote dataset snapshot.");

				return Ok(Arc::new(snapshot));
			},
			Err(err) => {
				tracing::warn!(url, error = %err, "Remote dataset fetch failed. Falling back to local snapshot.");
			},
		}
	}

	let snapshot = load_local(&cfg.local_path).await?;

	tracing::info!(
		path = %cfg.local_path.display(),
		cities = snapshot.cities.len(),
		"Loaded local dataset snapshot."
	);

	Ok(Arc::new(snapshot))
}

async fn fetch_remote(url: &str, timeout_ms: u64) -> Result<Snapshot> {
	let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
	let bytes = client.get(url).send().await?.error_for_status()?.bytes().await?;

	Ok(Snapshot::from_slice(&bytes)?)
}

async fn load_local(path: &Path) -> Result<Snapshot> {
	let bytes = tokio::fs::read(path)
		.await
		.map_err(|err| Error::Unavailable { message: format!("{}: {err}", path.display()) })?;

	Snapshot::from_slice(&bytes).map_err(|err| Error::Unavailable {
		message: format!("{} is not a valid snapshot: {err}", path.display()),
	})
}
