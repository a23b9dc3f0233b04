pub mod envelope;
pub mod query;
pub mod selftest;

mod error;

pub use envelope::{Envelope, Meta, QueryRequest};
pub use error::{Error, Result};
pub use selftest::{DatasetHealth, SelfTestReport, ToolCheck};

use std::{future::Future, pin::Pin, sync::Arc};

use rp_config::{Config, LlmProviderConfig};
use rp_providers::{prompts::PromptSet, reasoning};
use rp_storage::{dataset::DatasetProvider, ledger::Ledger};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ReasoningProvider
where
	Self: Send + Sync,
{
	/// One chat completion; returns the raw assistant text.
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
		max_tokens: u32,
	) -> BoxFuture<'a, rp_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub reasoning: Arc<dyn ReasoningProvider>,
}
impl Providers {
	pub fn new(reasoning: Arc<dyn ReasoningProvider>) -> Self {
		Self { reasoning }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { reasoning: Arc::new(DefaultProviders) }
	}
}

struct DefaultProviders;
impl ReasoningProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
		max_tokens: u32,
	) -> BoxFuture<'a, rp_providers::Result<String>> {
		Box::pin(reasoning::complete(cfg, system, user, max_tokens))
	}
}

pub struct RentPilotService {
	pub cfg: Config,
	pub dataset: Arc<DatasetProvider>,
	pub ledger: Arc<Ledger>,
	pub providers: Providers,
	pub prompts: PromptSet,
}
impl RentPilotService {
	pub fn new(cfg: Config) -> Result<Self> {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Result<Self> {
		let dataset = Arc::new(DatasetProvider::new(cfg.dataset.clone()));
		let ledger = Arc::new(Ledger::from_config(&cfg.ledger)?);
		let prompts = PromptSet::load(&cfg.prompts)?;

		Ok(Self { cfg, dataset, ledger, providers, prompts })
	}

	/// Swaps the ledger, e.g. to run without persistence.
	pub fn with_ledger(mut self, ledger: Ledger) -> Self {
		self.ledger = Arc::new(ledger);

		self
	}
}
