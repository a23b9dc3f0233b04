//! Secondary ledger store. Writes are best-effort; callers log failures and move on.

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, CONTENT_TYPE},
};

use crate::{BoxFuture, Error, Result};

pub trait LedgerMirror
where
	Self: Send + Sync,
{
	/// Stores one object under `key`. Keys are unique per record; objects are never overwritten.
	fn put<'a>(&'a self, key: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<()>>;
}

/// Object-store style mirror: `PUT {url}/{key}` with a JSON body.
pub struct HttpMirror {
	client: Client,
	url: String,
	api_key: Option<String>,
}
impl HttpMirror {
	pub fn new(cfg: &rp_config::LedgerMirror) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			url: cfg.url.trim_end_matches('/').to_string(),
			api_key: cfg.api_key.clone(),
		})
	}

	async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
		let mut req = self
			.client
			.put(format!("{}/{}", self.url, key))
			.header(CONTENT_TYPE, "application/json")
			.body(body);

		if let Some(api_key) = self.api_key.as_deref() {
			req = req.header(AUTHORIZATION, format!("Bearer {api_key}"));
		}

		let res = req.send().await?;
		let status = res.status();

		if !status.is_success() {
			return Err(Error::Mirror { message: format!("{key} rejected with status {status}.") });
		}

		Ok(())
	}
}
impl LedgerMirror for HttpMirror {
	fn put<'a>(&'a self, key: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.put_object(key, body))
	}
}
