//! Append-only audit ledger: one JSON object per line, optionally mirrored.
//!
//! Nothing here can fail a request. Local write errors and mirror errors are logged and reported
//! on the returned [`LedgerReceipt`] only.

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use serde::Serialize;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex, task::JoinHandle};
use uuid::Uuid;

use crate::{
	Error, Result,
	mirror::{HttpMirror, LedgerMirror},
};

const ENTRY_KIND: &str = "entry";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Planning,
	ToolExecute,
	Finalize,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Planning => "planning",
			Self::ToolExecute => "tool_execute",
			Self::Finalize => "finalize",
		}
	}
}

/// Per-request identity stamped onto every record.
#[derive(Clone, Debug)]
pub struct LedgerContext {
	pub session_id: String,
	pub agent_version: String,
	pub model_id: String,
	pub user_query: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LedgerRecord<'a> {
	pub ts: String,
	pub session_id: &'a str,
	pub agent_version: &'a str,
	pub model_id: &'a str,
	pub user_query: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stage: Option<Stage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub kind: Option<&'static str>,
	pub payload: &'a Value,
}

#[derive(Debug, Default)]
pub struct LedgerReceipt {
	pub local_path: Option<PathBuf>,
	pub local_error: Option<String>,
	pub mirror_key: Option<String>,
	/// Handle to the spawned mirror write. The request path never awaits it.
	pub mirror_task: Option<JoinHandle<()>>,
}

struct LocalSink {
	path: PathBuf,
	guard: Mutex<()>,
}

pub struct Ledger {
	local: Option<LocalSink>,
	mirror: Option<Arc<dyn LedgerMirror>>,
	mirror_prefix: String,
}
impl Ledger {
	pub fn from_config(cfg: &rp_config::Ledger) -> Result<Self> {
		let mut ledger = Self::disabled();

		if cfg.local_enabled {
			ledger = ledger.with_local(cfg.local_path.clone());
		}
		if let Some(mirror_cfg) = cfg.mirror.as_ref() {
			ledger.mirror = Some(Arc::new(HttpMirror::new(mirror_cfg)?));
			ledger.mirror_prefix = mirror_cfg.prefix.clone();
		}

		Ok(ledger)
	}

	pub fn disabled() -> Self {
		Self { local: None, mirror: None, mirror_prefix: String::new() }
	}

	pub fn with_local(mut self, path: PathBuf) -> Self {
		self.local = Some(LocalSink { path, guard: Mutex::new(()) });

		self
	}

	pub fn with_mirror(mut self, mirror: Arc<dyn LedgerMirror>, prefix: impl Into<String>) -> Self {
		self.mirror = Some(mirror);
		self.mirror_prefix = prefix.into();

		self
	}

	pub fn local_path(&self) -> Option<&Path> {
		self.local.as_ref().map(|sink| sink.path.as_path())
	}

	pub async fn write_step(&self, ctx: &LedgerContext, stage: Stage, payload: &Value) -> LedgerReceipt {
		self.write(ctx, Some(stage), payload).await
	}

	/// The canonical full-result record, written once the envelope is final.
	pub async fn write_entry(&self, ctx: &LedgerContext, payload: &Value) -> LedgerReceipt {
		self.write(ctx, None, payload).await
	}

	async fn write(&self, ctx: &LedgerContext, stage: Option<Stage>, payload: &Value) -> LedgerReceipt {
		let now = OffsetDateTime::now_utc();
		let record = LedgerRecord {
			ts: now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string()),
			session_id: &ctx.session_id,
			agent_version: &ctx.agent_version,
			model_id: &ctx.model_id,
			user_query: &ctx.user_query,
			stage,
			kind: stage.is_none().then_some(ENTRY_KIND),
			payload,
		};
		let line = match serde_json::to_string(&record) {
			Ok(line) => line,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to serialize ledger record.");

				return LedgerReceipt { local_error: Some(err.to_string()), ..Default::default() };
			},
		};
		let mut receipt = LedgerReceipt::default();

		if let Some(sink) = self.local.as_ref() {
			receipt.local_path = Some(sink.path.clone());

			if let Err(err) = append_line(sink, &line).await {
				tracing::warn!(path = %sink.path.display(), error = %err, "Ledger local write failed.");

				receipt.local_error = Some(err.to_string());
			}
		}
		if let Some(mirror) = self.mirror.as_ref() {
			let label = stage.map(Stage::as_str).unwrap_or(ENTRY_KIND);
			let key = format!(
				"{}{}/{}-{}-{}.json",
				self.mirror_prefix,
				ctx.session_id,
				now.unix_timestamp_nanos(),
				label,
				Uuid::new_v4().simple()
			);

			receipt.mirror_task = spawn_mirror(mirror.clone(), key.clone(), line.into_bytes());
			receipt.mirror_key = Some(key);
		}

		receipt
	}
}

async fn append_line(sink: &LocalSink, line: &str) -> Result<()> {
	let io_err = |source| Error::Io { path: sink.path.clone(), source };
	let _guard = sink.guard.lock().await;

	if let Some(parent) = sink.path.parent()
		&& !parent.as_os_str().is_empty()
	{
		tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
	}

	let mut file =
		OpenOptions::new().create(true).append(true).open(&sink.path).await.map_err(io_err)?;
	let mut buf = Vec::with_capacity(line.len() + 1);

	buf.extend_from_slice(line.as_bytes());
	buf.push(b'\n');

	file.write_all(&buf).await.map_err(io_err)?;
	file.flush().await.map_err(io_err)?;

	Ok(())
}

fn spawn_mirror(mirror: Arc<dyn LedgerMirror>, key: String, body: Vec<u8>) -> Option<JoinHandle<()>> {
	let Ok(handle) = tokio::runtime::Handle::try_current() else {
		tracing::warn!(key, "No async runtime available. Skipping ledger mirror write.");

		return None;
	};

	Some(handle.spawn(async move {
		if let Err(err) = mirror.put(&key, body).await {
			tracing::warn!(key, error = %err, "Ledger mirror write failed.");
		}
	}))
}
