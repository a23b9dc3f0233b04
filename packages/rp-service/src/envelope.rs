use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rp_domain::{
	tool::{Answer, ToolInvocation},
	verify::Verification,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryRequest {
	pub query: String,
	#[serde(default)]
	pub session_id: Option<String>,
	/// Structured arguments; inline `key=value` tokens in `query` take precedence.
	#[serde(default)]
	pub args: Option<Map<String, Value>>,
}
impl QueryRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct Meta {
	pub model_id: String,
	pub agent_version: String,
	pub session_id: String,
}

/// The response shape. Every field is always present, degraded or not.
#[derive(Clone, Debug, Serialize)]
pub struct Envelope {
	pub plan: String,
	pub actions: Vec<ToolInvocation>,
	pub verify: Verification,
	pub answer: Answer,
	pub meta: Meta,
}
