//! OpenAI-compatible chat completion client for the planning and finalize calls.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// One retry on timeout, nothing else.
const MAX_ATTEMPTS: u32 = 2;

pub async fn complete(
	cfg: &rp_config::LlmProviderConfig,
	system: &str,
	user: &str,
	max_tokens: u32,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": max_tokens,
		"messages": [
			{ "role": "system", "content": system },
			{ "role": "user", "content": user },
		],
	});

	for attempt in 1..=MAX_ATTEMPTS {
		match send_once(&client, &url, cfg, &body).await {
			Ok(json) => return parse_completion(&json),
			Err(err) if err.is_timeout() && attempt < MAX_ATTEMPTS => {
				tracing::warn!(attempt, "Reasoning call timed out. Retrying once.");
			},
			Err(err) if err.is_timeout() => return Err(Error::Timeout { attempts: attempt }),
			Err(err) => return Err(err),
		}
	}

	Err(Error::Timeout { attempts: MAX_ATTEMPTS })
}

/// One request, body read included; the client timeout covers both.
async fn send_once(
	client: &Client,
	url: &str,
	cfg: &rp_config::LlmProviderConfig,
	body: &Value,
) -> Result<Value> {
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(body)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

/// User turn for the planning call.
pub fn planning_payload(query: &str, args: &Map<String, Value>) -> String {
	serde_json::json!({ "query": query, "args": args }).to_string()
}

/// User turn for the finalize call; the tool result is echoed so the model cannot drift from it.
pub fn finalize_payload(query: &str, plan: &str, actions: &Value, tool_result: &Value) -> String {
	serde_json::json!({
		"query": query,
		"plan": plan,
		"actions": actions,
		"tool_result": tool_result,
	})
	.to_string()
}

fn parse_completion(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"));

	match content {
		Some(Value::String(text)) => Ok(text.clone()),
		// Some gateways return content blocks instead of a plain string.
		Some(Value::Array(blocks)) => Ok(blocks
			.iter()
			.filter_map(|block| block.get("text").and_then(Value::as_str))
			.collect::<String>()),
		_ => Err(Error::InvalidResponse {
			message: "Reasoning response is missing message content.".to_string(),
		}),
	}
}
