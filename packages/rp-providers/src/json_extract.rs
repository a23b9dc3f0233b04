//! Lenient parsing of reasoning-service replies.
//!
//! Replies are supposed to be a single JSON object but regularly arrive wrapped in code fences
//! or surrounded by prose. [`extract_first_json`] recovers the first well-formed object; the typed
//! parsers return `None` when nothing usable is found so callers can fall back deterministically.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const UNPARSED_PLAN_LIMIT: usize = 2_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
	pub tool: String,
	#[serde(default)]
	pub args: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedPlan {
	pub plan: String,
	pub actions: Vec<PlannedAction>,
}
impl ParsedPlan {
	/// Used when the planning reply could not be parsed or the call failed.
	pub fn fallback(raw: &str) -> Self {
		let trimmed = raw.trim();
		let plan = if trimmed.is_empty() {
			"No plan returned".to_string()
		} else {
			format!("(unparsed) {}", truncate_chars(trimmed, UNPARSED_PLAN_LIMIT))
		};

		Self { plan, actions: Vec::new() }
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedFinal {
	pub plan: Option<String>,
	pub summary: Option<String>,
	/// Whatever the model proposed; recorded for audit only.
	pub verify: Option<Value>,
}

pub fn extract_first_json(text: &str) -> Option<Value> {
	let trimmed = strip_fences(text.trim());

	if trimmed.starts_with('{')
		&& trimmed.ends_with('}')
		&& let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed)
	{
		return Some(value);
	}

	trimmed.char_indices().filter(|(_, ch)| *ch == '{').find_map(|(start, _)| {
		let end = balanced_end(&trimmed[start..])?;

		match serde_json::from_str::<Value>(&trimmed[start..start + end]) {
			Ok(value @ Value::Object(_)) => Some(value),
			_ => None,
		}
	})
}

pub fn parse_plan(text: &str) -> Option<ParsedPlan> {
	let Value::Object(object) = extract_first_json(text)? else {
		return None;
	};
	let plan = object
		.get("plan")
		.and_then(Value::as_str)
		.map(str::to_string)
		.unwrap_or_else(|| "No plan returned".to_string());
	let actions = match object.get("actions") {
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(|item| serde_json::from_value::<PlannedAction>(item.clone()).ok())
			.collect(),
		_ => Vec::new(),
	};

	Some(ParsedPlan { plan, actions })
}

pub fn parse_final(text: &str) -> Option<ParsedFinal> {
	let Value::Object(object) = extract_first_json(text)? else {
		return None;
	};
	let summary = match object.get("answer") {
		Some(Value::String(summary)) => Some(summary.clone()),
		Some(Value::Object(answer)) => answer
			.get("summary")
			.or_else(|| answer.get("message"))
			.and_then(Value::as_str)
			.map(str::to_string),
		_ => None,
	}
	.filter(|summary| !summary.trim().is_empty());

	Some(ParsedFinal {
		plan: object.get("plan").and_then(Value::as_str).map(str::to_string),
		summary,
		verify: object.get("verify").filter(|verify| verify.is_object()).cloned(),
	})
}

fn strip_fences(text: &str) -> &str {
	let Some(rest) = text.strip_prefix("```") else {
		return text;
	};
	let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
	let rest = rest.trim_start();

	rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Byte length of the balanced object starting at `text[0] == '{'`, ignoring braces in strings.
fn balanced_end(text: &str) -> Option<usize> {
	let mut depth = 0_usize;
	let mut in_string = false;
	let mut escaped = false;

	for (offset, ch) in text.char_indices() {
		if in_string {
			match ch {
				_ if escaped => escaped = false,
				'\\' => escaped = true,
				'"' => in_string = false,
				_ => {},
			}

			continue;
		}

		match ch {
			'"' => in_string = true,
			'{' => depth += 1,
			'}' => {
				depth = depth.checked_sub(1)?;

				if depth == 0 {
					return Some(offset + 1);
				}
			},
			_ => {},
		}
	}

	None
}

fn truncate_chars(text: &str, limit: usize) -> &str {
	match text.char_indices().nth(limit) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn braces_inside_strings_do_not_close_the_object() {
		let text = r#"Sure! {"plan": "use {city} then }", "actions": []} trailing"#;
		let value = extract_first_json(text).expect("object");

		assert_eq!(value["plan"], "use {city} then }");
	}

	#[test]
	fn truncation_respects_char_boundaries() {
		assert_eq!(truncate_chars("héllo", 2), "hé");
		assert_eq!(truncate_chars("hi", 5), "hi");
	}
}
