//! Query parsing and enrichment.
//!
//! A raw query may carry an inline argument tail after `::`, for example
//! `is this affordable? :: listing_price=2200 income_annual=80k prefs={min_transit:80}`.
//! Free text is scanned for a known city and a property type; explicit arguments always win
//! over those hints.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::prefs::Preferences;

const INLINE_SEPARATOR: &str = "::";

const PROPERTY_PATTERNS: [(&str, &str); 4] = [
	(r"(?i)\b(?:studio|bachelor)s?\b", "studio"),
	(r"(?i)\b(?:1|one)[\s-]*(?:bed(?:room)?s?|br|bd)\b", "1bed"),
	(r"(?i)\b(?:2|two)[\s-]*(?:bed(?:room)?s?|br|bd)\b", "2bed"),
	(r"(?i)\b(?:3|three)[\s-]*(?:bed(?:room)?s?|br|bd)\b", "3bed"),
];

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Hints {
	pub city: Option<String>,
	pub property_type: Option<String>,
}

/// Built once per request and never mutated afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct QueryContext {
	pub raw: String,
	pub text: String,
	pub args: Map<String, Value>,
	pub hints: Hints,
	pub prefs: Preferences,
}
impl QueryContext {
	pub fn parse(raw: &str, cfg: &rp_config::Config) -> Self {
		Self::build(raw, &Map::new(), cfg)
	}

	/// `request_args` come from a structured caller; inline tokens in the query override them.
	pub fn build(raw: &str, request_args: &Map<String, Value>, cfg: &rp_config::Config) -> Self {
		let (text, inline_args) = parse_inline_args(raw);
		let mut args = request_args.clone();

		args.extend(inline_args);

		let hints = Hints {
			city: detect_city(&text, &cfg.nlu.cities),
			property_type: detect_property_type(&text).map(str::to_string),
		};

		if !args.contains_key("city")
			&& let Some(city) = hints.city.as_ref()
		{
			args.insert("city".to_string(), Value::String(city.clone()));
		}
		if !args.contains_key("property_type")
			&& let Some(property_type) = hints.property_type.as_ref()
		{
			args.insert("property_type".to_string(), Value::String(property_type.clone()));
		}
		if let Some(Value::String(property_type)) = args.get_mut("property_type") {
			*property_type = normalize_property_type(property_type);
		}

		let overrides = match args.remove("prefs") {
			Some(Value::Object(map)) => map,
			Some(Value::String(blob)) => lenient_json_object(&blob).unwrap_or_default(),
			_ => Map::new(),
		};
		let prefs = Preferences::from_config(&cfg.preferences).merged(&overrides);

		Self { raw: raw.to_string(), text, args, hints, prefs }
	}

	/// Free text followed by `key=value` for every argument, so structured arguments count as
	/// evidence for intent rules the same way inline tokens do.
	pub fn classification_text(&self) -> String {
		let mut out = self.text.clone();

		for (key, value) in &self.args {
			let rendered = match value {
				Value::String(text) => text.clone(),
				other => other.to_string(),
			};

			out.push(' ');
			out.push_str(key);
			out.push('=');
			out.push_str(&rendered);
		}

		out
	}
}

/// Splits `head :: k=v k=v` into the trimmed head and the parsed arguments.
pub fn parse_inline_args(query: &str) -> (String, Map<String, Value>) {
	let mut args = Map::new();
	let Some((head, tail)) = query.split_once(INLINE_SEPARATOR) else {
		return (query.trim().to_string(), args);
	};
	let (tail, prefs_blob) = take_prefs_blob(tail);

	if let Some(prefs) = prefs_blob.as_deref().and_then(lenient_json_object) {
		args.insert("prefs".to_string(), Value::Object(prefs));
	}

	for token in tail.split_whitespace() {
		let Some((key, value)) = token.split_once('=') else {
			continue;
		};
		let key = key.trim();

		if key.is_empty() {
			continue;
		}
		if key == "prefs" {
			if let Some(prefs) = lenient_json_object(value) {
				args.insert("prefs".to_string(), Value::Object(prefs));
			}

			continue;
		}

		args.insert(key.to_string(), parse_scalar(value.trim()));
	}

	(head.trim().to_string(), args)
}

/// Parses loose object syntax such as `{min_transit:90, 'target_rent_to_income':0.33}`.
pub fn lenient_json_object(raw: &str) -> Option<Map<String, Value>> {
	let trimmed = raw.trim();

	if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
		return None;
	}
	if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
		return Some(map);
	}

	let quoted_keys = Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)(\s*:)"#)
		.ok()?
		.replace_all(trimmed, r#"$1"$2"$3"#)
		.replace('\'', "\"");

	match serde_json::from_str::<Value>(&quoted_keys) {
		Ok(Value::Object(map)) => Some(map),
		_ => None,
	}
}

pub fn detect_city(text: &str, cities: &[String]) -> Option<String> {
	cities
		.iter()
		.find(|city| {
			let pattern = format!(r"(?i)\b{}\b", regex::escape(city.trim()));

			Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
		})
		.map(|city| city.trim().to_string())
}

pub fn detect_property_type(text: &str) -> Option<&'static str> {
	PROPERTY_PATTERNS.iter().find_map(|(pattern, normalized)| {
		Regex::new(pattern).ok().filter(|re| re.is_match(text)).map(|_| *normalized)
	})
}

fn normalize_property_type(raw: &str) -> String {
	let lowered = raw.trim().to_lowercase();

	match lowered.as_str() {
		"studio" | "1bed" | "2bed" | "3bed" => lowered,
		_ => detect_property_type(&lowered).map(str::to_string).unwrap_or(lowered),
	}
}

fn take_prefs_blob(tail: &str) -> (String, Option<String>) {
	let Some(found) = Regex::new(r"prefs\s*=\s*\{").ok().and_then(|re| re.find(tail)) else {
		return (tail.to_string(), None);
	};
	let open = found.end() - 1;
	let mut depth = 0_usize;

	for (offset, ch) in tail[open..].char_indices() {
		match ch {
			'{' => depth += 1,
			'}' => {
				depth -= 1;

				if depth == 0 {
					let close = open + offset;
					let rest = format!("{} {}", &tail[..found.start()], &tail[close + 1..]);

					return (rest, Some(tail[open..=close].to_string()));
				}
			},
			_ => {},
		}
	}

	(tail.to_string(), None)
}

fn parse_scalar(raw: &str) -> Value {
	match raw.to_ascii_lowercase().as_str() {
		"null" | "none" => return Value::Null,
		"true" => return Value::Bool(true),
		"false" => return Value::Bool(false),
		_ => {},
	}

	parse_amount(raw).map(number_value).unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Accepts `2200`, `$2,200`, `0.3` and `80k`.
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
	let cleaned = raw.trim_start_matches('$').replace(',', "");
	let (digits, scale) = match cleaned.strip_suffix(['k', 'K']) {
		Some(digits) => (digits, 1_000.0),
		None => (cleaned.as_str(), 1.0),
	};

	if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit() || ch == '.') {
		return None;
	}

	digits.parse::<f64>().ok().filter(|value| value.is_finite()).map(|value| value * scale)
}

fn number_value(value: f64) -> Value {
	if value.fract() == 0.0 && value.abs() < 1e15 {
		return Value::from(value as i64);
	}

	Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefs_blob_with_spaces_is_extracted() {
		let (text, args) = parse_inline_args(
			"suggest areas :: city=Toronto prefs={min_transit: 90, max_distance_km: 5} income_annual=80k",
		);

		assert_eq!(text, "suggest areas");
		assert_eq!(args.get("city"), Some(&Value::String("Toronto".to_string())));
		assert_eq!(args.get("income_annual"), Some(&serde_json::json!(80000)));
		assert_eq!(args.get("prefs"), Some(&serde_json::json!({ "min_transit": 90, "max_distance_km": 5 })));
	}

	#[test]
	fn scalars_are_typed() {
		assert_eq!(parse_scalar("null"), Value::Null);
		assert_eq!(parse_scalar("$2,200"), serde_json::json!(2200));
		assert_eq!(parse_scalar("0.3"), serde_json::json!(0.3));
		assert_eq!(parse_scalar("1bed"), Value::String("1bed".to_string()));
	}

	#[test]
	fn unmatched_prefs_brace_leaves_tail_untouched() {
		let (tail, blob) = take_prefs_blob(" prefs={min_transit:90 city=Toronto");

		assert!(blob.is_none());
		assert!(tail.contains("city=Toronto"));
	}
}
