//! Reference data: city and neighbourhood rent medians plus transit scores.
//!
//! A [`Snapshot`] is immutable once built. Loading and caching live in the storage crate; this
//! module only knows the shape and how to look things up.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const PROPERTY_TYPES: [&str; 4] = ["studio", "1bed", "2bed", "3bed"];

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LookupError {
	#[error("city not found: {city}")]
	CityNotFound { city: String },
	#[error("unsupported property type: {property_type}")]
	UnsupportedPropertyType { property_type: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SnapshotMeta {
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub snapshot_month: Option<String>,
	#[serde(default)]
	pub currency: Option<String>,
	#[serde(default)]
	pub property_types: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
	#[serde(default)]
	pub meta: SnapshotMeta,
	#[serde(default)]
	pub cities: BTreeMap<String, CityRecord>,
	/// Set by the loader when the snapshot came from the remote source.
	#[serde(skip)]
	pub live: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CityRecord {
	#[serde(default)]
	pub medians: BTreeMap<String, Option<f64>>,
	#[serde(default)]
	pub neighbourhoods: Vec<NeighbourhoodRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodRecord {
	pub name: String,
	#[serde(default)]
	pub median: BTreeMap<String, Option<f64>>,
	#[serde(default, deserialize_with = "deserialize_transit")]
	pub transit: u8,
	#[serde(default, deserialize_with = "deserialize_distance")]
	pub distance_km: f64,
}
impl NeighbourhoodRecord {
	pub fn median_for(&self, property_type: &str) -> Option<f64> {
		positive(self.median.get(property_type).copied().flatten())
	}
}

/// Snapshot provenance echoed into every tool result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
	pub currency: String,
	pub source: String,
	pub snapshot_month: String,
	pub live_mode: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct CityView<'a> {
	pub name: &'a str,
	pub record: &'a CityRecord,
}

impl Snapshot {
	pub fn from_value(value: Value) -> serde_json::Result<Self> {
		serde_json::from_value(value)
	}

	pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
		serde_json::from_slice(bytes)
	}

	pub fn info(&self) -> SnapshotInfo {
		SnapshotInfo {
			currency: self.meta.currency.clone().unwrap_or_else(|| "CAD/month".to_string()),
			source: self.meta.version.clone().unwrap_or_else(|| "static_json_v1".to_string()),
			snapshot_month: self
				.meta
				.snapshot_month
				.clone()
				.unwrap_or_else(|| "unknown".to_string()),
			live_mode: self.live,
		}
	}

	/// Case-insensitive city lookup returning the canonical key.
	pub fn city(&self, city: &str) -> Result<CityView<'_>, LookupError> {
		let wanted = city.trim();

		self.cities
			.iter()
			.find(|(name, _)| name.eq_ignore_ascii_case(wanted))
			.map(|(name, record)| CityView { name: name.as_str(), record })
			.ok_or_else(|| LookupError::CityNotFound { city: wanted.to_string() })
	}

	pub fn city_median(&self, city: &str, property_type: &str) -> Result<f64, LookupError> {
		let view = self.city(city)?;

		positive(view.record.medians.get(property_type).copied().flatten()).ok_or_else(|| {
			LookupError::UnsupportedPropertyType { property_type: property_type.to_string() }
		})
	}

	pub fn list_neighbourhoods(&self, city: &str) -> Result<&[NeighbourhoodRecord], LookupError> {
		Ok(self.city(city)?.record.neighbourhoods.as_slice())
	}

	pub fn property_types(&self) -> Vec<String> {
		self.meta
			.property_types
			.clone()
			.unwrap_or_else(|| PROPERTY_TYPES.iter().map(|value| value.to_string()).collect())
	}
}

fn positive(value: Option<f64>) -> Option<f64> {
	value.filter(|value| value.is_finite() && *value > 0.0)
}

fn deserialize_transit<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<Value>::deserialize(deserializer)?;

	Ok(raw.as_ref().and_then(number_like).map(normalize_transit).unwrap_or(0))
}

fn deserialize_distance<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<Value>::deserialize(deserializer)?;

	Ok(raw.as_ref().and_then(number_like).map(|value| value.max(0.0)).unwrap_or(0.0))
}

fn number_like(value: &Value) -> Option<f64> {
	let parsed = match value {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => text.trim().parse::<f64>().ok(),
		_ => None,
	};

	parsed.filter(|value| value.is_finite())
}

/// Clamps to 0-100 and rounds to the nearest whole score.
pub fn normalize_transit(value: f64) -> u8 {
	value.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transit_is_clamped_and_rounded() {
		let record: NeighbourhoodRecord = serde_json::from_value(serde_json::json!({
			"name": "Annex",
			"median": { "1bed": 2400 },
			"transit": 104.6,
			"distance_km": -2,
		}))
		.expect("record must parse");

		assert_eq!(record.transit, 100);
		assert_eq!(record.distance_km, 0.0);
	}

	#[test]
	fn string_and_missing_transit_values_are_tolerated() {
		let record: NeighbourhoodRecord = serde_json::from_value(serde_json::json!({
			"name": "Annex",
			"transit": "71.4",
		}))
		.expect("record must parse");

		assert_eq!(record.transit, 71);
		assert_eq!(record.median_for("1bed"), None);

		let record: NeighbourhoodRecord =
			serde_json::from_value(serde_json::json!({ "name": "Annex", "transit": null }))
				.expect("record must parse");

		assert_eq!(record.transit, 0);
	}

	#[test]
	fn non_positive_medians_are_absent() {
		let record: NeighbourhoodRecord = serde_json::from_value(serde_json::json!({
			"name": "Annex",
			"median": { "1bed": 0, "2bed": null, "studio": 1800 },
		}))
		.expect("record must parse");

		assert_eq!(record.median_for("1bed"), None);
		assert_eq!(record.median_for("2bed"), None);
		assert_eq!(record.median_for("studio"), Some(1800.0));
	}
}
