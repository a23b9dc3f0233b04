use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Merged search preferences. `None` means the user explicitly disabled that constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
	pub max_distance_km: Option<f64>,
	pub min_transit: Option<f64>,
	pub target_rent_to_income: f64,
}
impl Preferences {
	pub fn from_config(cfg: &rp_config::Preferences) -> Self {
		Self {
			max_distance_km: Some(cfg.max_distance_km),
			min_transit: Some(cfg.min_transit),
			target_rent_to_income: cfg.target_rent_to_income,
		}
	}

	/// Overlays user values onto the defaults. Unknown keys and unusable values are ignored;
	/// `null` disables the distance and transit filters. The target ratio cannot be disabled.
	pub fn merged(mut self, overrides: &Map<String, Value>) -> Self {
		for (key, value) in overrides {
			match key.as_str() {
				"max_distance_km" => match value {
					Value::Null => self.max_distance_km = None,
					other => {
						if let Some(km) = number(other).filter(|km| *km >= 0.0) {
							self.max_distance_km = Some(km);
						}
					},
				},
				"min_transit" => match value {
					Value::Null => self.min_transit = None,
					other => {
						if let Some(score) = number(other) {
							self.min_transit = Some(score.clamp(0.0, 100.0));
						}
					},
				},
				"target_rent_to_income" => {
					if let Some(ratio) = number(value).filter(|ratio| *ratio > 0.0 && *ratio < 1.0)
					{
						self.target_rent_to_income = ratio;
					}
				},
				_ => {},
			}
		}

		self
	}
}

pub(crate) fn number(value: &Value) -> Option<f64> {
	let parsed = match value {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => text.trim().replace(',', "").parse::<f64>().ok(),
		_ => None,
	};

	parsed.filter(|value| value.is_finite())
}
