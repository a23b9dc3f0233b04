use serde::Serialize;

use crate::dataset::SnapshotInfo;

/// Relative gap to the city median that still counts as "near market".
pub const MARKET_BAND: f64 = 0.02;
/// RTI up to this multiple of the target is "slightly above ideal".
pub const SLIGHTLY_ABOVE_FACTOR: f64 = 1.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPosition {
	Below,
	Near,
	Above,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RtiBand {
	WithinIdeal,
	SlightlyAboveIdeal,
	WellAboveIdeal,
}
impl RtiBand {
	pub fn phrase(self) -> &'static str {
		match self {
			Self::WithinIdeal => "within ideal",
			Self::SlightlyAboveIdeal => "slightly above ideal",
			Self::WellAboveIdeal => "well above ideal",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffordabilityInput {
	pub listing_price: f64,
	pub city_median: f64,
	pub income_annual: f64,
	pub target_ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AffordabilityReport {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
	pub property_type: String,
	pub listing_price: f64,
	pub city_median: f64,
	pub income_annual: f64,
	pub target_ratio: f64,
	#[serde(flatten)]
	pub metrics: Metrics,
	#[serde(flatten)]
	pub snapshot: SnapshotInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metrics {
	pub income_monthly: f64,
	pub rti: f64,
	pub delta: f64,
	pub delta_pct: f64,
	pub listing_to_median: f64,
	pub market_position: MarketPosition,
	pub rti_band: RtiBand,
	pub verdict: String,
}

/// Inputs must already be validated as positive and finite.
pub fn evaluate(input: &AffordabilityInput) -> Metrics {
	let income_monthly = input.income_annual / 12.0;
	let rti = input.listing_price / income_monthly;
	let delta = input.listing_price - input.city_median;
	let delta_pct = delta / input.city_median;
	let market_position = if delta_pct > MARKET_BAND {
		MarketPosition::Above
	} else if delta_pct < -MARKET_BAND {
		MarketPosition::Below
	} else {
		MarketPosition::Near
	};
	let rti_band = if rti <= input.target_ratio {
		RtiBand::WithinIdeal
	} else if rti <= input.target_ratio * SLIGHTLY_ABOVE_FACTOR {
		RtiBand::SlightlyAboveIdeal
	} else {
		RtiBand::WellAboveIdeal
	};
	let verdict = verdict(delta, delta_pct, market_position, rti, rti_band, input.target_ratio);

	Metrics {
		income_monthly,
		rti,
		delta,
		delta_pct,
		listing_to_median: input.listing_price / input.city_median,
		market_position,
		rti_band,
		verdict,
	}
}

fn verdict(
	delta: f64,
	delta_pct: f64,
	market: MarketPosition,
	rti: f64,
	band: RtiBand,
	target: f64,
) -> String {
	let market = match market {
		MarketPosition::Below =>
			format!("Below market by ${:.0}/mo ({:.1}%)", delta.abs(), delta_pct * 100.0),
		MarketPosition::Above =>
			format!("Above market by ${delta:.0}/mo (+{:.1}%)", delta_pct * 100.0),
		MarketPosition::Near => "Near market".to_string(),
	};

	format!(
		"{market}; rent-to-income {:.0}% is {} (target {:.0}%)",
		rti * 100.0,
		band.phrase(),
		target * 100.0
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn band_edges() {
		let at_target = evaluate(&AffordabilityInput {
			listing_price: 2_400.0,
			city_median: 2_400.0,
			income_annual: 96_000.0,
			target_ratio: 0.30,
		});

		assert_eq!(at_target.rti_band, RtiBand::WithinIdeal);
		assert_eq!(at_target.market_position, MarketPosition::Near);

		let far = evaluate(&AffordabilityInput {
			listing_price: 3_600.0,
			city_median: 2_000.0,
			income_annual: 96_000.0,
			target_ratio: 0.30,
		});

		assert_eq!(far.rti_band, RtiBand::WellAboveIdeal);
		assert_eq!(far.market_position, MarketPosition::Above);
		assert!(far.verdict.starts_with("Above market by $1600/mo (+80.0%)"));
	}
}
