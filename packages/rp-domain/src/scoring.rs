//! Neighbourhood ranking for `suggest_neighbourhoods`.
//!
//! Pure: the same snapshot, preferences and weights always produce the same ranking.

use std::cmp::Ordering;

use rp_config::WEIGHT_SUM_TOLERANCE;
use serde::Serialize;

use crate::{
	dataset::{NeighbourhoodRecord, SnapshotInfo},
	prefs::Preferences,
};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ScoringError {
	#[error("Invalid scoring weights: {message}")]
	InvalidWeights { message: String },
	#[error("income_annual must be a positive number.")]
	InvalidIncome,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScoringWeights {
	affordability: f64,
	transit: f64,
	distance: f64,
}
impl ScoringWeights {
	pub fn new(affordability: f64, transit: f64, distance: f64) -> Result<Self, ScoringError> {
		for (label, weight) in
			[("affordability", affordability), ("transit", transit), ("distance", distance)]
		{
			if !weight.is_finite() || weight < 0.0 {
				return Err(ScoringError::InvalidWeights {
					message: format!("{label} weight must be a non-negative number (got {weight})."),
				});
			}
		}

		let sum = affordability + transit + distance;

		if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
			return Err(ScoringError::InvalidWeights {
				message: format!("weights must sum to 1.0 (got {sum})."),
			});
		}

		Ok(Self { affordability, transit, distance })
	}

	pub fn from_config(cfg: &rp_config::Scoring) -> Result<Self, ScoringError> {
		Self::new(cfg.affordability_weight, cfg.transit_weight, cfg.distance_weight)
	}

	pub fn affordability(&self) -> f64 {
		self.affordability
	}

	pub fn transit(&self) -> f64 {
		self.transit
	}

	pub fn distance(&self) -> f64 {
		self.distance
	}
}
impl Default for ScoringWeights {
	fn default() -> Self {
		Self { affordability: 0.5, transit: 0.3, distance: 0.2 }
	}
}

/// Hard filters in the order they are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
	BudgetCap,
	MaxDistanceKm,
	MinTransit,
}
impl Filter {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::BudgetCap => "budget_cap",
			Self::MaxDistanceKm => "max_distance_km",
			Self::MinTransit => "min_transit",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
	Listing,
	CityMedian,
	Budget,
}
impl ReferenceKind {
	fn label(self) -> &'static str {
		match self {
			Self::Listing => "listing",
			Self::CityMedian => "city median",
			Self::Budget => "budget",
		}
	}
}

/// Price the rationale compares each candidate against.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceReference {
	pub kind: ReferenceKind,
	pub price: f64,
}

#[derive(Clone, Debug)]
pub struct SuggestInput<'a> {
	pub neighbourhoods: &'a [NeighbourhoodRecord],
	pub property_type: &'a str,
	pub income_annual: f64,
	pub prefs: &'a Preferences,
	pub budget_cap: Option<f64>,
	pub reference: Option<PriceReference>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredCandidate {
	pub name: String,
	pub median: f64,
	pub rent_to_income: f64,
	pub transit: u8,
	pub distance_km: f64,
	pub score: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rent_diff_vs_reference: Option<f64>,
	pub rationale: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExcludedCandidate {
	pub name: String,
	pub median: f64,
	pub rent_to_income: f64,
	pub transit: u8,
	pub distance_km: f64,
	pub failed: Vec<Filter>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ranking {
	pub candidates: Vec<ScoredCandidate>,
	pub excluded: Vec<ExcludedCandidate>,
	/// Neighbourhoods that had a median for the property type.
	pub evaluated: usize,
}

/// Full tool payload for a suggestion request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuggestReport {
	pub city: String,
	pub property_type: String,
	pub income_annual: f64,
	pub prefs: Preferences,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub budget_cap: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reference: Option<PriceReference>,
	#[serde(flatten)]
	pub snapshot: SnapshotInfo,
	pub recommendations: Vec<ScoredCandidate>,
	pub excluded: Vec<ExcludedCandidate>,
	pub evaluated: usize,
}

pub fn rank(input: &SuggestInput<'_>, weights: &ScoringWeights) -> Result<Ranking, ScoringError> {
	if !input.income_annual.is_finite() || input.income_annual <= 0.0 {
		return Err(ScoringError::InvalidIncome);
	}

	let monthly_income = input.income_annual / 12.0;
	let mut survivors = Vec::new();
	let mut excluded = Vec::new();
	let mut evaluated = 0;

	for record in input.neighbourhoods {
		let Some(median) = record.median_for(input.property_type) else {
			continue;
		};
		let rent_to_income = median / monthly_income;
		let failed = failed_filters(record, median, input);

		evaluated += 1;

		if failed.is_empty() {
			survivors.push((record, median, rent_to_income));
		} else {
			excluded.push(ExcludedCandidate {
				name: record.name.clone(),
				median,
				rent_to_income,
				transit: record.transit,
				distance_km: record.distance_km,
				failed,
			});
		}
	}

	let distance_norm = input.prefs.max_distance_km.unwrap_or_else(|| {
		survivors.iter().map(|(record, _, _)| record.distance_km).fold(0.0, f64::max)
	});
	let target = input.prefs.target_rent_to_income;
	let mut candidates = survivors
		.into_iter()
		.map(|(record, median, rent_to_income)| {
			let affordability = (1.0 - (rent_to_income - target) / target).clamp(0.0, 1.0);
			let transit = f64::from(record.transit) / 100.0;
			let distance = if distance_norm > 0.0 {
				(1.0 - record.distance_km / distance_norm).clamp(0.0, 1.0)
			} else {
				1.0
			};
			let score = weights.affordability * affordability
				+ weights.transit * transit
				+ weights.distance * distance;
			let rent_diff_vs_reference = input.reference.map(|reference| median - reference.price);

			ScoredCandidate {
				name: record.name.clone(),
				median,
				rent_to_income,
				transit: record.transit,
				distance_km: record.distance_km,
				score,
				rent_diff_vs_reference,
				rationale: rationale(median, record.transit, rent_to_income, input),
			}
		})
		.collect::<Vec<_>>();

	candidates.sort_by(compare_candidates);

	Ok(Ranking { candidates, excluded, evaluated })
}

fn failed_filters(record: &NeighbourhoodRecord, median: f64, input: &SuggestInput<'_>) -> Vec<Filter> {
	let mut failed = Vec::new();

	if let Some(cap) = input.budget_cap
		&& median > cap
	{
		failed.push(Filter::BudgetCap);
	}
	if let Some(max_distance) = input.prefs.max_distance_km
		&& record.distance_km > max_distance
	{
		failed.push(Filter::MaxDistanceKm);
	}
	if let Some(min_transit) = input.prefs.min_transit
		&& f64::from(record.transit) < min_transit
	{
		failed.push(Filter::MinTransit);
	}

	failed
}

fn compare_candidates(left: &ScoredCandidate, right: &ScoredCandidate) -> Ordering {
	right
		.score
		.total_cmp(&left.score)
		.then_with(|| left.rent_to_income.total_cmp(&right.rent_to_income))
		.then_with(|| left.distance_km.total_cmp(&right.distance_km))
		.then_with(|| left.name.cmp(&right.name))
}

fn rationale(median: f64, transit: u8, rent_to_income: f64, input: &SuggestInput<'_>) -> String {
	let mut parts = Vec::new();

	if let Some(reference) = input.reference {
		let diff = median - reference.price;
		let label = reference.kind.label();

		if diff <= 0.0 {
			parts.push(format!("Cheaper by ${:.0}/mo vs {label}", diff.abs()));
		} else {
			parts.push(format!("${diff:.0}/mo above {label}"));
		}
	}
	if let Some(min_transit) = input.prefs.min_transit {
		if f64::from(transit) >= min_transit {
			parts.push(format!("meets transit ≥{min_transit:.0}"));
		} else {
			parts.push(format!("misses transit ≥{min_transit:.0}"));
		}
	}

	let target = input.prefs.target_rent_to_income;
	let target_pct = target * 100.0;

	if rent_to_income <= target {
		parts.push(format!("at or below {target_pct:.0}% RTI"));
	} else {
		parts.push(format!("above {target_pct:.0}% RTI target"));
	}

	parts.join("; ")
}
