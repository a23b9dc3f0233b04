//! Local, deterministic verification of a tool invocation.
//!
//! The result here is authoritative: whatever the reasoning service proposes for `verify` is
//! discarded in favour of [`verify`].

use serde::Serialize;

use crate::{
	scoring::{ExcludedCandidate, Filter, SuggestReport},
	tool::{ToolError, ToolInvocation, ToolOutput},
};

/// Order in which relaxation hints are offered: the filter applied last is relaxed first.
const RELAXATION_ORDER: [Filter; 3] = [Filter::MinTransit, Filter::MaxDistanceKm, Filter::BudgetCap];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Verification {
	pub ok: bool,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub reasons: Vec<String>,
}
impl Verification {
	pub fn pass() -> Self {
		Self { ok: true, reasons: Vec::new() }
	}

	pub fn fail(reasons: Vec<String>) -> Self {
		Self { ok: false, reasons }
	}

	/// Marks the result failed because a dependency degraded the answer.
	pub fn degrade(&mut self, reason: impl Into<String>) {
		self.ok = false;
		self.reasons.push(reason.into());
	}
}

pub fn verify(invocation: &ToolInvocation, cfg: &rp_config::Verify) -> Verification {
	if let Some(error) = invocation.error.as_ref() {
		return Verification::fail(error_reasons(error));
	}

	match invocation.result.as_ref() {
		Some(ToolOutput::Suggestions(report)) => verify_suggestions(report, cfg),
		Some(ToolOutput::Affordability(report)) => {
			let ratio = report.metrics.listing_to_median;

			if ratio < cfg.min_listing_to_median || ratio > cfg.max_listing_to_median {
				return Verification::fail(vec![format!(
					"listing price ${} is {ratio:.2}x the city median ${}, outside the plausible range {}-{}x",
					format_number(report.listing_price),
					format_number(report.city_median),
					format_number(cfg.min_listing_to_median),
					format_number(cfg.max_listing_to_median),
				)]);
			}

			Verification::pass()
		},
		Some(ToolOutput::NeighbourhoodStats(stats)) if stats.neighbourhoods.is_empty() =>
			Verification::fail(vec![format!(
				"no neighbourhood data for {} in {}",
				stats.property_type, stats.city
			)]),
		Some(_) => Verification::pass(),
		None => Verification::fail(vec![format!("{} returned no result", invocation.tool.as_str())]),
	}
}

fn error_reasons(error: &ToolError) -> Vec<String> {
	match error {
		ToolError::MissingInputs { fields } =>
			fields.iter().map(|field| format!("missing required field: {field}")).collect(),
		other => vec![other.to_string()],
	}
}

fn verify_suggestions(report: &SuggestReport, cfg: &rp_config::Verify) -> Verification {
	if !report.recommendations.is_empty() {
		return Verification::pass();
	}
	if report.evaluated == 0 {
		return Verification::fail(vec![format!(
			"no neighbourhoods in {} have {} rent data",
			report.city, report.property_type
		)]);
	}

	let mut reasons = vec![format!(
		"No neighbourhoods matched the specified criteria ({} evaluated, all excluded)",
		report.evaluated
	)];

	// The nearest miss always yields at least one concrete relaxation.
	let limit = if cfg.hints { cfg.max_hints.max(1) } else { 1 };

	if let Some(nearest) = nearest_miss(&report.excluded, report) {
		reasons.extend(relaxation_hints(nearest, report).into_iter().take(limit as usize));
	}

	Verification::fail(reasons)
}

/// Smallest combined normalized violation first, then fewest failed filters, then name.
pub fn nearest_miss<'a>(
	excluded: &'a [ExcludedCandidate],
	report: &SuggestReport,
) -> Option<&'a ExcludedCandidate> {
	excluded.iter().min_by(|left, right| {
		violation(left, report)
			.total_cmp(&violation(right, report))
			.then_with(|| left.failed.len().cmp(&right.failed.len()))
			.then_with(|| left.name.cmp(&right.name))
	})
}

fn violation(candidate: &ExcludedCandidate, report: &SuggestReport) -> f64 {
	candidate
		.failed
		.iter()
		.map(|filter| match filter {
			Filter::BudgetCap => report
				.budget_cap
				.map(|cap| (candidate.median - cap) / cap.max(1.0))
				.unwrap_or(0.0),
			Filter::MaxDistanceKm => report
				.prefs
				.max_distance_km
				.map(|max| (candidate.distance_km - max) / max.max(1.0))
				.unwrap_or(0.0),
			Filter::MinTransit => report
				.prefs
				.min_transit
				.map(|min| (min - f64::from(candidate.transit)) / 100.0)
				.unwrap_or(0.0),
		})
		.sum()
}

fn relaxation_hints(candidate: &ExcludedCandidate, report: &SuggestReport) -> Vec<String> {
	RELAXATION_ORDER
		.iter()
		.filter(|filter| candidate.failed.contains(*filter))
		.filter_map(|filter| match filter {
			Filter::MinTransit => report.prefs.min_transit.map(|current| {
				format!(
					"lower min_transit from {} to {} to include {}",
					format_number(current),
					candidate.transit,
					candidate.name
				)
			}),
			Filter::MaxDistanceKm => report.prefs.max_distance_km.map(|current| {
				format!(
					"increase max_distance_km from {} to {} to include {}",
					format_number(current),
					format_number(candidate.distance_km),
					candidate.name
				)
			}),
			Filter::BudgetCap => report.budget_cap.map(|current| {
				format!(
					"raise budget_cap from ${} to ${} to include {}",
					format_number(current),
					format_number(candidate.median),
					candidate.name
				)
			}),
		})
		.collect()
}

/// Whole numbers without a fraction, everything else with at most two decimals.
pub fn format_number(value: f64) -> String {
	if value.fract() == 0.0 {
		return format!("{value:.0}");
	}

	let rendered = format!("{value:.2}");

	rendered.trim_end_matches('0').trim_end_matches('.').to_string()
}
