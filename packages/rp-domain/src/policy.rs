//! Intent routing: one classified intent, one deterministic tool invocation.

use regex::Regex;
use serde_json::{Map, Value};

use crate::{
	affordability::{self, AffordabilityInput, AffordabilityReport},
	dataset::{LookupError, Snapshot},
	intent::{Intent, classify_intent},
	prefs::Preferences,
	query::{self, QueryContext},
	scoring::{self, PriceReference, ReferenceKind, ScoringWeights, SuggestInput, SuggestReport},
	tool::{
		Answer, Explanation, NeighbourhoodMedian, NeighbourhoodStat, NeighbourhoodStats, RentData,
		ToolError, ToolInvocation, ToolName, ToolOutput,
	},
};

pub type Result<T, E = RouterError> = std::result::Result<T, E>;

const AFFORDABILITY_FIELDS: [&str; 4] = ["city", "income_annual", "target_ratio", "listing_price"];

/// Matched in order, so named terms come before the bare `score` catch-all. The first entry is
/// also the fallback.
const GLOSSARY: [(&str, &str, &str); 3] = [
	(
		r"(?i)\brti\b|\brent[\s-]*to[\s-]*income\b",
		"rent-to-income",
		"Rent-to-income (RTI) is monthly rent divided by monthly income. A common target is 30%.",
	),
	(
		r"(?i)\btransit(?:\s+score)?\b",
		"transit score",
		"Transit score rates public-transit access on a 0-100 scale; higher means more frequent, closer service.",
	),
	(
		r"(?i)\bcomposite(?:\s+score)?\b|\bscore\b",
		"composite score",
		"The composite score ranks neighbourhoods by blending affordability, transit access and distance from downtown into a single 0-1 value.",
	),
];

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
	#[error("Missing required fields for {}: {}.", .intent.as_str(), .fields.join(", "))]
	MissingInputs { intent: Intent, fields: Vec<String>, args: Map<String, Value> },
	#[error("Contract violation: {message}")]
	Contract { message: String },
}
impl RouterError {
	/// The failed invocation recorded when the pipeline continues past a fail-fast error.
	pub fn to_invocation(&self) -> Option<ToolInvocation> {
		match self {
			Self::MissingInputs { intent, fields, args } => Some(ToolInvocation::failed(
				intent.tool(),
				args.clone(),
				ToolError::MissingInputs { fields: fields.clone() },
			)),
			Self::Contract { .. } => None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct RouterOutcome {
	pub intent: Intent,
	pub plan: String,
	pub invocation: ToolInvocation,
	pub answer: Answer,
}

/// Adds defaults for keys the user did not supply. Present keys, including explicit `null`,
/// are left untouched.
pub fn fill_defaults(
	mut args: Map<String, Value>,
	intent: Intent,
	prefs: &Preferences,
	defaults: &rp_config::Defaults,
) -> Map<String, Value> {
	args.entry("property_type")
		.or_insert_with(|| Value::String(defaults.property_type.clone()));

	if let Some(city) = defaults.city.as_ref() {
		args.entry("city").or_insert_with(|| Value::String(city.clone()));
	}
	if intent == Intent::Affordability {
		args.entry("target_ratio").or_insert_with(|| Value::from(prefs.target_rent_to_income));
	}

	args
}

pub fn decide_and_act(
	ctx: &QueryContext,
	snapshot: &Snapshot,
	cfg: &rp_config::Config,
) -> Result<RouterOutcome> {
	let weights = ScoringWeights::from_config(&cfg.scoring)
		.map_err(|err| RouterError::Contract { message: err.to_string() })?;
	let intent = classify_intent(&ctx.classification_text());
	let args = fill_defaults(ctx.args.clone(), intent, &ctx.prefs, &cfg.defaults);
	let router = Router { ctx, snapshot, cfg, weights };
	let (plan, invocation) = match intent {
		Intent::Explain => router.explain(args),
		Intent::CityRent => router.city_rent(args),
		Intent::NeighbourhoodStats => router.neighbourhood_stats(args),
		Intent::Affordability => router.affordability(args)?,
		Intent::Suggest => router.suggest(args),
	};
	let answer = answer_for(&invocation, cfg.scoring.max_results as usize);

	Ok(RouterOutcome { intent, plan, invocation, answer })
}

/// Fallback answer derived only from the tool result.
pub fn answer_for(invocation: &ToolInvocation, max_results: usize) -> Answer {
	if let Some(error) = invocation.error.as_ref() {
		return Answer {
			summary: format!("Could not complete {}: {error}.", invocation.tool.as_str()),
			recommendations: None,
			data: serde_json::to_value(error).ok(),
		};
	}

	match invocation.result.as_ref() {
		Some(ToolOutput::RentData(data)) => Answer {
			summary: format!(
				"The {} median rent in {} is ${:.0} ({}, snapshot {}).",
				data.property_type, data.city, data.median, data.snapshot.currency,
				data.snapshot.snapshot_month
			),
			recommendations: None,
			data: serde_json::to_value(data).ok(),
		},
		Some(ToolOutput::NeighbourhoodStats(stats)) => Answer {
			summary: stats_summary(stats),
			recommendations: None,
			data: serde_json::to_value(stats).ok(),
		},
		Some(ToolOutput::Affordability(report)) => Answer {
			summary: report.metrics.verdict.clone(),
			recommendations: None,
			data: serde_json::to_value(report).ok(),
		},
		Some(ToolOutput::Suggestions(report)) => {
			let top = report.recommendations.iter().take(max_results).cloned().collect::<Vec<_>>();

			Answer {
				summary: suggest_summary(report, &top),
				data: Some(serde_json::json!({
					"city": report.city,
					"property_type": report.property_type,
					"prefs": report.prefs,
					"evaluated": report.evaluated,
					"excluded": report.excluded.len(),
				})),
				recommendations: Some(top),
			}
		},
		Some(ToolOutput::Explanation(explanation)) => Answer {
			summary: explain_summary(explanation),
			recommendations: None,
			data: serde_json::to_value(explanation).ok(),
		},
		None => Answer {
			summary: format!("{} returned no result.", invocation.tool.as_str()),
			recommendations: None,
			data: None,
		},
	}
}

struct Router<'a> {
	ctx: &'a QueryContext,
	snapshot: &'a Snapshot,
	cfg: &'a rp_config::Config,
	weights: ScoringWeights,
}
impl Router<'_> {
	fn explain(&self, args: Map<String, Value>) -> (String, ToolInvocation) {
		let (term, definition) = detect_term(&self.ctx.text);
		let property_type = string_arg(&args, "property_type");
		let mut explanation = Explanation {
			term: term.to_string(),
			definition: definition.to_string(),
			city: None,
			property_type: None,
			city_median: None,
			target_rent_to_income: self.ctx.prefs.target_rent_to_income,
		};
		let plan = format!("intent=explain; define {term} using {}", ToolName::ExplainTerm.as_str());

		if let Some(city) = string_arg(&args, "city") {
			let property_type = property_type.unwrap_or_else(|| self.cfg.defaults.property_type.clone());

			match self.snapshot.city_median(&city, &property_type) {
				Ok(median) => {
					explanation.city = self.snapshot.city(&city).ok().map(|view| view.name.to_string());
					explanation.property_type = Some(property_type);
					explanation.city_median = Some(median);
				},
				Err(LookupError::CityNotFound { city }) => {
					return (
						plan,
						ToolInvocation::failed(ToolName::ExplainTerm, args, ToolError::CityNotFound {
							city,
						}),
					);
				},
				Err(LookupError::UnsupportedPropertyType { .. }) => {},
			}
		}

		(
			plan,
			ToolInvocation::succeeded(ToolName::ExplainTerm, args, ToolOutput::Explanation(explanation)),
		)
	}

	fn city_rent(&self, args: Map<String, Value>) -> (String, ToolInvocation) {
		let tool = ToolName::GetRentData;
		let Some((city, property_type)) = self.city_and_type(&args) else {
			return (plan_missing(tool), missing(tool, args, &["city"]));
		};
		let plan = format!("intent=city_rent; call {} for {city} ({property_type})", tool.as_str());
		let include_neighbourhoods = matches!(args.get("include_neighbourhoods"), Some(Value::Bool(true)));
		let median = match self.snapshot.city_median(&city, &property_type) {
			Ok(median) => median,
			Err(err) => return (plan, self.lookup_failure(tool, args, err)),
		};
		let canonical = self.canonical_city(&city);
		let neighbourhoods = include_neighbourhoods.then(|| {
			self.snapshot
				.list_neighbourhoods(&city)
				.unwrap_or_default()
				.iter()
				.filter_map(|record| {
					record
						.median_for(&property_type)
						.map(|median| NeighbourhoodMedian { name: record.name.clone(), median })
				})
				.collect()
		});
		let data = RentData {
			city: canonical,
			property_type,
			median,
			snapshot: self.snapshot.info(),
			neighbourhoods,
		};

		(plan, ToolInvocation::succeeded(tool, args, ToolOutput::RentData(data)))
	}

	fn neighbourhood_stats(&self, args: Map<String, Value>) -> (String, ToolInvocation) {
		let tool = ToolName::GetNeighbourhoodStats;
		let Some((city, property_type)) = self.city_and_type(&args) else {
			return (plan_missing(tool), missing(tool, args, &["city"]));
		};
		let plan = format!(
			"intent=neighbourhood_stats; call {} for {city} ({property_type})",
			tool.as_str()
		);

		if !self.is_supported(&property_type) {
			return (plan, self.unsupported(tool, args, property_type));
		}

		let records = match self.snapshot.list_neighbourhoods(&city) {
			Ok(records) => records,
			Err(err) => return (plan, self.lookup_failure(tool, args, err)),
		};
		let neighbourhoods = records
			.iter()
			.filter_map(|record| {
				record.median_for(&property_type).map(|median| NeighbourhoodStat {
					name: record.name.clone(),
					median,
					transit: record.transit,
					distance_km: record.distance_km,
				})
			})
			.collect();
		let stats = NeighbourhoodStats {
			city: self.canonical_city(&city),
			property_type,
			snapshot: self.snapshot.info(),
			neighbourhoods,
		};

		(plan, ToolInvocation::succeeded(tool, args, ToolOutput::NeighbourhoodStats(stats)))
	}

	fn affordability(&self, args: Map<String, Value>) -> Result<(String, ToolInvocation)> {
		let tool = ToolName::EvaluateRentAffordability;
		let city = string_arg(&args, "city");
		let explicit_median = numeric_arg(&args, "city_median");
		let mut fields = Vec::new();

		for field in AFFORDABILITY_FIELDS {
			let resolvable = match field {
				"city" => city.is_some() || !matches!(explicit_median, Numeric::Absent),
				other => !matches!(numeric_arg(&args, other), Numeric::Absent),
			};

			if !resolvable {
				fields.push(field.to_string());
			}
		}
		if !fields.is_empty() {
			return Err(RouterError::MissingInputs { intent: Intent::Affordability, fields, args });
		}

		let property_type = string_arg(&args, "property_type")
			.unwrap_or_else(|| self.cfg.defaults.property_type.clone());
		let plan = format!(
			"intent=affordability; resolve city median then call {} for {} ({property_type})",
			tool.as_str(),
			city.as_deref().unwrap_or("the supplied city median"),
		);
		let listing_price = match positive(&args, "listing_price") {
			Ok(value) => value,
			Err(error) => return Ok((plan, ToolInvocation::failed(tool, args, error))),
		};
		let income_annual = match positive(&args, "income_annual") {
			Ok(value) => value,
			Err(error) => return Ok((plan, ToolInvocation::failed(tool, args, error))),
		};
		let target_ratio = match positive(&args, "target_ratio") {
			Ok(value) if value < 1.0 => value,
			Ok(_) => {
				let error = ToolError::InvalidInput {
					field: "target_ratio".to_string(),
					message: "must be between 0 and 1".to_string(),
				};

				return Ok((plan, ToolInvocation::failed(tool, args, error)));
			},
			Err(error) => return Ok((plan, ToolInvocation::failed(tool, args, error))),
		};
		let city_median = match explicit_median {
			Numeric::Value(median) if median > 0.0 => median,
			Numeric::Absent => {
				let city = city.clone().unwrap_or_default();

				match self.snapshot.city_median(&city, &property_type) {
					Ok(median) => median,
					Err(err) => return Ok((plan, self.lookup_failure(tool, args, err))),
				}
			},
			_ => {
				let error = ToolError::InvalidInput {
					field: "city_median".to_string(),
					message: "must be a positive number".to_string(),
				};

				return Ok((plan, ToolInvocation::failed(tool, args, error)));
			},
		};
		let metrics = affordability::evaluate(&AffordabilityInput {
			listing_price,
			city_median,
			income_annual,
			target_ratio,
		});
		let report = AffordabilityReport {
			city: city.map(|city| self.canonical_city(&city)),
			property_type,
			listing_price,
			city_median,
			income_annual,
			target_ratio,
			metrics,
			snapshot: self.snapshot.info(),
		};

		Ok((plan, ToolInvocation::succeeded(tool, args, ToolOutput::Affordability(report))))
	}

	fn suggest(&self, args: Map<String, Value>) -> (String, ToolInvocation) {
		let tool = ToolName::SuggestNeighbourhoods;
		let mut absent = Vec::new();

		if string_arg(&args, "city").is_none() {
			absent.push("city");
		}
		if matches!(numeric_arg(&args, "income_annual"), Numeric::Absent) {
			absent.push("income_annual");
		}
		if !absent.is_empty() {
			return (plan_missing(tool), missing(tool, args, &absent));
		}

		let Some((city, property_type)) = self.city_and_type(&args) else {
			return (plan_missing(tool), missing(tool, args, &["city"]));
		};
		let prefs = &self.ctx.prefs;
		let plan = format!(
			"intent=suggest; call {} for {city} ({property_type}) with max_distance_km={}, min_transit={}, target_rent_to_income={}",
			tool.as_str(),
			render_limit(prefs.max_distance_km),
			render_limit(prefs.min_transit),
			prefs.target_rent_to_income,
		);

		if !self.is_supported(&property_type) {
			return (plan, self.unsupported(tool, args, property_type));
		}

		let income_annual = match positive(&args, "income_annual") {
			Ok(value) => value,
			Err(error) => return (plan, ToolInvocation::failed(tool, args, error)),
		};
		let budget_cap = match numeric_arg(&args, "budget_cap") {
			Numeric::Absent => None,
			Numeric::Value(cap) if cap > 0.0 => Some(cap),
			_ => {
				let error = ToolError::InvalidInput {
					field: "budget_cap".to_string(),
					message: "must be a positive number".to_string(),
				};

				return (plan, ToolInvocation::failed(tool, args, error));
			},
		};
		let neighbourhoods = match self.snapshot.list_neighbourhoods(&city) {
			Ok(records) => records,
			Err(err) => return (plan, self.lookup_failure(tool, args, err)),
		};
		let reference = self.price_reference(&args, &city, &property_type, budget_cap);
		let input = SuggestInput {
			neighbourhoods,
			property_type: &property_type,
			income_annual,
			prefs,
			budget_cap,
			reference,
		};
		let ranking = match scoring::rank(&input, &self.weights) {
			Ok(ranking) => ranking,
			Err(err) => {
				let error = ToolError::InvalidInput {
					field: "income_annual".to_string(),
					message: err.to_string(),
				};

				return (plan, ToolInvocation::failed(tool, args, error));
			},
		};
		let report = SuggestReport {
			city: self.canonical_city(&city),
			property_type: property_type.clone(),
			income_annual,
			prefs: prefs.clone(),
			budget_cap,
			reference,
			snapshot: self.snapshot.info(),
			recommendations: ranking.candidates,
			excluded: ranking.excluded,
			evaluated: ranking.evaluated,
		};

		(plan, ToolInvocation::succeeded(tool, args, ToolOutput::Suggestions(report)))
	}

	fn city_and_type(&self, args: &Map<String, Value>) -> Option<(String, String)> {
		let city = string_arg(args, "city")?;
		let property_type = string_arg(args, "property_type")
			.unwrap_or_else(|| self.cfg.defaults.property_type.clone());

		Some((city, property_type))
	}

	fn canonical_city(&self, city: &str) -> String {
		self.snapshot.city(city).map(|view| view.name.to_string()).unwrap_or_else(|_| city.to_string())
	}

	fn is_supported(&self, property_type: &str) -> bool {
		self.snapshot.property_types().iter().any(|supported| supported == property_type)
	}

	fn price_reference(
		&self,
		args: &Map<String, Value>,
		city: &str,
		property_type: &str,
		budget_cap: Option<f64>,
	) -> Option<PriceReference> {
		if let Numeric::Value(price) = numeric_arg(args, "listing_price")
			&& price > 0.0
		{
			return Some(PriceReference { kind: ReferenceKind::Listing, price });
		}
		if let Ok(price) = self.snapshot.city_median(city, property_type) {
			return Some(PriceReference { kind: ReferenceKind::CityMedian, price });
		}

		budget_cap.map(|price| PriceReference { kind: ReferenceKind::Budget, price })
	}

	fn unsupported(
		&self,
		tool: ToolName,
		args: Map<String, Value>,
		property_type: String,
	) -> ToolInvocation {
		ToolInvocation::failed(tool, args, ToolError::UnsupportedPropertyType {
			property_type,
			supported: self.snapshot.property_types(),
		})
	}

	fn lookup_failure(
		&self,
		tool: ToolName,
		args: Map<String, Value>,
		err: LookupError,
	) -> ToolInvocation {
		ToolInvocation::failed(tool, args, ToolError::from_lookup(err, self.snapshot.property_types()))
	}
}

enum Numeric {
	Absent,
	Invalid,
	Value(f64),
}

fn numeric_arg(args: &Map<String, Value>, key: &str) -> Numeric {
	match args.get(key) {
		None | Some(Value::Null) => Numeric::Absent,
		Some(Value::Number(number)) =>
			number.as_f64().filter(|value| value.is_finite()).map_or(Numeric::Invalid, Numeric::Value),
		Some(Value::String(text)) if text.trim().is_empty() => Numeric::Absent,
		Some(Value::String(text)) =>
			query::parse_amount(text.trim()).map_or(Numeric::Invalid, Numeric::Value),
		Some(_) => Numeric::Invalid,
	}
}

fn positive(args: &Map<String, Value>, key: &str) -> std::result::Result<f64, ToolError> {
	match numeric_arg(args, key) {
		Numeric::Value(value) if value > 0.0 => Ok(value),
		Numeric::Absent => Err(ToolError::MissingInputs { fields: vec![key.to_string()] }),
		_ => Err(ToolError::InvalidInput {
			field: key.to_string(),
			message: "must be a positive number".to_string(),
		}),
	}
}

fn string_arg(args: &Map<String, Value>, key: &str) -> Option<String> {
	match args.get(key) {
		Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
		_ => None,
	}
}

fn missing(tool: ToolName, args: Map<String, Value>, fields: &[&str]) -> ToolInvocation {
	ToolInvocation::failed(tool, args, ToolError::MissingInputs {
		fields: fields.iter().map(|field| field.to_string()).collect(),
	})
}

fn plan_missing(tool: ToolName) -> String {
	format!("{} needs more input before it can run", tool.as_str())
}

fn render_limit(value: Option<f64>) -> String {
	value.map(|value| value.to_string()).unwrap_or_else(|| "off".to_string())
}

fn detect_term(text: &str) -> (&'static str, &'static str) {
	GLOSSARY
		.iter()
		.find(|(pattern, _, _)| Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false))
		.or_else(|| GLOSSARY.first())
		.map(|(_, term, definition)| (*term, *definition))
		.unwrap_or(("rent-to-income", ""))
}

fn stats_summary(stats: &NeighbourhoodStats) -> String {
	let best = stats.neighbourhoods.iter().max_by(|left, right| {
		left.transit.cmp(&right.transit).then_with(|| right.name.cmp(&left.name))
	});

	match best {
		Some(best) => format!(
			"Found {} neighbourhoods in {} with {} data; best transit is {} ({}).",
			stats.neighbourhoods.len(),
			stats.city,
			stats.property_type,
			best.name,
			best.transit
		),
		None => format!("No neighbourhood data for {} in {}.", stats.property_type, stats.city),
	}
}

fn suggest_summary(report: &SuggestReport, top: &[scoring::ScoredCandidate]) -> String {
	if top.is_empty() {
		return format!(
			"No neighbourhoods in {} match the current filters for a {}.",
			report.city, report.property_type
		);
	}

	let names = top.iter().map(|candidate| candidate.name.as_str()).collect::<Vec<_>>();

	format!(
		"Top {} neighbourhoods in {} for a {}: {}.",
		top.len(),
		report.city,
		report.property_type,
		names.join(", ")
	)
}

fn explain_summary(explanation: &Explanation) -> String {
	match (explanation.city.as_ref(), explanation.property_type.as_ref(), explanation.city_median) {
		(Some(city), Some(property_type), Some(median)) if explanation.term == "rent-to-income" => {
			let target = explanation.target_rent_to_income;
			let needed = median / target * 12.0;

			format!(
				"{} For example, the {city} {property_type} median is ${median:.0}/mo, so staying at {:.0}% needs about ${needed:.0} a year.",
				explanation.definition,
				target * 100.0
			)
		},
		(Some(city), Some(property_type), Some(median)) => format!(
			"{} For reference, the {city} {property_type} median is ${median:.0}/mo.",
			explanation.definition
		),
		_ => explanation.definition.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_null_survives_defaults() {
		let mut args = Map::new();

		args.insert("target_ratio".to_string(), Value::Null);

		let prefs = Preferences::from_config(&rp_config::Preferences::default());
		let filled = fill_defaults(args, Intent::Affordability, &prefs, &rp_config::Defaults::default());

		assert_eq!(filled.get("target_ratio"), Some(&Value::Null));
		assert_eq!(filled.get("property_type"), Some(&Value::String("1bed".to_string())));
	}

	#[test]
	fn glossary_prefers_specific_terms() {
		assert_eq!(detect_term("what is a transit score?").0, "transit score");
		assert_eq!(detect_term("explain rent-to-income").0, "rent-to-income");
		assert_eq!(detect_term("what does that mean").0, "rent-to-income");
		assert_eq!(detect_term("what is rti score").0, "rent-to-income");
		assert_eq!(detect_term("how is the score computed").0, "composite score");
	}

	#[test]
	fn string_amounts_are_numeric() {
		let args = serde_json::json!({ "income_annual": "80k", "listing_price": "abc" });
		let args = args.as_object().expect("object");

		assert!(matches!(numeric_arg(args, "income_annual"), Numeric::Value(value) if value == 80_000.0));
		assert!(matches!(numeric_arg(args, "listing_price"), Numeric::Invalid));
		assert!(matches!(numeric_arg(args, "budget_cap"), Numeric::Absent));
	}
}
