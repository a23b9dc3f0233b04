use serde_json::{Map, Value, json};

use rp_config::{
	Agent, Config, Dataset, DatasetMode, Defaults, Ledger, LlmProviderConfig, Nlu, Preferences,
	Prompts, Providers, Scoring, Service, Verify,
};
use rp_domain::{
	affordability::RtiBand,
	dataset::Snapshot,
	intent::Intent,
	policy::{self, RouterError},
	query::QueryContext,
	tool::{ToolError, ToolName, ToolOutput},
	verify,
};

fn dummy_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:8080".to_string(), log_level: "info".to_string() },
		agent: Agent::default(),
		providers: Providers {
			reasoning: LlmProviderConfig {
				provider_id: "p".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/".to_string(),
				model: "m".to_string(),
				temperature: 0.1,
				timeout_ms: 1_000,
				planning_max_tokens: 700,
				finalize_max_tokens: 600,
				default_headers: Map::new(),
			},
		},
		prompts: Prompts::default(),
		dataset: Dataset {
			mode: DatasetMode::Local,
			local_path: "snapshot.json".into(),
			remote_url: None,
			remote_timeout_ms: 1_000,
		},
		ledger: Ledger::default(),
		preferences: Preferences::default(),
		defaults: Defaults::default(),
		scoring: Scoring::default(),
		verify: Verify::default(),
		nlu: Nlu::default(),
	}
}

fn snapshot() -> Snapshot {
	Snapshot::from_value(rp_testkit::sample_snapshot_value().expect("Sample snapshot must parse."))
		.expect("Sample snapshot must deserialize.")
}

fn route(query: &str, args: Value) -> Result<policy::RouterOutcome, RouterError> {
	let cfg = dummy_config();
	let ctx = QueryContext::build(query, args.as_object().expect("Args must be an object."), &cfg);

	policy::decide_and_act(&ctx, &snapshot(), &cfg)
}

#[test]
fn toronto_affordability_is_slightly_above_ideal_and_verifies() {
	let outcome = route(
		"is this affordable?",
		json!({
			"city": "Toronto",
			"property_type": "1bed",
			"income_annual": 80000,
			"target_ratio": 0.30,
			"listing_price": 2200,
		}),
	)
	.expect("Routing must succeed.");

	assert_eq!(outcome.intent, Intent::Affordability);
	assert_eq!(outcome.invocation.tool, ToolName::EvaluateRentAffordability);

	let Some(ToolOutput::Affordability(report)) = outcome.invocation.result.as_ref() else {
		panic!("Expected an affordability report, got {:?}.", outcome.invocation);
	};

	assert_eq!(report.city_median, 2_300.0);
	assert!((report.metrics.rti - 2_200.0 / (80_000.0 / 12.0)).abs() < 1e-12);
	assert!((report.metrics.rti - 0.33).abs() < 1e-9);
	assert_eq!(report.metrics.delta, -100.0);
	assert_eq!(report.metrics.rti_band, RtiBand::SlightlyAboveIdeal);
	assert!(report.metrics.verdict.contains("slightly above ideal"));
	assert_eq!(outcome.answer.summary, report.metrics.verdict);

	let verification = verify::verify(&outcome.invocation, &Verify::default());

	assert!(verification.ok);
	assert!(verification.reasons.is_empty());
}

#[test]
fn explicit_city_median_skips_the_lookup() {
	let outcome = route(
		"can I afford this listing on my income?",
		json!({ "city_median": 1000, "income_annual": 60000, "listing_price": 3500 }),
	)
	.expect("Routing must succeed.");
	let Some(ToolOutput::Affordability(report)) = outcome.invocation.result.as_ref() else {
		panic!("Expected an affordability report.");
	};

	assert_eq!(report.city, None);
	assert_eq!(report.city_median, 1_000.0);

	let verification = verify::verify(&outcome.invocation, &Verify::default());

	assert!(!verification.ok);
	assert!(verification.reasons[0].contains("outside the plausible range"));
}

#[test]
fn affordability_fails_fast_on_missing_inputs() {
	let err = route(
		"is this affordable? :: listing_price=2200 target_ratio=null",
		json!({ "income_annual": 80000 }),
	)
	.expect_err("Missing city and target ratio must fail fast.");
	let RouterError::MissingInputs { intent, fields, .. } = &err else {
		panic!("Expected missing inputs, got {err:?}.");
	};

	assert_eq!(*intent, Intent::Affordability);
	assert_eq!(fields, &vec!["city".to_string(), "target_ratio".to_string()]);

	let invocation = err.to_invocation().expect("Missing inputs must convert to an invocation.");
	let verification = verify::verify(&invocation, &Verify::default());

	assert!(!verification.ok);
	assert_eq!(
		verification.reasons,
		vec![
			"missing required field: city".to_string(),
			"missing required field: target_ratio".to_string()
		]
	);
}

#[test]
fn strict_suggest_returns_empty_list_with_nearest_miss_hint() {
	let outcome = route(
		"suggest neighbourhoods :: city=Toronto income_annual=80000 prefs={min_transit:90, max_distance_km:5}",
		json!({}),
	)
	.expect("Routing must succeed.");

	assert_eq!(outcome.intent, Intent::Suggest);
	assert_eq!(outcome.answer.recommendations.as_deref().map(<[_]>::len), Some(0));

	let verification = verify::verify(&outcome.invocation, &Verify::default());

	assert!(!verification.ok);
	assert!(verification.reasons[0].starts_with("No neighbourhoods matched"));
	assert_eq!(verification.reasons[1], "lower min_transit from 90 to 88 to include Annex");
	assert_eq!(verification.reasons.len(), 2);
}

#[test]
fn nearest_miss_prefers_the_smallest_total_violation() {
	let outcome = route(
		"suggest neighbourhoods :: city=Toronto income_annual=80000 budget_cap=2000 prefs={min_transit:99, max_distance_km:1}",
		json!({}),
	)
	.expect("Routing must succeed.");
	let verification = verify::verify(&outcome.invocation, &Verify::default());

	assert!(!verification.ok);
	assert_eq!(
		verification.reasons[1..],
		[
			"lower min_transit from 99 to 88 to include Annex".to_string(),
			"increase max_distance_km from 1 to 3.2 to include Annex".to_string(),
			"raise budget_cap from $2000 to $2450 to include Annex".to_string(),
		]
	);
}

#[test]
fn hint_toggle_and_limit_keep_one_concrete_relaxation() {
	let outcome = route(
		"suggest neighbourhoods :: city=Toronto income_annual=80000 budget_cap=2000 prefs={min_transit:99, max_distance_km:1}",
		json!({}),
	)
	.expect("Routing must succeed.");

	for settings in [
		Verify { hints: false, ..Verify::default() },
		Verify { max_hints: 1, ..Verify::default() },
		Verify { max_hints: 0, ..Verify::default() },
	] {
		let verification = verify::verify(&outcome.invocation, &settings);

		assert_eq!(
			verification.reasons,
			vec![
				"No neighbourhoods matched the specified criteria (6 evaluated, all excluded)"
					.to_string(),
				"lower min_transit from 99 to 88 to include Annex".to_string(),
			],
			"Unexpected reasons for {settings:?}."
		);
	}
}

#[test]
fn suggest_with_defaults_ranks_and_verifies() {
	let outcome = route("suggest areas in Toronto :: income_annual=80k", json!({}))
		.expect("Routing must succeed.");
	let recommendations = outcome.answer.recommendations.as_ref().expect("Recommendations.");

	assert_eq!(recommendations.len(), 4);
	assert_eq!(recommendations[0].name, "Danforth");
	assert!(recommendations[0].rationale.starts_with("Cheaper by $100/mo vs city median"));
	assert!(verify::verify(&outcome.invocation, &Verify::default()).ok);
}

#[test]
fn identical_inputs_route_identically() {
	let query = "shortlist neighbourhoods :: city=Toronto income_annual=90000 budget_cap=2400";
	let first = route(query, json!({})).expect("Routing must succeed.");
	let second = route(query, json!({})).expect("Routing must succeed.");

	assert_eq!(first.plan, second.plan);
	assert_eq!(
		serde_json::to_value(&first.invocation).expect("serialize"),
		serde_json::to_value(&second.invocation).expect("serialize")
	);
	assert_eq!(first.answer.recommendations, second.answer.recommendations);
}

#[test]
fn unknown_city_is_recorded_on_the_invocation() {
	let outcome =
		route("median rent in Halifax", json!({ "city": "Halifax" })).expect("Routing must succeed.");

	assert_eq!(outcome.intent, Intent::CityRent);
	assert_eq!(
		outcome.invocation.error,
		Some(ToolError::CityNotFound { city: "Halifax".to_string() })
	);

	let verification = verify::verify(&outcome.invocation, &Verify::default());

	assert!(!verification.ok);
	assert_eq!(verification.reasons, vec!["city not found: Halifax".to_string()]);
}

#[test]
fn city_rent_uses_case_insensitive_lookup() {
	let outcome = route("median rent :: city=montreal include_neighbourhoods=true", json!({}))
		.expect("Routing must succeed.");
	let Some(ToolOutput::RentData(data)) = outcome.invocation.result.as_ref() else {
		panic!("Expected rent data.");
	};

	assert_eq!(data.city, "Montreal");
	assert_eq!(data.median, 1_600.0);
	assert_eq!(data.neighbourhoods.as_ref().map(Vec::len), Some(3));
	assert_eq!(data.snapshot.snapshot_month, "2025-09");
}

#[test]
fn unsupported_property_type_lists_supported_types() {
	let outcome =
		route("median rent in Vancouver for a 3 bedroom", json!({})).expect("Routing must succeed.");

	assert!(matches!(
		outcome.invocation.error,
		Some(ToolError::UnsupportedPropertyType { ref property_type, ref supported })
			if property_type == "3bed" && supported.len() == 4
	));
}

#[test]
fn explain_uses_city_median_when_available() {
	let outcome = route("what is rti?", json!({ "city": "Toronto" })).expect("Routing must succeed.");
	let Some(ToolOutput::Explanation(explanation)) = outcome.invocation.result.as_ref() else {
		panic!("Expected an explanation.");
	};

	assert_eq!(explanation.term, "rent-to-income");
	assert_eq!(explanation.city_median, Some(2_300.0));
	assert!(outcome.answer.summary.contains("$92000 a year"));
	assert!(verify::verify(&outcome.invocation, &Verify::default()).ok);
}

#[test]
fn metric_question_across_neighbourhoods_returns_stats() {
	let outcome = route("what is the transit score of neighbourhoods in Toronto?", json!({}))
		.expect("Routing must succeed.");

	assert_eq!(outcome.intent, Intent::NeighbourhoodStats);

	let Some(ToolOutput::NeighbourhoodStats(stats)) = outcome.invocation.result.as_ref() else {
		panic!("Expected neighbourhood stats.");
	};

	assert_eq!(stats.city, "Toronto");
	assert_eq!(stats.neighbourhoods.len(), 6);
}

#[test]
fn stats_missing_city_is_an_input_error() {
	let outcome = route("check transit", json!({})).expect("Routing must succeed.");

	assert_eq!(outcome.invocation.tool, ToolName::GetNeighbourhoodStats);
	assert_eq!(
		outcome.invocation.error,
		Some(ToolError::MissingInputs { fields: vec!["city".to_string()] })
	);
}

#[test]
fn invalid_weights_are_a_contract_violation() {
	let mut cfg = dummy_config();

	cfg.scoring.distance_weight = 0.4;

	let ctx = QueryContext::parse("suggest areas :: city=Toronto income_annual=80000", &cfg);
	let err = policy::decide_and_act(&ctx, &snapshot(), &cfg).expect_err("Weights must be rejected.");

	assert!(matches!(err, RouterError::Contract { .. }));
}
