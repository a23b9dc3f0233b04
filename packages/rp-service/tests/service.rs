use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::{Map, Value, json};

use rp_config::{Config, LlmProviderConfig};
use rp_domain::tool::ToolName;
use rp_service::{
	BoxFuture, Error, Providers, QueryRequest, ReasoningProvider, RentPilotService,
};
use rp_testkit::TestDir;

/// Replays canned replies in order; an exhausted script behaves like a dead endpoint.
struct ScriptedReasoning {
	replies: Mutex<VecDeque<rp_providers::Result<String>>>,
	calls: Arc<AtomicUsize>,
}
impl ScriptedReasoning {
	fn new(replies: Vec<rp_providers::Result<String>>) -> Self {
		Self { replies: Mutex::new(replies.into()), calls: Arc::new(AtomicUsize::new(0)) }
	}

	fn unavailable() -> Self {
		Self::new(Vec::new())
	}
}
impl ReasoningProvider for ScriptedReasoning {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_system: &'a str,
		_user: &'a str,
		_max_tokens: u32,
	) -> BoxFuture<'a, rp_providers::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let reply = self
			.replies
			.lock()
			.expect("Script lock poisoned.")
			.pop_front()
			.unwrap_or(Err(rp_providers::Error::Timeout { attempts: 2 }));

		Box::pin(async move { reply })
	}
}

fn service(cfg: Config, reasoning: ScriptedReasoning) -> RentPilotService {
	RentPilotService::with_providers(cfg, Providers::new(Arc::new(reasoning)))
		.expect("Service must build.")
}

fn request(query: &str) -> QueryRequest {
	QueryRequest::new(query)
}

const AFFORDABILITY_QUERY: &str =
	"Is a $2200 listing affordable on $80k income in Toronto? :: listing_price=2200 income_annual=80000";

#[tokio::test]
async fn toronto_affordability_runs_every_stage() {
	let dir = TestDir::new("service_afford").expect("Failed to create test dir.");
	let cfg = rp_testkit::sample_config(&dir).expect("Config must load.");
	let reasoning = ScriptedReasoning::new(vec![
		Ok("```json\n{\"plan\": \"Compare the listing with the Toronto median.\", \"actions\": [{\"tool\": \"evaluate_rent_affordability\", \"args\": {\"city\": \"Toronto\"}}]}\n```".to_string()),
		Ok("Sure! {\"answer\": {\"summary\": \"Slightly below market, a bit above the 30% target.\"}, \"verify\": {\"ok\": false, \"reasons\": [\"invented\"]}}".to_string()),
	]);
	let calls = reasoning.calls.clone();
	let service = service(cfg, reasoning);
	let envelope = service.run(request(AFFORDABILITY_QUERY)).await.expect("Run must succeed.");

	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert_eq!(envelope.plan, "Compare the listing with the Toronto median.");
	assert_eq!(envelope.actions.len(), 1);
	assert_eq!(envelope.actions[0].tool, ToolName::EvaluateRentAffordability);
	assert!(envelope.actions[0].error.is_none());
	// The locally computed verification replaces the proposed one.
	assert!(envelope.verify.ok);
	assert!(envelope.verify.reasons.is_empty());
	assert_eq!(envelope.answer.summary, "Slightly below market, a bit above the 30% target.");
	assert_eq!(envelope.meta.model_id, "reasoner-test");
	assert_eq!(envelope.meta.agent_version, "v2");

	let data = envelope.answer.data.as_ref().expect("Answer data must be present.");

	assert_eq!(data["delta"], json!(-100.0));
	assert!((data["rti"].as_f64().expect("rti") - 0.33).abs() < 1e-9);
	assert_eq!(data["rti_band"], "slightly_above_ideal");

	let lines = rp_testkit::read_lines(&dir.join("ledger.jsonl")).expect("Ledger must exist.");
	let stages = lines.iter().map(|line| line.get("stage").cloned()).collect::<Vec<_>>();

	assert_eq!(
		stages,
		vec![Some(json!("planning")), Some(json!("tool_execute")), Some(json!("finalize")), None]
	);
	assert_eq!(lines[3]["kind"], "entry");
	assert_eq!(lines[3]["payload"]["verify"]["ok"], true);
	assert_eq!(lines[2]["payload"]["proposed_verify"]["ok"], false);
	assert!(lines.iter().all(|line| line["session_id"] == lines[0]["session_id"]));
	assert_eq!(lines[0]["user_query"], AFFORDABILITY_QUERY);

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn reasoning_outage_degrades_but_keeps_the_envelope() {
	let dir = TestDir::new("service_outage").expect("Failed to create test dir.");
	let cfg = rp_testkit::sample_config(&dir).expect("Config must load.");
	let service = service(cfg, ScriptedReasoning::unavailable());
	let envelope = service.run(request(AFFORDABILITY_QUERY)).await.expect("Run must succeed.");

	assert!(envelope.plan.starts_with("intent=affordability"));
	assert!(envelope.actions[0].result.is_some());
	assert!(envelope.answer.summary.contains("slightly above ideal"));
	assert!(!envelope.verify.ok);
	assert_eq!(envelope.verify.reasons.len(), 2);
	assert!(envelope.verify.reasons[0].starts_with("reasoning service (plan)"));
	assert!(envelope.verify.reasons[1].starts_with("reasoning service (finalize)"));
	assert_eq!(rp_testkit::read_lines(&dir.join("ledger.jsonl")).expect("Ledger.").len(), 4);

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn missing_inputs_flow_through_finalize_and_verify() {
	let dir = TestDir::new("service_missing").expect("Failed to create test dir.");
	let cfg = rp_testkit::sample_config(&dir).expect("Config must load.");
	let reasoning = ScriptedReasoning::new(vec![
		Ok("{\"plan\": \"Need more details.\", \"actions\": []}".to_string()),
		Ok("I am not able to produce JSON today.".to_string()),
	]);
	let service = service(cfg, reasoning);
	let envelope = service
		.run(request("Is a $2200 listing affordable on my income? :: listing_price=2200"))
		.await
		.expect("Missing inputs must not be fatal.");
	let invocation = &envelope.actions[0];

	assert_eq!(invocation.tool, ToolName::EvaluateRentAffordability);
	assert!(invocation.result.is_none());
	assert!(invocation.error.is_some());
	assert!(!envelope.verify.ok);
	assert_eq!(
		envelope.verify.reasons,
		vec![
			"missing required field: city".to_string(),
			"missing required field: income_annual".to_string(),
		]
	);
	assert!(envelope.answer.summary.starts_with("Could not complete evaluate_rent_affordability"));
	assert_eq!(rp_testkit::read_lines(&dir.join("ledger.jsonl")).expect("Ledger.").len(), 4);

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn strict_suggest_reports_relaxation_hints() {
	let dir = TestDir::new("service_suggest").expect("Failed to create test dir.");
	let cfg = rp_testkit::sample_config(&dir).expect("Config must load.");
	let reasoning = ScriptedReasoning::new(vec![
		Ok("{\"plan\": \"Shortlist areas.\", \"actions\": [{\"tool\": \"suggest_neighbourhoods\"}]}".to_string()),
		Ok("{\"answer\": {\"summary\": \"Nothing fits those limits.\"}}".to_string()),
	]);
	let service = service(cfg, reasoning);
	let envelope = service
		.run(request(
			"suggest neighbourhoods :: city=Toronto income_annual=80000 prefs={min_transit:90, max_distance_km:5}",
		))
		.await
		.expect("Run must succeed.");

	assert_eq!(envelope.actions[0].tool, ToolName::SuggestNeighbourhoods);
	assert_eq!(envelope.answer.recommendations.as_deref().map(<[_]>::len), Some(0));
	assert_eq!(envelope.answer.summary, "Nothing fits those limits.");
	assert!(!envelope.verify.ok);
	assert!(envelope.verify.reasons[0].starts_with("No neighbourhoods matched"));
	assert_eq!(envelope.verify.reasons[1], "lower min_transit from 90 to 88 to include Annex");

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn structured_args_and_session_id_are_honoured() {
	let dir = TestDir::new("service_session").expect("Failed to create test dir.");
	let cfg = rp_testkit::sample_config(&dir).expect("Config must load.");
	let service = service(cfg, ScriptedReasoning::unavailable());
	let mut args = Map::new();

	args.insert("city".to_string(), Value::String("Montreal".to_string()));

	let req = QueryRequest {
		query: "What is the median rent?".to_string(),
		session_id: Some("session-42".to_string()),
		args: Some(args),
	};
	let envelope = service.run(req).await.expect("Run must succeed.");

	assert_eq!(envelope.meta.session_id, "session-42");
	assert_eq!(envelope.actions[0].tool, ToolName::GetRentData);
	assert!(envelope.answer.summary.contains("Montreal"));

	let lines = rp_testkit::read_lines(&dir.join("ledger.jsonl")).expect("Ledger.");

	assert!(lines.iter().all(|line| line["session_id"] == "session-42"));

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn missing_dataset_names_the_dependency() {
	let dir = TestDir::new("service_dataset").expect("Failed to create test dir.");
	let mut cfg = rp_testkit::sample_config(&dir).expect("Config must load.");

	cfg.dataset.local_path = dir.join("missing.json");

	let service = service(cfg, ScriptedReasoning::unavailable());
	let envelope =
		service.run(request("median rent in Toronto")).await.expect("Run must succeed.");

	assert_eq!(envelope.actions[0].tool, ToolName::GetRentData);
	assert!(!envelope.verify.ok);
	assert!(envelope.verify.reasons[0].starts_with("dataset unavailable"));

	let report = service.selftest().await;

	assert!(!report.ok);
	assert!(!report.dataset.ok);
	assert!(report.tools.iter().all(|check| !check.ok));

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn rejects_empty_query_and_broken_weights() {
	let dir = TestDir::new("service_reject").expect("Failed to create test dir.");
	let cfg = rp_testkit::sample_config(&dir).expect("Config must load.");
	let service_ok = service(cfg.clone(), ScriptedReasoning::unavailable());

	assert!(matches!(service_ok.run(request("   ")).await, Err(Error::InvalidRequest { .. })));

	let mut broken = cfg;

	broken.scoring.affordability_weight = 0.9;

	let service_broken = service(broken, ScriptedReasoning::unavailable());

	assert!(matches!(
		service_broken.run(request("suggest areas in Toronto :: income_annual=80000")).await,
		Err(Error::Contract { .. })
	));
	// Nothing is recorded for rejected requests.
	assert!(!dir.join("ledger.jsonl").exists());

	dir.cleanup().expect("Failed to clean up.");
}

#[tokio::test]
async fn selftest_exercises_every_tool() {
	let dir = TestDir::new("service_selftest").expect("Failed to create test dir.");
	let cfg = rp_testkit::sample_config(&dir).expect("Config must load.");
	let reasoning = ScriptedReasoning::unavailable();
	let calls = reasoning.calls.clone();
	let service = service(cfg, reasoning);
	let report = service.selftest().await;

	assert!(report.ok, "Self-test failed: {report:?}");
	assert_eq!(report.dataset.cities, 3);
	assert_eq!(report.tools.len(), ToolName::ALL.len());
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	dir.cleanup().expect("Failed to clean up.");
}
