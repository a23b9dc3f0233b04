//! The request pipeline: parse, plan, act, finalize, verify, record, respond.
//!
//! Only `Err` for invalid requests and contract violations. Every other failure lands in the
//! envelope as `verify.ok = false` with a reason.

use serde_json::{Value, json};
use uuid::Uuid;

use rp_domain::{
	intent::classify_intent,
	policy,
	query::QueryContext,
	scoring::ScoringWeights,
	tool::{Answer, ToolError, ToolInvocation},
	verify,
};
use rp_providers::{
	json_extract::{self, ParsedFinal, ParsedPlan},
	reasoning,
};
use rp_storage::ledger::{LedgerContext, Stage};

use crate::{Envelope, Error, Meta, QueryRequest, RentPilotService, Result};

struct Acted {
	plan: String,
	invocation: ToolInvocation,
	answer: Answer,
}

impl RentPilotService {
	pub async fn run(&self, req: QueryRequest) -> Result<Envelope> {
		let QueryRequest { query, session_id, args } = req;
		let query = query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		ScoringWeights::from_config(&self.cfg.scoring)
			.map_err(|err| Error::Contract { message: err.to_string() })?;

		let session_id = self.resolve_session_id(session_id.as_deref());
		let ctx = QueryContext::build(query, &args.unwrap_or_default(), &self.cfg);
		let ledger_ctx = LedgerContext {
			session_id: session_id.clone(),
			agent_version: self.cfg.agent.agent_version.clone(),
			model_id: self.cfg.providers.reasoning.model.clone(),
			user_query: query.to_string(),
		};
		let mut degraded = Vec::new();

		tracing::info!(session_id = %session_id, "Planning request.");

		let planned = self.plan(&ctx, &mut degraded).await;
		let planned_actions = planned.as_ref().map(|p| p.actions.clone()).unwrap_or_default();

		self.ledger
			.write_step(
				&ledger_ctx,
				Stage::Planning,
				&json!({
					"plan": planned.as_ref().map(|p| p.plan.as_str()),
					"actions": planned_actions,
					"args": ctx.args,
					"hints": ctx.hints,
					"prefs": ctx.prefs,
				}),
			)
			.await;

		let Acted { plan: router_plan, invocation, mut answer } = self.act(&ctx).await?;

		tracing::info!(
			tool = invocation.tool.as_str(),
			failed = invocation.error.is_some(),
			"Tool executed."
		);

		self.ledger
			.write_step(
				&ledger_ctx,
				Stage::ToolExecute,
				&json!({ "plan": router_plan, "invocation": invocation }),
			)
			.await;

		let plan = planned.map(|p| p.plan).unwrap_or(router_plan);
		let finalized = self
			.finalize(query, &plan, &serde_json::to_value(&planned_actions)?, &invocation, &mut degraded)
			.await?;
		let proposed_verify = finalized.as_ref().and_then(|f| f.verify.clone());

		if let Some(summary) = finalized.and_then(|f| f.summary) {
			answer.summary = summary;
		}

		let mut verification = verify::verify(&invocation, &self.cfg.verify);

		for reason in degraded {
			verification.degrade(reason);
		}
		if proposed_verify.is_some() {
			tracing::debug!("Discarding the proposed verification in favour of the local result.");
		}

		self.ledger
			.write_step(
				&ledger_ctx,
				Stage::Finalize,
				&json!({
					"answer": answer,
					"verify": verification,
					"proposed_verify": proposed_verify,
				}),
			)
			.await;

		let envelope = Envelope {
			plan,
			actions: vec![invocation],
			verify: verification,
			answer,
			meta: Meta {
				model_id: ledger_ctx.model_id.clone(),
				agent_version: ledger_ctx.agent_version.clone(),
				session_id,
			},
		};

		self.ledger.write_entry(&ledger_ctx, &serde_json::to_value(&envelope)?).await;

		tracing::info!(
			session_id = %envelope.meta.session_id,
			ok = envelope.verify.ok,
			"Request completed."
		);

		Ok(envelope)
	}

	fn resolve_session_id(&self, requested: Option<&str>) -> String {
		requested
			.map(str::trim)
			.filter(|id| !id.is_empty())
			.map(str::to_string)
			.or_else(|| self.cfg.agent.session_id.clone())
			.unwrap_or_else(|| Uuid::new_v4().to_string())
	}

	/// `None` when the call itself failed; an unparseable reply still yields a fallback plan.
	async fn plan(&self, ctx: &QueryContext, degraded: &mut Vec<String>) -> Option<ParsedPlan> {
		let llm = &self.cfg.providers.reasoning;
		let user = reasoning::planning_payload(&ctx.text, &ctx.args);
		let reply = self
			.providers
			.reasoning
			.complete(llm, &self.prompts.planning, &user, llm.planning_max_tokens)
			.await;

		match reply {
			Ok(raw) => Some(json_extract::parse_plan(&raw).unwrap_or_else(|| {
				tracing::warn!("Planning reply held no usable JSON. Keeping the raw text.");

				ParsedPlan::fallback(&raw)
			})),
			Err(err) => {
				tracing::error!(error = %err, "Planning call failed.");

				degraded.push(format!("reasoning service (plan) unavailable: {err}"));

				None
			},
		}
	}

	async fn act(&self, ctx: &QueryContext) -> Result<Acted> {
		let max_results = self.cfg.scoring.max_results as usize;
		let snapshot = match self.dataset.snapshot().await {
			Ok(snapshot) => snapshot,
			Err(err) => {
				let message = match err {
					rp_storage::Error::Unavailable { message } => message,
					other => other.to_string(),
				};
				let intent = classify_intent(&ctx.classification_text());

				tracing::error!(error = %message, "Dataset unavailable.");

				let invocation = ToolInvocation::failed(
					intent.tool(),
					ctx.args.clone(),
					ToolError::DatasetUnavailable { message },
				);
				let answer = policy::answer_for(&invocation, max_results);

				return Ok(Acted {
					plan: format!("intent={}; dataset unavailable", intent.as_str()),
					invocation,
					answer,
				});
			},
		};

		match policy::decide_and_act(ctx, &snapshot, &self.cfg) {
			Ok(outcome) =>
				Ok(Acted { plan: outcome.plan, invocation: outcome.invocation, answer: outcome.answer }),
			Err(err) => {
				let Some(invocation) = err.to_invocation() else {
					return Err(err.into());
				};

				tracing::warn!(error = %err, "Router failed fast. Continuing with the failed invocation.");

				let answer = policy::answer_for(&invocation, max_results);

				Ok(Acted { plan: err.to_string(), invocation, answer })
			},
		}
	}

	async fn finalize(
		&self,
		query: &str,
		plan: &str,
		planned_actions: &Value,
		invocation: &ToolInvocation,
		degraded: &mut Vec<String>,
	) -> Result<Option<ParsedFinal>> {
		let llm = &self.cfg.providers.reasoning;
		let tool_result = serde_json::to_value(invocation)?;
		let user = reasoning::finalize_payload(query, plan, planned_actions, &tool_result);
		let reply = self
			.providers
			.reasoning
			.complete(llm, &self.prompts.finalize, &user, llm.finalize_max_tokens)
			.await;

		match reply {
			Ok(raw) => {
				let parsed = json_extract::parse_final(&raw);

				if parsed.is_none() {
					tracing::warn!("Finalize reply held no usable JSON. Keeping the deterministic summary.");
				}

				Ok(parsed)
			},
			Err(err) => {
				tracing::error!(error = %err, "Finalize call failed.");

				degraded.push(format!("reasoning service (finalize) unavailable: {err}"));

				Ok(None)
			},
		}
	}
}
