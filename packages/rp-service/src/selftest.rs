//! Offline health check: loads the dataset and runs every tool once, without the reasoning service.

use serde::Serialize;
use serde_json::{Map, Value, json};

use rp_domain::{
	dataset::Snapshot,
	policy,
	query::QueryContext,
	tool::{ToolName, ToolOutput},
	verify,
};

use crate::RentPilotService;

const PROBE_INCOME: f64 = 120_000.0;

#[derive(Clone, Debug, Serialize)]
pub struct DatasetHealth {
	pub ok: bool,
	pub live_mode: bool,
	pub cities: usize,
	pub snapshot_month: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolCheck {
	pub tool: ToolName,
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SelfTestReport {
	pub ok: bool,
	pub dataset: DatasetHealth,
	pub tools: Vec<ToolCheck>,
}

impl RentPilotService {
	pub async fn selftest(&self) -> SelfTestReport {
		let snapshot = match self.dataset.snapshot().await {
			Ok(snapshot) => snapshot,
			Err(err) => {
				let dataset = DatasetHealth {
					ok: false,
					live_mode: false,
					cities: 0,
					snapshot_month: None,
					error: Some(err.to_string()),
				};
				let tools = ToolName::ALL
					.iter()
					.map(|tool| ToolCheck {
						tool: *tool,
						ok: false,
						detail: Some("dataset unavailable".to_string()),
					})
					.collect();

				return SelfTestReport { ok: false, dataset, tools };
			},
		};
		let info = snapshot.info();
		let dataset = DatasetHealth {
			ok: !snapshot.cities.is_empty(),
			live_mode: info.live_mode,
			cities: snapshot.cities.len(),
			snapshot_month: Some(info.snapshot_month),
			error: None,
		};
		let tools: Vec<ToolCheck> = match self.probe_city(&snapshot) {
			Some((city, median)) => ToolName::ALL
				.iter()
				.map(|tool| self.check_tool(*tool, &snapshot, &city, median))
				.collect(),
			None => ToolName::ALL
				.iter()
				.map(|tool| ToolCheck {
					tool: *tool,
					ok: false,
					detail: Some(format!(
						"no city has a {} median to probe with",
						self.cfg.defaults.property_type
					)),
				})
				.collect(),
		};
		let ok = dataset.ok && tools.iter().all(|check| check.ok);

		tracing::info!(ok, cities = dataset.cities, "Self-test finished.");

		SelfTestReport { ok, dataset, tools }
	}

	/// First city, in snapshot order, with a median for the default property type.
	fn probe_city(&self, snapshot: &Snapshot) -> Option<(String, f64)> {
		let property_type = self.cfg.defaults.property_type.as_str();

		snapshot.cities.keys().find_map(|city| {
			snapshot.city_median(city, property_type).ok().map(|median| (city.clone(), median))
		})
	}

	fn check_tool(&self, tool: ToolName, snapshot: &Snapshot, city: &str, median: f64) -> ToolCheck {
		let (query, args) = match tool {
			ToolName::GetRentData => ("median rent", json!({ "city": city })),
			ToolName::GetNeighbourhoodStats => ("neighbourhood transit stats", json!({ "city": city })),
			ToolName::EvaluateRentAffordability => (
				"is this $ listing affordable on my income?",
				json!({ "city": city, "listing_price": median, "income_annual": PROBE_INCOME }),
			),
			ToolName::SuggestNeighbourhoods =>
				("suggest neighbourhoods", json!({ "city": city, "income_annual": PROBE_INCOME })),
			ToolName::ExplainTerm => ("what is rent-to-income?", json!({ "city": city })),
		};
		let args = match args {
			Value::Object(map) => map,
			_ => Map::new(),
		};
		let ctx = QueryContext::build(query, &args, &self.cfg);
		let outcome = match policy::decide_and_act(&ctx, snapshot, &self.cfg) {
			Ok(outcome) => outcome,
			Err(err) => return ToolCheck { tool, ok: false, detail: Some(err.to_string()) },
		};

		if outcome.invocation.tool != tool {
			return ToolCheck {
				tool,
				ok: false,
				detail: Some(format!("probe routed to {}", outcome.invocation.tool.as_str())),
			};
		}
		if let Some(error) = outcome.invocation.error.as_ref() {
			return ToolCheck { tool, ok: false, detail: Some(error.to_string()) };
		}

		// An empty shortlist is a valid result for the probe; only shape errors fail it.
		let shape_ok = match outcome.invocation.result.as_ref() {
			Some(ToolOutput::Suggestions(_)) => true,
			Some(_) => verify::verify(&outcome.invocation, &self.cfg.verify).ok,
			None => false,
		};

		ToolCheck {
			tool,
			ok: shape_ok,
			detail: (!shape_ok).then(|| "tool result failed verification".to_string()),
		}
	}
}
