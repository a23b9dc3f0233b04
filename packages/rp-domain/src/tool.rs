use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	affordability::AffordabilityReport,
	dataset::{LookupError, SnapshotInfo},
	scoring::SuggestReport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
	GetRentData,
	GetNeighbourhoodStats,
	EvaluateRentAffordability,
	SuggestNeighbourhoods,
	ExplainTerm,
}
impl ToolName {
	pub const ALL: [Self; 5] = [
		Self::GetRentData,
		Self::GetNeighbourhoodStats,
		Self::EvaluateRentAffordability,
		Self::SuggestNeighbourhoods,
		Self::ExplainTerm,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::GetRentData => "get_rent_data",
			Self::GetNeighbourhoodStats => "get_neighbourhood_stats",
			Self::EvaluateRentAffordability => "evaluate_rent_affordability",
			Self::SuggestNeighbourhoods => "suggest_neighbourhoods",
			Self::ExplainTerm => "explain_term",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|tool| tool.as_str() == raw.trim())
	}
}

/// One executed tool call. `result` is `None` exactly when `error` is set.
#[derive(Clone, Debug, Serialize)]
pub struct ToolInvocation {
	pub tool: ToolName,
	pub args: Map<String, Value>,
	pub result: Option<ToolOutput>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ToolError>,
}
impl ToolInvocation {
	pub fn succeeded(tool: ToolName, args: Map<String, Value>, output: ToolOutput) -> Self {
		Self { tool, args, result: Some(output), error: None }
	}

	pub fn failed(tool: ToolName, args: Map<String, Value>, error: ToolError) -> Self {
		Self { tool, args, result: None, error: Some(error) }
	}
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
	RentData(RentData),
	NeighbourhoodStats(NeighbourhoodStats),
	Affordability(AffordabilityReport),
	Suggestions(SuggestReport),
	Explanation(Explanation),
}

#[derive(Clone, Debug, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ToolError {
	#[error("city not found: {city}")]
	CityNotFound { city: String },
	#[error("unsupported property type: {property_type}")]
	UnsupportedPropertyType { property_type: String, supported: Vec<String> },
	#[error("missing required fields: {}", .fields.join(", "))]
	MissingInputs { fields: Vec<String> },
	#[error("invalid value for {field}: {message}")]
	InvalidInput { field: String, message: String },
	#[error("dataset unavailable: {message}")]
	DatasetUnavailable { message: String },
}
impl ToolError {
	pub fn from_lookup(err: LookupError, supported: Vec<String>) -> Self {
		match err {
			LookupError::CityNotFound { city } => Self::CityNotFound { city },
			LookupError::UnsupportedPropertyType { property_type } =>
				Self::UnsupportedPropertyType { property_type, supported },
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodMedian {
	pub name: String,
	pub median: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RentData {
	pub city: String,
	pub property_type: String,
	pub median: f64,
	#[serde(flatten)]
	pub snapshot: SnapshotInfo,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub neighbourhoods: Option<Vec<NeighbourhoodMedian>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodStat {
	pub name: String,
	pub median: f64,
	pub transit: u8,
	pub distance_km: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighbourhoodStats {
	pub city: String,
	pub property_type: String,
	#[serde(flatten)]
	pub snapshot: SnapshotInfo,
	pub neighbourhoods: Vec<NeighbourhoodStat>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
	pub term: String,
	pub definition: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub property_type: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub city_median: Option<f64>,
	pub target_rent_to_income: f64,
}

/// Deterministic answer assembled by the router; the orchestrator may replace `summary` only.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Answer {
	pub summary: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub recommendations: Option<Vec<crate::scoring::ScoredCandidate>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}
