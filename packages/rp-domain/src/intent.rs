use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tool::ToolName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	Explain,
	CityRent,
	NeighbourhoodStats,
	Affordability,
	Suggest,
}
impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Explain => "explain",
			Self::CityRent => "city_rent",
			Self::NeighbourhoodStats => "neighbourhood_stats",
			Self::Affordability => "affordability",
			Self::Suggest => "suggest",
		}
	}

	pub fn tool(self) -> ToolName {
		match self {
			Self::Explain => ToolName::ExplainTerm,
			Self::CityRent => ToolName::GetRentData,
			Self::NeighbourhoodStats => ToolName::GetNeighbourhoodStats,
			Self::Affordability => ToolName::EvaluateRentAffordability,
			Self::Suggest => ToolName::SuggestNeighbourhoods,
		}
	}
}

/// A rule fires when every signal group has at least one matching pattern and none of the
/// `unless` patterns match.
struct IntentRule {
	intent: Intent,
	requires: &'static [&'static [&'static str]],
	unless: &'static [&'static str],
}

const SELECTION: &[&str] = &[
	r"\bsuggest",
	r"\bshortlist",
	r"\brecommend",
	r"\bwhere should i (?:live|rent|move|look)",
	r"\bbest (?:neighbou?rhoods?|areas?|places?)\b",
	r"\bwhich (?:neighbou?rhoods?|areas?) (?:should|would|could)\b",
];

const PRICE: &[&str] = &[
	r"\$\s*\d",
	r"\b(?:listing|asking|price)",
	r"\d[\d,]*(?:\.\d+)?\s*(?:/|per\s+)(?:mo|month)\b",
	r"\brent (?:of|is|at)\s+\$?\d",
	r"\bafford\w*\s+(?:a\s+)?\$?\d",
];

const INCOME: &[&str] = &[
	r"\b(?:income|salary|salaries|earn|wage|paycheck)",
	r"\b\d+(?:\.\d+)?\s*k\b",
	r"(?:/|per\s+)(?:yr|year|annum)\b",
	r"\bannual(?:ly)?\b",
	r"\bi make\b",
];

const DEFINITION: &[&str] = &[
	r"\bwhat(?:'s|\s+is|\s+are|\s+does)\b",
	r"\bexplain\b",
	r"\bdefin(?:e|ition)\b",
	r"\bmeaning of\b",
	r"\bhow (?:is|are) .+ (?:calculated|computed)\b",
];

const GLOSSARY: &[&str] = &[
	r"\brti\b",
	r"\brent[\s-]*to[\s-]*income\b",
	r"\btransit score\b",
	r"\bcomposite score\b",
];

/// Asking about a metric across neighbourhoods is a data request, not a definition.
const NEIGHBOURHOOD_SCOPE: &[&str] = &[r"\bneighbou?rhoods?\b", r"\bareas?\b"];

const NEIGHBOURHOOD_STATS: &[&str] =
	&[r"\btransit\b", r"\bneighbou?rhoods?\b", r"\bcommute\b", r"\bdistance\b"];

const CITY_RENT: &[&str] = &[
	r"\bmedian\b",
	r"\baverage rent\b",
	r"\btypical rent\b",
	r"\brent (?:in|for)\b",
	r"\bhow much (?:is|does) (?:the )?rent\b",
	r"\brent\b",
];

/// Ordered by priority: the first rule that fires wins.
const RULES: &[IntentRule] = &[
	IntentRule { intent: Intent::Suggest, requires: &[SELECTION], unless: &[] },
	IntentRule { intent: Intent::Affordability, requires: &[PRICE, INCOME], unless: &[] },
	IntentRule {
		intent: Intent::Explain,
		requires: &[DEFINITION, GLOSSARY],
		unless: NEIGHBOURHOOD_SCOPE,
	},
	IntentRule {
		intent: Intent::NeighbourhoodStats,
		requires: &[NEIGHBOURHOOD_STATS],
		unless: &[],
	},
	IntentRule { intent: Intent::CityRent, requires: &[CITY_RENT], unless: &[] },
];

const FALLBACK: Intent = Intent::Explain;

pub fn classify_intent(text: &str) -> Intent {
	let lowered = text.to_lowercase();

	RULES
		.iter()
		.find(|rule| {
			rule.requires.iter().all(|group| any_match(group, &lowered))
				&& !any_match(rule.unless, &lowered)
		})
		.map(|rule| rule.intent)
		.unwrap_or(FALLBACK)
}

fn any_match(patterns: &[&str], text: &str) -> bool {
	patterns
		.iter()
		.any(|pattern| Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false))
}
