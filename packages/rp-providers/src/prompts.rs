use std::{fs, path::Path};

use crate::{Error, Result};

pub const PLANNING_PROMPT: &str = r#"You are the RentPilot planner.
Read the user's rental question and the parsed arguments, then reply with strict JSON only:
{ "plan": <string>, "actions": [ { "tool": <tool name>, "args": <object> } ] }

Tools:
- get_rent_data: { "city": <string>, "property_type": "studio"|"1bed"|"2bed"|"3bed", "include_neighbourhoods": <bool> }
- get_neighbourhood_stats: { "city": <string>, "property_type": <string> }
- evaluate_rent_affordability: { "city": <string>, "listing_price": <number>, "income_annual": <number>, "target_ratio": <0..1>, "city_median": <number, optional> }
- suggest_neighbourhoods: { "city": <string>, "property_type": <string>, "income_annual": <number>, "budget_cap": <number|null> }
- explain_term: { "city": <string, optional> }

Keep actions minimal. Use only the fields provided. No prose outside the JSON."#;

pub const FINALIZE_PROMPT: &str = r#"You are the RentPilot presenter.
You receive the query, the plan, the planned actions and the deterministic tool_result.
Reply with strict JSON only, with keys plan, actions, verify, answer, where answer is
{ "summary": <string> }.
Keep the summary short, friendly and in plain English. Never invent numbers: every figure must
come from tool_result. If tool_result carries an error, explain what input is missing."#;

#[derive(Clone, Debug)]
pub struct PromptSet {
	pub planning: String,
	pub finalize: String,
}
impl PromptSet {
	/// Built-in prompts, replaced by file contents where configured.
	pub fn load(cfg: &rp_config::Prompts) -> Result<Self> {
		Ok(Self {
			planning: load_or(cfg.planning_path.as_deref(), PLANNING_PROMPT)?,
			finalize: load_or(cfg.finalize_path.as_deref(), FINALIZE_PROMPT)?,
		})
	}
}
impl Default for PromptSet {
	fn default() -> Self {
		Self { planning: PLANNING_PROMPT.to_string(), finalize: FINALIZE_PROMPT.to_string() }
	}
}

fn load_or(path: Option<&Path>, fallback: &str) -> Result<String> {
	let Some(path) = path else {
		return Ok(fallback.to_string());
	};
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadPrompt { path: path.to_path_buf(), source: err })?;

	if raw.trim().is_empty() {
		return Ok(fallback.to_string());
	}

	Ok(raw)
}
