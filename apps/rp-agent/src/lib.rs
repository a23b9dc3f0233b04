//! One-shot command line entrypoint: answer a single query and exit.

use std::{fmt::Write as _, path::PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rp_service::{Envelope, QueryRequest, RentPilotService};
use rp_storage::ledger::Ledger;

#[derive(Debug, Parser)]
#[command(
	version = rp_cli::VERSION,
	rename_all = "kebab",
	styles = rp_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Free text, optionally followed by `:: key=value` arguments.
	#[arg(value_name = "QUERY")]
	pub query: String,
	/// Print the full envelope as JSON instead of a summary.
	#[arg(long)]
	pub json: bool,
	/// Skip the audit ledger for this run.
	#[arg(long)]
	pub no_ledger: bool,
	#[arg(long, value_name = "ID")]
	pub session_id: Option<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = rp_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let mut service = RentPilotService::new(config)?;

	if args.no_ledger {
		service = service.with_ledger(Ledger::disabled());
	}

	let request = QueryRequest { query: args.query, session_id: args.session_id, args: None };
	let envelope = service.run(request).await?;

	if args.json {
		println!("{}", serde_json::to_string_pretty(&envelope)?);
	} else {
		print!("{}", render(&envelope));
	}

	Ok(())
}

/// Human-readable rendering of an envelope.
pub fn render(envelope: &Envelope) -> String {
	let mut out = String::new();
	let _ = writeln!(out, "{}", envelope.answer.summary);

	if let Some(recommendations) = envelope.answer.recommendations.as_ref() {
		for (idx, candidate) in recommendations.iter().enumerate() {
			let _ = writeln!(
				out,
				"  {}. {} (${:.0}/mo, score {:.3}): {}",
				idx + 1,
				candidate.name,
				candidate.median,
				candidate.score,
				candidate.rationale
			);
		}
	}

	let _ = writeln!(out, "verified: {}", if envelope.verify.ok { "yes" } else { "no" });

	for reason in &envelope.verify.reasons {
		let _ = writeln!(out, "  - {reason}");
	}

	out
}

#[cfg(test)]
mod tests {
	use rp_domain::{tool::Answer, verify::Verification};
	use rp_service::Meta;

	use super::*;

	#[test]
	fn renders_summary_and_reasons() {
		let envelope = Envelope {
			plan: "p".to_string(),
			actions: Vec::new(),
			verify: Verification::fail(vec!["missing required field: city".to_string()]),
			answer: Answer { summary: "Could not complete.".to_string(), ..Default::default() },
			meta: Meta {
				model_id: "m".to_string(),
				agent_version: "v2".to_string(),
				session_id: "s".to_string(),
			},
		};

		assert_eq!(
			render(&envelope),
			"Could not complete.\nverified: no\n  - missing required field: city\n"
		);
	}

	#[test]
	fn parses_flags() {
		let args = Args::try_parse_from([
			"rp-agent",
			"-c",
			"config.toml",
			"median rent in Toronto",
			"--json",
			"--no-ledger",
		])
		.expect("Args must parse.");

		assert!(args.json);
		assert!(args.no_ledger);
		assert_eq!(args.query, "median rent in Toronto");
		assert_eq!(args.session_id, None);
	}
}
