use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rp_agent::Args::parse();

	rp_agent::run(args).await
}
