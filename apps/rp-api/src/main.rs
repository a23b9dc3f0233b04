use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rp_api::Args::parse();

	rp_api::run(args).await
}
