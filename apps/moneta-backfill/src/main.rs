use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = moneta_backfill::Args::parse();
	moneta_backfill::run(args).await
}
