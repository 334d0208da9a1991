use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = moneta_api::Args::parse();
	moneta_api::run(args).await
}
