//! One-shot embedding backfill runner. Meant for cron or manual invocation;
//! the API's admin endpoint triggers the same routine in-process.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use moneta_service::{MonetaService, PgStore, Providers};
use moneta_storage::{db::Db, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(
	version = moneta_cli::VERSION,
	rename_all = "kebab",
	styles = moneta_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = moneta_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;
	let qdrant = QdrantStore::new(&config.storage.qdrant)?;
	let store = PgStore { db, qdrant };
	store.ensure_ready().await?;

	let service = MonetaService::with_store(config, Arc::new(store), Providers::default());
	let report = service.backfill_embeddings().await?;

	tracing::info!(processed = report.processed, "Backfill run complete.");
	Ok(())
}
