pub mod access;
pub mod analyze;
pub mod backfill;
pub mod context;
pub mod prompt;

mod error;

pub use access::{Caller, CallerAuth};
pub use analyze::{AnalyzeRequest, AnalyzeResponse, RetrievalMode, RetrievalPlan, plan_retrieval};
pub use backfill::BackfillReport;
pub use error::{Error, ServiceResult};

use std::{future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use moneta_config::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, IdentityProviderConfig,
};
use moneta_providers::{embedding, generation, identity, identity::VerifiedIdentity};
use moneta_storage::{db::Db, models::Transaction, qdrant::QdrantStore, queries};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait IdentityVerifier
where
	Self: Send + Sync,
{
	fn verify<'a>(
		&'a self,
		cfg: &'a IdentityProviderConfig,
		token: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<VerifiedIdentity>>;
}

/// Read-side store contract of the pipeline. The only write it allows is
/// stamping a freshly indexed embedding during backfill.
pub trait TransactionStore
where
	Self: Send + Sync,
{
	fn list_between<'a>(
		&'a self,
		start: OffsetDateTime,
		end: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>>;

	fn list_recent<'a>(&'a self, limit: u32) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>>;

	fn nearest<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>>;

	fn list_missing_embedding<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>>;

	fn index_embedding<'a>(
		&'a self,
		transaction_id: Uuid,
		vector: Vec<f32>,
		version: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
	pub identity: Arc<dyn IdentityVerifier>,
}

pub struct MonetaService {
	pub cfg: Config,
	pub store: Arc<dyn TransactionStore>,
	pub providers: Providers,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(generation::generate(cfg, prompt))
	}
}

impl IdentityVerifier for DefaultProviders {
	fn verify<'a>(
		&'a self,
		cfg: &'a IdentityProviderConfig,
		token: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<VerifiedIdentity>> {
		Box::pin(identity::verify(cfg, token))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generation: Arc<dyn GenerationProvider>,
		identity: Arc<dyn IdentityVerifier>,
	) -> Self {
		Self { embedding, generation, identity }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { embedding: provider.clone(), generation: provider.clone(), identity: provider }
	}
}

/// Postgres rows plus a qdrant vector index, the default store behind the
/// pipeline.
pub struct PgStore {
	pub db: Db,
	pub qdrant: QdrantStore,
}
impl PgStore {
	pub async fn ensure_ready(&self) -> color_eyre::Result<()> {
		self.db.ensure_schema().await?;
		self.qdrant.ensure_collection().await?;

		Ok(())
	}
}
impl TransactionStore for PgStore {
	fn list_between<'a>(
		&'a self,
		start: OffsetDateTime,
		end: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move { Ok(queries::list_between(&self.db, start, end).await?) })
	}

	fn list_recent<'a>(
		&'a self,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move { Ok(queries::list_recent(&self.db, i64::from(limit)).await?) })
	}

	fn nearest<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move {
			let ids = self.qdrant.nearest(vector, u64::from(limit)).await?;

			Ok(queries::list_in_id_order(&self.db, &ids).await?)
		})
	}

	fn list_missing_embedding<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move { Ok(queries::list_missing_embedding(&self.db).await?) })
	}

	fn index_embedding<'a>(
		&'a self,
		transaction_id: Uuid,
		vector: Vec<f32>,
		version: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			// Qdrant first: a crash between the two writes leaves the row
			// unstamped and the next backfill run redoes it.
			self.qdrant.upsert_point(transaction_id, vector).await?;
			queries::set_embedding_version(&self.db, transaction_id, version).await?;

			Ok(())
		})
	}
}

impl MonetaService {
	pub fn with_store(
		cfg: Config,
		store: Arc<dyn TransactionStore>,
		providers: Providers,
	) -> Self {
		Self { cfg, store, providers }
	}

	pub(crate) async fn embed_single(&self, text: &str) -> ServiceResult<Vec<f32>> {
		let embeddings = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, std::slice::from_ref(&text.to_string()))
			.await
			.map_err(|err| Error::Upstream { message: err.to_string() })?;
		let Some(vector) = embeddings.into_iter().next() else {
			return Err(Error::Upstream {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Upstream {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(vector)
	}
}

pub fn embedding_version(cfg: &Config) -> String {
	format!(
		"{}:{}:{}",
		cfg.providers.embedding.provider_id,
		cfg.providers.embedding.model,
		cfg.storage.qdrant.vector_dim
	)
}
