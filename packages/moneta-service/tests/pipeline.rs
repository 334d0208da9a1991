//! End-to-end pipeline tests against in-memory fakes: routing between the
//! three retrieval paths, access control ordering, and the backfill loop.

use std::sync::{
	Arc, Mutex,
	atomic::{AtomicUsize, Ordering},
};

use time::{OffsetDateTime, macros::datetime};
use uuid::Uuid;

use moneta_config::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, IdentityProviderConfig, Postgres,
	Providers as ProvidersConfig, Qdrant, Retrieval, Security, Service, Storage,
};
use moneta_providers::identity::VerifiedIdentity;
use moneta_service::{
	AnalyzeRequest, BoxFuture, CallerAuth, EmbeddingProvider, Error, GenerationProvider,
	IdentityVerifier, MonetaService, Providers, TransactionStore,
};
use moneta_storage::models::Transaction;

const DIM: u32 = 4;

fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			postgres: Postgres { dsn: "postgres://unused".to_string(), pool_max_conns: 1 },
			qdrant: Qdrant {
				url: "http://unused:6334".to_string(),
				collection: "transactions".to_string(),
				vector_dim: DIM,
			},
		},
		providers: ProvidersConfig {
			embedding: EmbeddingProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://unused".to_string(),
				api_key: "k".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "fake-embed".to_string(),
				dimensions: DIM,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			generation: GenerationProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://unused".to_string(),
				api_key: "k".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "fake-chat".to_string(),
				temperature: 0.2,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			identity: IdentityProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://unused".to_string(),
				api_key: "k".to_string(),
				path: "/v1/accounts:lookup".to_string(),
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
		},
		retrieval: Retrieval::default(),
		security: Security {
			bind_localhost_only: true,
			allowed_emails: vec!["owner@example.com".to_string()],
		},
	}
}

fn txn(amount: f64, note: Option<&str>, occurred_at: Option<OffsetDateTime>) -> Transaction {
	Transaction {
		transaction_id: Uuid::new_v4(),
		user_id: "u-1".to_string(),
		kind: "expense".to_string(),
		amount,
		category_id: Some("groceries".to_string()),
		occurred_at,
		note: note.map(str::to_string),
		embedding_version: None,
		created_at: datetime!(2024-03-01 00:00 UTC),
	}
}

#[derive(Default)]
struct StoreCalls {
	between: Vec<(OffsetDateTime, OffsetDateTime)>,
	recent: Vec<u32>,
	nearest: Vec<u32>,
	indexed: Vec<(Uuid, String)>,
}

#[derive(Default)]
struct FakeStore {
	transactions: Vec<Transaction>,
	pending: Vec<Transaction>,
	fail_indexing: Option<Uuid>,
	calls: Mutex<StoreCalls>,
}

impl TransactionStore for FakeStore {
	fn list_between<'a>(
		&'a self,
		start: OffsetDateTime,
		end: OffsetDateTime,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move {
			self.calls.lock().unwrap().between.push((start, end));

			Ok(self.transactions.clone())
		})
	}

	fn list_recent<'a>(
		&'a self,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move {
			self.calls.lock().unwrap().recent.push(limit);

			Ok(self.transactions.clone())
		})
	}

	fn nearest<'a>(
		&'a self,
		_vector: Vec<f32>,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move {
			self.calls.lock().unwrap().nearest.push(limit);

			Ok(self.transactions.clone())
		})
	}

	fn list_missing_embedding<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<Transaction>>> {
		Box::pin(async move { Ok(self.pending.clone()) })
	}

	fn index_embedding<'a>(
		&'a self,
		transaction_id: Uuid,
		_vector: Vec<f32>,
		version: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			if self.fail_indexing == Some(transaction_id) {
				return Err(color_eyre::eyre::eyre!("index write refused"));
			}

			self.calls.lock().unwrap().indexed.push((transaction_id, version.to_string()));

			Ok(())
		})
	}
}

struct FakeEmbedding {
	calls: AtomicUsize,
	dim: usize,
}
impl FakeEmbedding {
	fn new(dim: usize) -> Self {
		Self { calls: AtomicUsize::new(0), dim }
	}
}
impl EmbeddingProvider for FakeEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(texts.iter().map(|_| vec![0.1; self.dim]).collect())
		})
	}
}

struct FakeGeneration {
	prompts: Mutex<Vec<String>>,
	fail: bool,
}
impl FakeGeneration {
	fn new() -> Self {
		Self { prompts: Mutex::new(Vec::new()), fail: false }
	}
}
impl GenerationProvider for FakeGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a GenerationProviderConfig,
		prompt: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			if self.fail {
				return Err(color_eyre::eyre::eyre!("model unavailable"));
			}

			self.prompts.lock().unwrap().push(prompt.to_string());

			Ok("You spent 42.50 in total.".to_string())
		})
	}
}

struct FakeIdentity {
	calls: AtomicUsize,
	email: Option<String>,
}
impl IdentityVerifier for FakeIdentity {
	fn verify<'a>(
		&'a self,
		_cfg: &'a IdentityProviderConfig,
		_token: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<VerifiedIdentity>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(VerifiedIdentity { uid: "verified-uid".to_string(), email: self.email.clone() })
		})
	}
}

struct Fixture {
	service: MonetaService,
	store: Arc<FakeStore>,
	embedding: Arc<FakeEmbedding>,
	generation: Arc<FakeGeneration>,
	identity: Arc<FakeIdentity>,
}

fn fixture(store: FakeStore) -> Fixture {
	let store = Arc::new(store);
	let embedding = Arc::new(FakeEmbedding::new(DIM as usize));
	let generation = Arc::new(FakeGeneration::new());
	let identity =
		Arc::new(FakeIdentity { calls: AtomicUsize::new(0), email: Some("owner@example.com".to_string()) });
	let providers =
		Providers::new(embedding.clone(), generation.clone(), identity.clone());
	let service = MonetaService::with_store(test_config(), store.clone(), providers);

	Fixture { service, store, embedding, generation, identity }
}

fn verified_auth() -> CallerAuth {
	CallerAuth {
		uid: Some("u-1".to_string()),
		email: Some("owner@example.com".to_string()),
		bearer: None,
	}
}

fn question(text: &str) -> AnalyzeRequest {
	AnalyzeRequest { question: Some(serde_json::Value::String(text.to_string())) }
}

#[tokio::test]
async fn date_range_question_queries_the_window_and_skips_embedding() {
	let f = fixture(FakeStore {
		transactions: vec![txn(42.5, Some("market"), Some(datetime!(2024-02-10 12:00 UTC)))],
		..Default::default()
	});
	let now = datetime!(2024-03-15 10:00 UTC);
	let response = f
		.service
		.analyze_at(&verified_auth(), question("How much did I spend last month?"), now)
		.await
		.unwrap();

	assert_eq!(response.answer, "You spent 42.50 in total.");

	let calls = f.store.calls.lock().unwrap();

	assert_eq!(
		calls.between,
		[(datetime!(2024-02-01 00:00 UTC), datetime!(2024-02-29 23:59:59 UTC))]
	);
	assert!(calls.recent.is_empty());
	assert!(calls.nearest.is_empty());
	assert_eq!(f.embedding.calls.load(Ordering::SeqCst), 0);

	let prompts = f.generation.prompts.lock().unwrap();

	assert_eq!(prompts.len(), 1);
	assert!(prompts[0].contains("Date: 2024-02-10, Amount: 42.5, Category: groceries, Note: market"));
	assert!(prompts[0].contains("CURRENT DATE: 2024-03-15"));
}

#[tokio::test]
async fn vague_time_question_falls_back_to_recency() {
	let f = fixture(FakeStore {
		transactions: vec![txn(9.0, Some("coffee"), Some(datetime!(2024-03-14 08:00 UTC)))],
		..Default::default()
	});
	let now = datetime!(2024-03-15 10:00 UTC);

	f.service
		.analyze_at(&verified_auth(), question("What have I bought recently?"), now)
		.await
		.unwrap();

	let calls = f.store.calls.lock().unwrap();

	assert!(calls.between.is_empty());
	assert_eq!(calls.recent, [200]);
	assert_eq!(f.embedding.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn timeless_question_embeds_once_and_searches_nearest() {
	let f = fixture(FakeStore {
		transactions: vec![
			txn(5.0, Some("espresso"), Some(datetime!(2024-03-01 08:00 UTC))),
			txn(4.5, Some("latte"), Some(datetime!(2024-02-20 08:00 UTC))),
		],
		..Default::default()
	});
	let now = datetime!(2024-03-15 10:00 UTC);
	let _ = f
		.service
		.analyze_at(&verified_auth(), question("How much do I spend on coffee?"), now)
		.await
		.unwrap();

	let calls = f.store.calls.lock().unwrap();

	assert!(calls.between.is_empty());
	assert!(calls.recent.is_empty());
	assert_eq!(calls.nearest, [20]);
	assert_eq!(f.embedding.calls.load(Ordering::SeqCst), 1);

	// Similarity ranking from the store must survive into the context as-is.
	let prompts = f.generation.prompts.lock().unwrap();
	let espresso = prompts[0].find("espresso").unwrap();
	let latte = prompts[0].find("latte").unwrap();

	assert!(espresso < latte);
}

#[tokio::test]
async fn last_week_window_runs_from_midnight_a_week_ago_to_now() {
	let f = fixture(FakeStore::default());
	// A Friday.
	let now = datetime!(2024-03-15 14:45:12 UTC);

	f.service
		.analyze_at(&verified_auth(), question("How much did I spend last week?"), now)
		.await
		.unwrap();

	let calls = f.store.calls.lock().unwrap();

	assert_eq!(calls.between, [(datetime!(2024-03-08 00:00 UTC), now)]);
}

#[tokio::test]
async fn semantic_path_with_no_matches_still_prompts_with_the_sentinel() {
	let f = fixture(FakeStore::default());
	let now = datetime!(2024-03-15 10:00 UTC);
	let response = f
		.service
		.analyze_at(&verified_auth(), question("Show me my coffee expenses"), now)
		.await
		.unwrap();

	assert_eq!(response.answer, "You spent 42.50 in total.");
	assert_eq!(f.store.calls.lock().unwrap().nearest, [20]);

	let prompts = f.generation.prompts.lock().unwrap();

	assert_eq!(prompts.len(), 1);
	assert!(prompts[0].contains("No transactions found for this time period."));
}

#[tokio::test]
async fn empty_retrieval_prompts_with_the_sentinel() {
	let f = fixture(FakeStore::default());
	let now = datetime!(2024-03-15 10:00 UTC);

	f.service.analyze_at(&verified_auth(), question("spending this week?"), now).await.unwrap();

	let prompts = f.generation.prompts.lock().unwrap();

	assert!(prompts[0].contains("No transactions found for this time period."));
}

#[tokio::test]
async fn missing_identity_is_unauthenticated_and_touches_nothing() {
	let f = fixture(FakeStore::default());
	let err = f
		.service
		.analyze(&CallerAuth::default(), question("total last month?"))
		.await
		.unwrap_err();

	assert!(matches!(err, Error::Unauthenticated));

	let calls = f.store.calls.lock().unwrap();

	assert!(calls.between.is_empty() && calls.recent.is_empty() && calls.nearest.is_empty());
	assert!(f.generation.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unlisted_email_is_denied() {
	let f = fixture(FakeStore::default());
	let auth = CallerAuth {
		uid: Some("u-2".to_string()),
		email: Some("Intruder@Example.com".to_string()),
		bearer: None,
	};
	let err = f.service.analyze(&auth, question("total?")).await.unwrap_err();

	assert!(matches!(err, Error::PermissionDenied { email } if email == "intruder@example.com"));
}

#[tokio::test]
async fn bearer_token_is_verified_when_no_identity_is_present() {
	let f = fixture(FakeStore::default());
	let auth = CallerAuth { uid: None, email: None, bearer: Some("token-abc".to_string()) };

	f.service.analyze(&auth, question("total last month?")).await.unwrap();

	assert_eq!(f.identity.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pre_verified_identity_skips_the_verifier() {
	let f = fixture(FakeStore::default());

	f.service.analyze(&verified_auth(), question("total last month?")).await.unwrap();

	assert_eq!(f.identity.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_string_question_is_invalid_before_retrieval() {
	let f = fixture(FakeStore::default());
	let request = AnalyzeRequest { question: Some(serde_json::json!({ "text": "hi" })) };
	let err = f.service.analyze(&verified_auth(), request).await.unwrap_err();

	assert!(matches!(err, Error::InvalidArgument { .. }));
	assert!(f.store.calls.lock().unwrap().nearest.is_empty());
}

#[tokio::test]
async fn generation_failure_maps_to_generation_error() {
	let store = Arc::new(FakeStore::default());
	let generation = Arc::new(FakeGeneration { prompts: Mutex::new(Vec::new()), fail: true });
	let identity = Arc::new(FakeIdentity { calls: AtomicUsize::new(0), email: None });
	let providers = Providers::new(
		Arc::new(FakeEmbedding::new(DIM as usize)),
		generation,
		identity,
	);
	let service = MonetaService::with_store(test_config(), store, providers);
	let err =
		service.analyze(&verified_auth(), question("total last month?")).await.unwrap_err();

	assert!(matches!(err, Error::Generation { .. }));
}

#[tokio::test]
async fn embedding_dimension_mismatch_is_upstream() {
	let store = Arc::new(FakeStore::default());
	let providers = Providers::new(
		Arc::new(FakeEmbedding::new(DIM as usize + 1)),
		Arc::new(FakeGeneration::new()),
		Arc::new(FakeIdentity { calls: AtomicUsize::new(0), email: None }),
	);
	let service = MonetaService::with_store(test_config(), store, providers);
	let err = service
		.analyze(&verified_auth(), question("How much do I spend on coffee?"))
		.await
		.unwrap_err();

	assert!(matches!(err, Error::Upstream { .. }));
}

#[tokio::test]
async fn backfill_indexes_pending_rows_and_skips_empty_ones() {
	let embeddable = txn(42.5, Some("market run"), Some(datetime!(2024-03-10 12:00 UTC)));
	let amount_only = txn(12.0, None, Some(datetime!(2024-03-11 12:00 UTC)));
	let empty = txn(0.0, None, None);
	let f = fixture(FakeStore {
		pending: vec![embeddable.clone(), amount_only.clone(), empty],
		..Default::default()
	});
	let report = f.service.backfill_embeddings().await.unwrap();

	assert!(report.success);
	assert_eq!(report.processed, 2);
	assert_eq!(f.embedding.calls.load(Ordering::SeqCst), 2);

	let calls = f.store.calls.lock().unwrap();
	let indexed = calls.indexed.iter().map(|(id, _)| *id).collect::<Vec<_>>();

	assert_eq!(indexed, [embeddable.transaction_id, amount_only.transaction_id]);
	assert!(calls.indexed.iter().all(|(_, version)| version == "fake:fake-embed:4"));
}

#[tokio::test]
async fn backfill_continues_past_an_indexing_failure() {
	let first = txn(10.0, Some("one"), None);
	let second = txn(20.0, Some("two"), None);
	let f = fixture(FakeStore {
		pending: vec![first.clone(), second.clone()],
		fail_indexing: Some(first.transaction_id),
		..Default::default()
	});
	let report = f.service.backfill_embeddings().await.unwrap();

	assert_eq!(report.processed, 1);

	let calls = f.store.calls.lock().unwrap();

	assert_eq!(calls.indexed.len(), 1);
	assert_eq!(calls.indexed[0].0, second.transaction_id);
}
