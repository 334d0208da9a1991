use time::OffsetDateTime;
use uuid::Uuid;

/// A financial record. Postgres is the source of truth; the vector index holds
/// one point per transaction whose `embedding_version` is stamped.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Transaction {
	pub transaction_id: Uuid,
	/// Attribution only. All allow-listed callers see all transactions.
	pub user_id: String,
	/// "income" or "expense".
	pub kind: String,
	pub amount: f64,
	pub category_id: Option<String>,
	/// The single field all time-based retrieval and ordering depends on.
	/// Absent dates render as "Unknown" and never match range queries.
	pub occurred_at: Option<OffsetDateTime>,
	pub note: Option<String>,
	/// `provider:model:dim` stamp; NULL until the backfill indexes the record.
	pub embedding_version: Option<String>,
	pub created_at: OffsetDateTime,
}
