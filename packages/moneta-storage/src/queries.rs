use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::Transaction};

const TRANSACTION_COLUMNS: &str = "\
transaction_id, user_id, kind, amount, category_id, occurred_at, note, embedding_version, created_at";

pub async fn insert_transaction(db: &Db, txn: &Transaction) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO transactions (
	transaction_id,
	user_id,
	kind,
	amount,
	category_id,
	occurred_at,
	note,
	embedding_version,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(txn.transaction_id)
	.bind(txn.user_id.as_str())
	.bind(txn.kind.as_str())
	.bind(txn.amount)
	.bind(txn.category_id.as_deref())
	.bind(txn.occurred_at)
	.bind(txn.note.as_deref())
	.bind(txn.embedding_version.as_deref())
	.bind(txn.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Transactions with `occurred_at` inside the inclusive window, newest first.
/// Rows without a date never match. No cap; the window itself is the bound.
pub async fn list_between(
	db: &Db,
	start: OffsetDateTime,
	end: OffsetDateTime,
) -> Result<Vec<Transaction>> {
	let rows = sqlx::query_as::<_, Transaction>(&format!(
		"\
SELECT {TRANSACTION_COLUMNS}
FROM transactions
WHERE occurred_at >= $1 AND occurred_at <= $2
ORDER BY occurred_at DESC",
	))
	.bind(start)
	.bind(end)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// The newest `limit` dated transactions.
pub async fn list_recent(db: &Db, limit: i64) -> Result<Vec<Transaction>> {
	let rows = sqlx::query_as::<_, Transaction>(&format!(
		"\
SELECT {TRANSACTION_COLUMNS}
FROM transactions
WHERE occurred_at IS NOT NULL
ORDER BY occurred_at DESC
LIMIT $1",
	))
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Hydrates rows for ids produced by the vector index, re-ordered to match the
/// input ranking. Ids the store no longer knows are dropped silently.
pub async fn list_in_id_order(db: &Db, ids: &[Uuid]) -> Result<Vec<Transaction>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, Transaction>(&format!(
		"\
SELECT {TRANSACTION_COLUMNS}
FROM transactions
WHERE transaction_id = ANY($1)",
	))
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;
	let mut by_id: std::collections::HashMap<Uuid, Transaction> =
		rows.into_iter().map(|txn| (txn.transaction_id, txn)).collect();

	Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Records the backfill has not indexed yet, oldest first.
pub async fn list_missing_embedding(db: &Db) -> Result<Vec<Transaction>> {
	let rows = sqlx::query_as::<_, Transaction>(&format!(
		"\
SELECT {TRANSACTION_COLUMNS}
FROM transactions
WHERE embedding_version IS NULL
ORDER BY created_at",
	))
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn set_embedding_version(db: &Db, transaction_id: Uuid, version: &str) -> Result<()> {
	sqlx::query(
		"\
UPDATE transactions
SET embedding_version = $1
WHERE transaction_id = $2",
	)
	.bind(version)
	.bind(transaction_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}
