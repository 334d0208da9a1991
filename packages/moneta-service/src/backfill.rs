//! Embedding backfill: index every transaction that has embeddable content
//! but no embedding stamp yet. Per-record failures are logged and skipped so
//! one bad row never blocks the rest of the run.

use serde::Serialize;

use moneta_domain::embed_text;

use crate::{Error, MonetaService, ServiceResult, embedding_version};

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
	pub success: bool,
	pub processed: u64,
}

impl MonetaService {
	pub async fn backfill_embeddings(&self) -> ServiceResult<BackfillReport> {
		let pending = self
			.store
			.list_missing_embedding()
			.await
			.map_err(|err| Error::Upstream { message: err.to_string() })?;
		let version = embedding_version(&self.cfg);
		let mut processed = 0;

		tracing::info!(pending = pending.len(), "Starting embedding backfill.");

		for txn in &pending {
			if !embed_text::has_embeddable_content(txn.note.as_deref(), txn.amount) {
				continue;
			}

			let text =
				embed_text::compose(txn.note.as_deref(), txn.category_id.as_deref(), txn.amount);
			let vector = match self.embed_single(&text).await {
				Ok(vector) => vector,
				Err(err) => {
					tracing::error!(
						transaction_id = %txn.transaction_id,
						error = %err,
						"Failed to embed transaction."
					);

					continue;
				},
			};

			if let Err(err) =
				self.store.index_embedding(txn.transaction_id, vector, &version).await
			{
				tracing::error!(
					transaction_id = %txn.transaction_id,
					error = %err,
					"Failed to index transaction embedding."
				);

				continue;
			}

			processed += 1;

			tracing::info!(transaction_id = %txn.transaction_id, "Indexed transaction embedding.");
		}

		tracing::info!(processed, "Embedding backfill finished.");

		Ok(BackfillReport { success: true, processed })
	}
}
