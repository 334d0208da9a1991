//! Rendering of retrieved transactions into the plain-text block the model
//! reads. One line per transaction, newest first as the store returns them.

use time::{OffsetDateTime, macros::format_description};

use moneta_storage::models::Transaction;

/// Stands in for the transaction block when retrieval comes back empty, so
/// the model can tell "nothing matched" apart from "no data provided".
pub const EMPTY_CONTEXT: &str = "No transactions found for this time period.";

pub fn render(transactions: &[Transaction]) -> String {
	if transactions.is_empty() {
		return EMPTY_CONTEXT.to_string();
	}

	transactions.iter().map(render_line).collect::<Vec<_>>().join("\n")
}

fn render_line(txn: &Transaction) -> String {
	format!(
		"Date: {}, Amount: {}, Category: {}, Note: {}",
		format_date(txn.occurred_at),
		txn.amount,
		txn.category_id.as_deref().unwrap_or("N/A"),
		txn.note.as_deref().unwrap_or("N/A")
	)
}

fn format_date(occurred_at: Option<OffsetDateTime>) -> String {
	occurred_at
		.and_then(|ts| ts.date().format(&format_description!("[year]-[month]-[day]")).ok())
		.unwrap_or_else(|| "Unknown".to_string())
}
