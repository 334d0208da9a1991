//! Prompt assembly for the answer model. The date anchors are computed
//! server-side so the model never has to guess what "now" is.

use time::{Month, OffsetDateTime, macros::format_description};

pub fn build(question: &str, context: &str, now: OffsetDateTime) -> String {
	let current_date = now
		.date()
		.format(&format_description!("[year]-[month]-[day]"))
		.unwrap_or_else(|_| now.date().to_string());
	let current_month = format!("{} {}", now.month(), now.year());
	let last_month = match now.month() {
		Month::January => format!("{} {}", Month::December, now.year() - 1),
		month => format!("{} {}", month.previous(), now.year()),
	};

	format!(
		"You are a helpful and friendly financial assistant analyzing personal expense data.\n\
		 \n\
		 CURRENT DATE: {current_date}\n\
		 CURRENT MONTH: {current_month}\n\
		 LAST MONTH: {last_month}\n\
		 \n\
		 USER QUESTION: {question}\n\
		 \n\
		 TRANSACTION DATA:\n\
		 {context}\n\
		 \n\
		 INSTRUCTIONS:\n\
		 1. Use the current date to correctly interpret relative time references (e.g., \"last month\" = {last_month})\n\
		 2. Filter the transactions based on the time period mentioned in the question\n\
		 3. Calculate totals, averages, or breakdowns as needed\n\
		 4. If asked about spending by category, group and sum the amounts\n\
		 5. Format currency amounts nicely (e.g., 1,234.56)\n\
		 6. If no relevant transactions are found for the time period, say so clearly\n\
		 7. Be concise but informative\n\
		 8. If the question is vague, provide a helpful summary\n\
		 \n\
		 Provide your answer:"
	)
}
