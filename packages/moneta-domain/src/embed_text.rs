/// Text composition shared by indexing and backfill.
///
/// Query-time question embeddings and transaction embeddings must live in the
/// same vector space, so every indexed transaction is rendered through this one
/// rule: note, category and amount joined by single spaces, empty parts
/// omitted. Changing it silently invalidates every stored vector.
pub fn compose(note: Option<&str>, category_id: Option<&str>, amount: f64) -> String {
	let mut parts = Vec::with_capacity(3);

	if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
		parts.push(note.to_string());
	}
	if let Some(category_id) =
		category_id.map(str::trim).filter(|category_id| !category_id.is_empty())
	{
		parts.push(category_id.to_string());
	}
	if amount != 0.0 {
		parts.push(amount.to_string());
	}

	parts.join(" ")
}

/// A record with no note and a zero amount carries nothing worth indexing.
pub fn has_embeddable_content(note: Option<&str>, amount: f64) -> bool {
	note.map(str::trim).filter(|note| !note.is_empty()).is_some() || amount != 0.0
}
