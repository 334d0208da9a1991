//! The question-answering pipeline: authorize, plan retrieval, fetch
//! transactions, render context, prompt the model.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use moneta_domain::time_range::{self, DateRange};
use moneta_storage::models::Transaction;

use crate::{CallerAuth, Error, MonetaService, ServiceResult, context, prompt};

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
	// Kept as a raw value so a non-string question can be rejected with a
	// field-level error instead of a deserialization failure.
	#[serde(default)]
	pub question: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
	pub answer: String,
}

/// How a question maps onto the store, decided before any I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalPlan {
	/// A recognized phrase resolved to a concrete date window.
	Window(DateRange),
	/// Time-flavored wording without a resolvable window; newest rows win.
	Recent,
	/// No time signal at all; rank by embedding similarity.
	Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
	DateRange,
	Recency,
	Semantic,
}

impl RetrievalMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::DateRange => "date_range",
			Self::Recency => "recency",
			Self::Semantic => "semantic",
		}
	}
}

pub fn plan_retrieval(question: &str, now: OffsetDateTime) -> RetrievalPlan {
	if let Some(range) = time_range::resolve(question, now) {
		return RetrievalPlan::Window(range);
	}
	if time_range::mentions_time(question) {
		return RetrievalPlan::Recent;
	}

	RetrievalPlan::Semantic
}

struct Retrieval {
	mode: RetrievalMode,
	transactions: Vec<Transaction>,
}

impl MonetaService {
	pub async fn analyze(
		&self,
		auth: &CallerAuth,
		request: AnalyzeRequest,
	) -> ServiceResult<AnalyzeResponse> {
		self.analyze_at(auth, request, OffsetDateTime::now_utc()).await
	}

	/// [`Self::analyze`] with an injectable clock.
	pub async fn analyze_at(
		&self,
		auth: &CallerAuth,
		request: AnalyzeRequest,
		now: OffsetDateTime,
	) -> ServiceResult<AnalyzeResponse> {
		let caller = self.authorize(auth).await?;
		let question = validate_question(request)?;

		tracing::info!(uid = %caller.uid, "Analyzing question.");

		let retrieval = self.retrieve(&question, now).await?;

		tracing::info!(
			mode = retrieval.mode.as_str(),
			count = retrieval.transactions.len(),
			"Retrieved transactions."
		);

		let context = context::render(&retrieval.transactions);
		let prompt = prompt::build(&question, &context, now);
		let answer = self
			.providers
			.generation
			.generate(&self.cfg.providers.generation, &prompt)
			.await
			.map_err(|err| Error::Generation { message: err.to_string() })?;

		Ok(AnalyzeResponse { answer })
	}

	async fn retrieve(&self, question: &str, now: OffsetDateTime) -> ServiceResult<Retrieval> {
		match plan_retrieval(question, now) {
			RetrievalPlan::Window(range) => {
				tracing::info!(start = %range.start, end = %range.end, "Resolved date window.");

				let transactions = self
					.store
					.list_between(range.start, range.end)
					.await
					.map_err(|err| Error::Upstream { message: err.to_string() })?;

				Ok(Retrieval { mode: RetrievalMode::DateRange, transactions })
			},
			RetrievalPlan::Recent => {
				let transactions = self
					.store
					.list_recent(self.cfg.retrieval.recent_limit)
					.await
					.map_err(|err| Error::Upstream { message: err.to_string() })?;

				Ok(Retrieval { mode: RetrievalMode::Recency, transactions })
			},
			RetrievalPlan::Semantic => {
				let vector = self.embed_single(question).await?;
				let transactions = self
					.store
					.nearest(vector, self.cfg.retrieval.semantic_top_k)
					.await
					.map_err(|err| Error::Upstream { message: err.to_string() })?;

				Ok(Retrieval { mode: RetrievalMode::Semantic, transactions })
			},
		}
	}
}

fn validate_question(request: AnalyzeRequest) -> ServiceResult<String> {
	let invalid = || Error::InvalidArgument {
		message: "The request must include a non-empty \"question\" string.".to_string(),
	};
	let Some(value) = request.question else {
		return Err(invalid());
	};
	let Some(question) = value.as_str() else {
		return Err(invalid());
	};
	let question = question.trim();

	if question.is_empty() {
		return Err(invalid());
	}

	Ok(question.to_string())
}
