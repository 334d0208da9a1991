use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// One completion call, no retries. Retrieval already happened by the time
/// this runs, so a failure here fails the whole request rather than producing
/// a partial answer.
pub async fn generate(cfg: &moneta_config::GenerationProviderConfig, prompt: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "user", "content": prompt }
		],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_generation_response(json)
}

fn parse_generation_response(json: Value) -> Result<String> {
	let text = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| eyre::eyre!("Generation response is missing text content."))?;

	if text.trim().is_empty() {
		return Err(eyre::eyre!("Generation response text is empty."));
	}

	Ok(text.to_string())
}
