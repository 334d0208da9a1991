use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Claims derived from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
	pub uid: String,
	pub email: Option<String>,
}

/// Verifies a bearer token against the identity provider and returns the
/// caller's uid and email. Fails on invalid or expired tokens.
pub async fn verify(
	cfg: &moneta_config::IdentityProviderConfig,
	token: &str,
) -> Result<VerifiedIdentity> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "idToken": token });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_identity_response(json)
}

// Accepts both the Firebase accounts:lookup shape ({"users": [{"localId",
// "email"}]}) and a flat {"uid", "email"} document.
fn parse_identity_response(json: Value) -> Result<VerifiedIdentity> {
	let record = json
		.get("users")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.unwrap_or(&json);
	let uid = record
		.get("localId")
		.or_else(|| record.get("uid"))
		.and_then(|v| v.as_str())
		.filter(|uid| !uid.is_empty())
		.ok_or_else(|| eyre::eyre!("Identity response is missing a uid."))?;
	let email = record
		.get("email")
		.and_then(|v| v.as_str())
		.filter(|email| !email.is_empty())
		.map(str::to_string);

	Ok(VerifiedIdentity { uid: uid.to_string(), email })
}
