use crate::{Error, MonetaService, ServiceResult};

/// Raw authentication material extracted from a request: either an identity
/// the gateway already verified, or a bearer token still to be checked.
#[derive(Debug, Clone, Default)]
pub struct CallerAuth {
	pub uid: Option<String>,
	pub email: Option<String>,
	pub bearer: Option<String>,
}

/// An authenticated, allow-listed caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
	pub uid: String,
	pub email: String,
}

impl MonetaService {
	/// The pipeline's gate: authenticate, then check the email allow-list.
	/// Runs before any retrieval so a rejected request costs no store or
	/// model calls.
	pub(crate) async fn authorize(&self, auth: &CallerAuth) -> ServiceResult<Caller> {
		let mut uid = auth.uid.clone();
		let mut email = auth.email.clone();

		// A gateway-verified identity wins; otherwise fall back to verifying
		// the bearer token ourselves. Verification failure is logged and
		// leaves the request unauthenticated rather than erroring here.
		if uid.is_none()
			&& let Some(bearer) = auth.bearer.as_deref()
		{
			match self.providers.identity.verify(&self.cfg.providers.identity, bearer).await {
				Ok(identity) => {
					uid = Some(identity.uid);
					email = identity.email;
				},
				Err(err) => {
					tracing::warn!(error = %err, "Failed to verify bearer token.");
				},
			}
		}

		let Some(uid) = uid else {
			return Err(Error::Unauthenticated);
		};
		let email = email.map(|email| email.trim().to_ascii_lowercase()).filter(|e| !e.is_empty());
		let allowed = email
			.as_deref()
			.map(|email| self.cfg.security.allowed_emails.iter().any(|entry| entry == email))
			.unwrap_or(false);

		if !allowed {
			let email = email.unwrap_or_else(|| "unknown".to_string());

			tracing::warn!(%uid, %email, "Permission denied.");

			return Err(Error::PermissionDenied { email });
		}

		let email = email.unwrap_or_default();

		tracing::info!(%uid, %email, "Caller authorized.");

		Ok(Caller { uid, email })
	}
}
