mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, IdentityProviderConfig, Postgres,
	Providers, Qdrant, Retrieval, Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if !cfg.providers.generation.temperature.is_finite()
		|| cfg.providers.generation.temperature < 0.0
	{
		return Err(Error::Validation {
			message: "providers.generation.temperature must be zero or greater.".to_string(),
		});
	}
	if cfg.retrieval.recent_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.recent_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.semantic_top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.semantic_top_k must be greater than zero.".to_string(),
		});
	}
	// An empty allow-list denies every caller, which is never a useful deployment.
	if cfg.security.allowed_emails.is_empty() {
		return Err(Error::Validation {
			message: "security.allowed_emails must list at least one email.".to_string(),
		});
	}
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generation", &cfg.providers.generation.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for email in cfg.security.allowed_emails.iter_mut() {
		*email = email.trim().to_ascii_lowercase();
	}

	cfg.security.allowed_emails.retain(|email| !email.is_empty());
}
