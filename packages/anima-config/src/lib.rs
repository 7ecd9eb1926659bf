mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Echo, EmbeddingProviderConfig, Providers, Retrieval, Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } =>
			Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

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
	if !cfg.service.mount_path.is_empty() && !cfg.service.mount_path.starts_with('/') {
		return Err(Error::Validation {
			message: "service.mount_path must be empty or start with '/'.".to_string(),
		});
	}
	if cfg.storage.vector_root.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.vector_root must be non-empty.".to_string(),
		});
	}
	if cfg.storage.session_root.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.session_root must be non-empty.".to_string(),
		});
	}
	if cfg.storage.query_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.query_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.model must be non-empty.".to_string(),
		});
	}

	for (key, value) in &cfg.providers.embedding.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("providers.embedding.default_headers.{key} must be a string."),
			});
		}
	}

	if !cfg.retrieval.global_multiplier.is_finite() || cfg.retrieval.global_multiplier <= 0.0 {
		return Err(Error::Validation {
			message: "retrieval.global_multiplier must be a finite number greater than zero."
				.to_string(),
		});
	}
	if !cfg.retrieval.min_score.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.min_score must be a finite number.".to_string(),
		});
	}
	if !cfg.retrieval.exemption_slack.is_finite() || cfg.retrieval.exemption_slack < 0.0 {
		return Err(Error::Validation {
			message: "retrieval.exemption_slack must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if cfg.retrieval.important_marker.trim().is_empty() {
		return Err(Error::Validation {
			message: "retrieval.important_marker must be non-empty.".to_string(),
		});
	}
	if cfg.echo.base_life < 1 {
		return Err(Error::Validation {
			message: "echo.base_life must be at least 1.".to_string(),
		});
	}
	if cfg.echo.important_life < cfg.echo.base_life {
		return Err(Error::Validation {
			message: "echo.important_life must be greater than or equal to echo.base_life."
				.to_string(),
		});
	}
	if cfg.echo.max_total == 0 {
		return Err(Error::Validation {
			message: "echo.max_total must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.providers.embedding.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false)
	{
		cfg.providers.embedding.api_key = None;
	}

	let trimmed = cfg.service.mount_path.trim().trim_end_matches('/').to_string();

	cfg.service.mount_path = trimmed;
	cfg.echo.important_tags.retain(|tag| !tag.trim().is_empty());
}
