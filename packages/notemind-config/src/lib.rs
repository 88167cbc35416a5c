mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Generation, LlmProviderConfig, Pipelines, Postgres, Providers, Service, Session,
	Storage,
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
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let llm = &cfg.providers.llm;

	for (label, value) in [
		("providers.llm.api_base", &llm.api_base),
		("providers.llm.api_key", &llm.api_key),
		("providers.llm.model", &llm.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if llm.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.llm.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if llm.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: "providers.llm.default_headers values must be strings.".to_string(),
		});
	}

	let session = &cfg.session;

	if session.idle_timeout_hours <= 0 {
		return Err(Error::Validation {
			message: "session.idle_timeout_hours must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("session.max_stored_messages", session.max_stored_messages),
		("session.context_window_messages", session.context_window_messages),
		("session.max_message_chars", session.max_message_chars),
		("session.max_note_context_chars", session.max_note_context_chars),
		("session.mailbox_capacity", session.mailbox_capacity),
		("session.chat.max_tokens", session.chat.max_tokens),
		("pipelines.max_content_chars", cfg.pipelines.max_content_chars),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if session.context_window_messages > session.max_stored_messages {
		return Err(Error::Validation {
			message:
				"session.context_window_messages must not exceed session.max_stored_messages."
					.to_string(),
		});
	}
	if !session.chat.temperature.is_finite() {
		return Err(Error::Validation {
			message: "session.chat.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&session.chat.temperature) {
		return Err(Error::Validation {
			message: "session.chat.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.providers.llm.api_base = cfg.providers.llm.api_base.trim_end_matches('/').to_string();

	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
