// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use pulse_common_secret::SecretString;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, JobsConfigLayer, LogFormat, LoggingConfigLayer, SmtpConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/pulse/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: PULSE_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from(&Env(|name: &str| std::env::var(name).ok()))
	}
}

/// Variable lookup; empty values count as unset.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
	fn var(&self, name: &str) -> Option<String> {
		(self.0)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parse<T: FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}
}

fn load_from<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<ServerConfigLayer, ConfigError> {
	Ok(ServerConfigLayer {
		database: Some(load_database_from_env(env)?),
		jobs: Some(load_jobs_from_env(env)?),
		smtp: Some(load_smtp_from_env(env)?),
		logging: Some(load_logging_from_env(env)?),
	})
}

fn load_database_from_env<F: Fn(&str) -> Option<String>>(
	env: &Env<F>,
) -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env.var("PULSE_SERVER_DATABASE_URL"),
		max_connections: env.parse("PULSE_SERVER_DATABASE_MAX_CONNECTIONS", "u32")?,
	})
}

fn load_jobs_from_env<F: Fn(&str) -> Option<String>>(
	env: &Env<F>,
) -> Result<JobsConfigLayer, ConfigError> {
	Ok(JobsConfigLayer {
		poller_enabled: env.bool("PULSE_SERVER_JOBS_POLLER_ENABLED"),
		poll_interval_secs: env.parse("PULSE_SERVER_JOBS_POLL_INTERVAL_SECS", "u64")?,
		lock_ttl_secs: env.parse("PULSE_SERVER_JOBS_LOCK_TTL_SECS", "u64")?,
		max_concurrency: env.parse("PULSE_SERVER_JOBS_MAX_CONCURRENCY", "usize")?,
		timezone: env.var("PULSE_SERVER_JOBS_TIMEZONE"),
		reports_dir: env.var("PULSE_SERVER_JOBS_REPORTS_DIR"),
		script_timeout_secs: env.parse("PULSE_SERVER_JOBS_SCRIPT_TIMEOUT_SECS", "u64")?,
		http_timeout_secs: env.parse("PULSE_SERVER_JOBS_HTTP_TIMEOUT_SECS", "u64")?,
	})
}

fn load_smtp_from_env<F: Fn(&str) -> Option<String>>(
	env: &Env<F>,
) -> Result<SmtpConfigLayer, ConfigError> {
	Ok(SmtpConfigLayer {
		host: env.var("PULSE_SERVER_SMTP_HOST"),
		port: env.parse("PULSE_SERVER_SMTP_PORT", "u16")?,
		username: env.var("PULSE_SERVER_SMTP_USERNAME"),
		password: env.var("PULSE_SERVER_SMTP_PASSWORD").map(SecretString::new),
		from_address: env.var("PULSE_SERVER_SMTP_FROM_ADDRESS"),
		from_name: env.var("PULSE_SERVER_SMTP_FROM_NAME"),
		use_tls: env.bool("PULSE_SERVER_SMTP_USE_TLS"),
		timeout_secs: env.parse("PULSE_SERVER_SMTP_TIMEOUT_SECS", "u64")?,
	})
}

fn load_logging_from_env<F: Fn(&str) -> Option<String>>(
	env: &Env<F>,
) -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env.var("PULSE_SERVER_LOG_FORMAT") {
		Some(v) => Some(match v.to_lowercase().as_str() {
			"json" => LogFormat::Json,
			"pretty" | "text" => LogFormat::Pretty,
			_ => {
				return Err(ConfigError::InvalidValue {
					key: "PULSE_SERVER_LOG_FORMAT".to_string(),
					message: format!("expected 'json' or 'pretty', got '{v}'"),
				})
			}
		}),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env.var("PULSE_SERVER_LOG_LEVEL"),
		format,
	})
}
