// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Pulse server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`PULSE_SERVER_*`)

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub jobs: JobsConfig,
	pub smtp: Option<SmtpConfig>,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`PULSE_SERVER_*`)
/// 2. Config file (`/etc/pulse/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource)])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let jobs = layer.jobs.unwrap_or_default().finalize();
	let smtp = layer.smtp.and_then(|l| l.finalize());
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&database, &jobs)?;

	info!(
		database = %database.url,
		poller_enabled = jobs.poller_enabled,
		poll_interval_secs = jobs.poll_interval_secs,
		max_concurrency = jobs.max_concurrency,
		smtp_configured = smtp.is_some(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		jobs,
		smtp,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(database: &DatabaseConfig, jobs: &JobsConfig) -> Result<(), ConfigError> {
	database.validate()?;
	if jobs.poll_interval_secs == 0 {
		return Err(ConfigError::Validation(
			"jobs.poll_interval_secs must be at least 1".to_string(),
		));
	}
	if jobs.lock_ttl_secs == 0 {
		return Err(ConfigError::Validation(
			"jobs.lock_ttl_secs must be at least 1".to_string(),
		));
	}
	if jobs.max_concurrency == 0 {
		return Err(ConfigError::Validation(
			"jobs.max_concurrency must be at least 1".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_empty_layer_finalizes_to_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./pulse.db");
		assert_eq!(config.jobs, JobsConfig::default());
		assert!(config.smtp.is_none());
		assert_eq!(config.logging.level, "info");
	}

	#[test]
	fn test_zero_concurrency_is_rejected() {
		let layer = ServerConfigLayer {
			jobs: Some(JobsConfigLayer {
				max_concurrency: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("max_concurrency"));
	}

	#[test]
	fn test_zero_poll_interval_is_rejected() {
		let layer = ServerConfigLayer {
			jobs: Some(JobsConfigLayer {
				poll_interval_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_err());
	}

	#[test]
	fn test_file_overrides_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("server.toml");
		std::fs::write(&path, "[jobs]\nlock_ttl_secs = 90\n").unwrap();

		let layer = TomlSource::new(&path).load().unwrap();
		let mut merged = DefaultsSource.load().unwrap();
		merged.merge(layer);
		let config = finalize(merged).unwrap();
		assert_eq!(config.jobs.lock_ttl_secs, 90);
		assert_eq!(config.jobs.poll_interval_secs, 60);
	}

	proptest! {
		/// A later layer's value always wins over an earlier one.
		#[test]
		fn later_layer_wins(a in 1u64..10_000, b in 1u64..10_000) {
			let mut base = ServerConfigLayer {
				jobs: Some(JobsConfigLayer { poll_interval_secs: Some(a), ..Default::default() }),
				..Default::default()
			};
			base.merge(ServerConfigLayer {
				jobs: Some(JobsConfigLayer { poll_interval_secs: Some(b), ..Default::default() }),
				..Default::default()
			});
			let config = finalize(base).unwrap();
			prop_assert_eq!(config.jobs.poll_interval_secs, b);
		}
	}
}
