// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where the job, history, dead-letter and lease tables live.
//!
//! Pulse only speaks SQLite. An in-memory database exists per connection, so
//! an in-memory URL is always pooled through a single connection; otherwise
//! the engine and the lease table would each see a different empty database.

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

const DEFAULT_URL: &str = "sqlite:./pulse.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_URL.to_string(),
			max_connections: DEFAULT_MAX_CONNECTIONS,
		}
	}
}

impl DatabaseConfig {
	pub fn is_in_memory(&self) -> bool {
		is_in_memory(&self.url)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.url.starts_with("sqlite:") {
			return Err(ConfigError::Validation(format!(
				"database.url must be a sqlite: URL, got '{}'",
				self.url
			)));
		}
		if self.max_connections == 0 {
			return Err(ConfigError::Validation(
				"database.max_connections must be at least 1".to_string(),
			));
		}
		Ok(())
	}
}

fn is_in_memory(url: &str) -> bool {
	url.contains(":memory:") || url.contains("mode=memory")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub max_connections: Option<u32>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.max_connections.is_some() {
			self.max_connections = other.max_connections;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		let url = self.url.unwrap_or_else(|| DEFAULT_URL.to_string());
		let mut max_connections = self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
		if is_in_memory(&url) && max_connections > 1 {
			debug!(requested = max_connections, "in-memory database pinned to one connection");
			max_connections = 1;
		}
		DatabaseConfig {
			url,
			max_connections,
		}
	}
}
