// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Jobs engine configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_LOCK_TTL_SECS: u64 = 300;
const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_REPORTS_DIR: &str = "./reports";
const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobsConfigLayer {
	pub poller_enabled: Option<bool>,
	pub poll_interval_secs: Option<u64>,
	pub lock_ttl_secs: Option<u64>,
	pub max_concurrency: Option<usize>,
	pub timezone: Option<String>,
	pub reports_dir: Option<String>,
	pub script_timeout_secs: Option<u64>,
	pub http_timeout_secs: Option<u64>,
}

impl JobsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.poller_enabled.is_some() {
			self.poller_enabled = other.poller_enabled;
		}
		if other.poll_interval_secs.is_some() {
			self.poll_interval_secs = other.poll_interval_secs;
		}
		if other.lock_ttl_secs.is_some() {
			self.lock_ttl_secs = other.lock_ttl_secs;
		}
		if other.max_concurrency.is_some() {
			self.max_concurrency = other.max_concurrency;
		}
		if other.timezone.is_some() {
			self.timezone = other.timezone;
		}
		if other.reports_dir.is_some() {
			self.reports_dir = other.reports_dir;
		}
		if other.script_timeout_secs.is_some() {
			self.script_timeout_secs = other.script_timeout_secs;
		}
		if other.http_timeout_secs.is_some() {
			self.http_timeout_secs = other.http_timeout_secs;
		}
	}

	pub fn finalize(self) -> JobsConfig {
		JobsConfig {
			poller_enabled: self.poller_enabled.unwrap_or(true),
			poll_interval_secs: self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
			lock_ttl_secs: self.lock_ttl_secs.unwrap_or(DEFAULT_LOCK_TTL_SECS),
			max_concurrency: self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
			timezone: self.timezone.filter(|tz| !tz.trim().is_empty()),
			reports_dir: self
				.reports_dir
				.unwrap_or_else(|| DEFAULT_REPORTS_DIR.to_string()),
			script_timeout_secs: self
				.script_timeout_secs
				.unwrap_or(DEFAULT_SCRIPT_TIMEOUT_SECS),
			http_timeout_secs: self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobsConfig {
	pub poller_enabled: bool,
	pub poll_interval_secs: u64,
	/// Lifetime of the per-job execution lease.
	pub lock_ttl_secs: u64,
	/// Due jobs executed at the same time within one tick.
	pub max_concurrency: usize,
	/// IANA zone for cron evaluation. `None` means the system zone.
	pub timezone: Option<String>,
	pub reports_dir: String,
	pub script_timeout_secs: u64,
	pub http_timeout_secs: u64,
}

impl Default for JobsConfig {
	fn default() -> Self {
		JobsConfigLayer::default().finalize()
	}
}
