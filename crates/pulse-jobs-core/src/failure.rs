// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Executor failure classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an execution attempt failed.
///
/// Executors report a reason, never a retry decision. Retryability is derived
/// from the reason alone by [`crate::retry::is_retryable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
	NetworkError,
	Timeout,
	RateLimited,
	#[serde(rename = "REMOTE_5XX")]
	Remote5xx,
	BadRequest,
	AuthError,
	InvalidConfig,
	Unknown,
}

impl FailureReason {
	pub const ALL: [FailureReason; 8] = [
		FailureReason::NetworkError,
		FailureReason::Timeout,
		FailureReason::RateLimited,
		FailureReason::Remote5xx,
		FailureReason::BadRequest,
		FailureReason::AuthError,
		FailureReason::InvalidConfig,
		FailureReason::Unknown,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			FailureReason::NetworkError => "NETWORK_ERROR",
			FailureReason::Timeout => "TIMEOUT",
			FailureReason::RateLimited => "RATE_LIMITED",
			FailureReason::Remote5xx => "REMOTE_5XX",
			FailureReason::BadRequest => "BAD_REQUEST",
			FailureReason::AuthError => "AUTH_ERROR",
			FailureReason::InvalidConfig => "INVALID_CONFIG",
			FailureReason::Unknown => "UNKNOWN",
		}
	}

	/// Parse a reason tag. Unmapped tags become [`FailureReason::Unknown`].
	pub fn from_tag(tag: &str) -> Self {
		FailureReason::ALL
			.into_iter()
			.find(|r| r.as_str() == tag)
			.unwrap_or(FailureReason::Unknown)
	}
}

impl fmt::Display for FailureReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A classified failure returned by an executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct JobFailure {
	pub reason: FailureReason,
	pub message: String,
}

impl JobFailure {
	pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
		Self {
			reason,
			message: message.into(),
		}
	}

	pub fn network(message: impl Into<String>) -> Self {
		Self::new(FailureReason::NetworkError, message)
	}

	pub fn timeout(message: impl Into<String>) -> Self {
		Self::new(FailureReason::Timeout, message)
	}

	pub fn rate_limited(message: impl Into<String>) -> Self {
		Self::new(FailureReason::RateLimited, message)
	}

	pub fn remote_5xx(message: impl Into<String>) -> Self {
		Self::new(FailureReason::Remote5xx, message)
	}

	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::new(FailureReason::BadRequest, message)
	}

	pub fn auth(message: impl Into<String>) -> Self {
		Self::new(FailureReason::AuthError, message)
	}

	pub fn invalid_config(message: impl Into<String>) -> Self {
		Self::new(FailureReason::InvalidConfig, message)
	}

	pub fn unknown(message: impl Into<String>) -> Self {
		Self::new(FailureReason::Unknown, message)
	}
}
