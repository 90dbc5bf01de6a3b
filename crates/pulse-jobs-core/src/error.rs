// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for core job operations.

use thiserror::Error;

/// Result type for core job operations.
pub type Result<T> = std::result::Result<T, JobsCoreError>;

/// Errors that can occur in core job operations.
#[derive(Debug, Error)]
pub enum JobsCoreError {
	#[error("invalid cron expression '{expression}': {reason}")]
	InvalidCronExpression { expression: String, reason: String },

	#[error("no upcoming run time for cron expression '{0}'")]
	NoUpcomingRun(String),

	#[error("invalid schedule: {0}")]
	InvalidSchedule(String),

	#[error("invalid timezone: {0}")]
	InvalidTimezone(String),

	#[error("unknown job type: {0}")]
	UnknownJobType(String),

	#[error("unknown job status: {0}")]
	UnknownJobStatus(String),

	#[error("store error: {0}")]
	Store(String),

	#[error("lock error: {0}")]
	Lock(String),
}
