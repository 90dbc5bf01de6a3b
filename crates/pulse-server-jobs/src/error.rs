// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use pulse_jobs_core::{DeadLetterId, JobId, JobsCoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
	#[error("job not found: {0}")]
	NotFound(JobId),

	#[error("dead-letter entry not found: {0}")]
	DeadLetterNotFound(DeadLetterId),

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("invalid state transition: {0}")]
	InvalidState(String),

	#[error(transparent)]
	Core(#[from] JobsCoreError),
}

pub type Result<T> = std::result::Result<T, JobError>;
