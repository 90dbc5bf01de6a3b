// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use pulse_jobs_core::{Job, JobFailure, JobType};
use serde::de::DeserializeOwned;

/// Runs the work behind one job type.
///
/// Executors classify their own failures. They never decide whether a job is
/// retried; the engine derives that from the [`JobFailure`] reason.
#[async_trait]
pub trait JobExecutor: Send + Sync {
	fn job_type(&self) -> JobType;

	async fn execute(&self, job: &Job) -> Result<(), JobFailure>;
}

/// Decode a job payload. Malformed JSON is a non-retryable config error.
pub fn parse_payload<T: DeserializeOwned>(job: &Job) -> Result<T, JobFailure> {
	serde_json::from_str(&job.payload).map_err(|e| {
		JobFailure::invalid_config(format!(
			"invalid {} payload: {e}",
			job.job_type.as_str().to_lowercase()
		))
	})
}

/// Reject a missing or blank string field.
pub(crate) fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, JobFailure> {
	match value.map(str::trim) {
		Some(v) if !v.is_empty() => Ok(v),
		_ => Err(JobFailure::invalid_config(format!(
			"payload must contain '{field}' field"
		))),
	}
}
