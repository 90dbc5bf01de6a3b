// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use pulse_jobs_core::{Job, JobFailure, JobType};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::executor::{parse_payload, require, JobExecutor};

#[derive(Debug, Deserialize)]
struct LogPayload {
	message: Option<String>,
	level: Option<String>,
}

/// Writes the payload message to the server log.
#[derive(Debug, Default)]
pub struct LogExecutor;

impl LogExecutor {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl JobExecutor for LogExecutor {
	fn job_type(&self) -> JobType {
		JobType::Log
	}

	async fn execute(&self, job: &Job) -> Result<(), JobFailure> {
		let payload: LogPayload = parse_payload(job)?;
		let message = require(payload.message.as_deref(), "message")?;
		let level = payload
			.level
			.as_deref()
			.map(str::to_ascii_uppercase)
			.unwrap_or_else(|| "INFO".to_string());

		// unrecognised levels log at INFO
		match level.as_str() {
			"DEBUG" => debug!(job_id = %job.id, job_name = %job.name, "[JOB] {message}"),
			"WARN" | "WARNING" => warn!(job_id = %job.id, job_name = %job.name, "[JOB] {message}"),
			"ERROR" => error!(job_id = %job.id, job_name = %job.name, "[JOB] {message}"),
			_ => info!(job_id = %job.id, job_name = %job.name, "[JOB] {message}"),
		}
		Ok(())
	}
}
