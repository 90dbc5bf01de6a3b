// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use pulse_jobs_core::{Job, JobFailure, JobType};
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::executor::{parse_payload, require, JobExecutor};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_OUTPUT_CHARS: usize = 5000;

static SECRET_ASSIGNMENT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)(password|token|key)=\S+").unwrap());

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptPayload {
	command: Option<String>,
	timeout_seconds: Option<u64>,
}

/// Runs a shell command with `sh -c`. The child is killed if it outlives its timeout.
pub struct ScriptExecutor {
	default_timeout: Duration,
}

impl ScriptExecutor {
	pub fn new(default_timeout: Duration) -> Self {
		Self { default_timeout }
	}
}

impl Default for ScriptExecutor {
	fn default() -> Self {
		Self::new(DEFAULT_TIMEOUT)
	}
}

/// Replace the values of `password=`, `token=` and `key=` assignments.
pub fn mask_secrets(command: &str) -> String {
	SECRET_ASSIGNMENT.replace_all(command, "$1=****").into_owned()
}

fn truncate_output(output: &str) -> String {
	match output.char_indices().nth(MAX_OUTPUT_CHARS) {
		Some((cut, _)) => format!("{}... (truncated)", &output[..cut]),
		None => output.to_string(),
	}
}

#[async_trait]
impl JobExecutor for ScriptExecutor {
	fn job_type(&self) -> JobType {
		JobType::Script
	}

	#[instrument(skip(self, job), fields(job_id = %job.id))]
	async fn execute(&self, job: &Job) -> Result<(), JobFailure> {
		let payload: ScriptPayload = parse_payload(job)?;
		let command = require(payload.command.as_deref(), "command")?;
		let timeout = payload
			.timeout_seconds
			.map(Duration::from_secs)
			.unwrap_or(self.default_timeout);

		debug!(command = %mask_secrets(command), timeout_secs = timeout.as_secs(), "Running script");

		let child = Command::new("sh")
			.arg("-c")
			.arg(command)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| JobFailure::unknown(format!("failed to start script: {e}")))?;

		// On timeout the wait future, and with it the child, is dropped and killed.
		let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
			Ok(Ok(output)) => output,
			Ok(Err(e)) => {
				return Err(JobFailure::unknown(format!("failed to wait for script: {e}")))
			}
			Err(_) => {
				warn!(timeout_secs = timeout.as_secs(), "Script timed out, killed");
				return Err(JobFailure::timeout(format!(
					"script timed out after {} seconds",
					timeout.as_secs()
				)));
			}
		};

		let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
		text.push_str(&String::from_utf8_lossy(&output.stderr));

		if !output.status.success() {
			let code = output
				.status
				.code()
				.map_or_else(|| "signal".to_string(), |c| c.to_string());
			warn!(exit_code = %code, "Script exited with failure");
			return Err(JobFailure::unknown(format!(
				"script exited with code {code}: {}",
				truncate_output(text.trim())
			)));
		}

		info!(output_len = text.len(), "Script completed");
		Ok(())
	}
}
