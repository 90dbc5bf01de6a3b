// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::job::{JobId, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryId(pub Uuid);

impl HistoryId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for HistoryId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for HistoryId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// One execution attempt. Never updated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHistory {
	pub id: HistoryId,
	pub job_id: JobId,
	pub run_time: DateTime<Utc>,
	/// Status the job moved to as a result of this attempt.
	pub status: JobStatus,
	pub error_message: Option<String>,
	/// Zero for successful attempts, otherwise the retry count after the failure.
	pub retry_attempt: u32,
}

impl JobHistory {
	pub fn success(job_id: JobId, run_time: DateTime<Utc>) -> Self {
		Self {
			id: HistoryId::new(),
			job_id,
			run_time,
			status: JobStatus::Success,
			error_message: None,
			retry_attempt: 0,
		}
	}

	pub fn failure(
		job_id: JobId,
		run_time: DateTime<Utc>,
		status: JobStatus,
		error_message: impl Into<String>,
		retry_attempt: u32,
	) -> Self {
		Self {
			id: HistoryId::new(),
			job_id,
			run_time,
			status,
			error_message: Some(error_message.into()),
			retry_attempt,
		}
	}
}
