// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::job::{Job, JobId, OwnerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeadLetterId(pub Uuid);

impl DeadLetterId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for DeadLetterId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for DeadLetterId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for DeadLetterId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Record of a job that failed terminally. Removed on replay or purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterJob {
	pub id: DeadLetterId,
	pub job_id: JobId,
	pub owner_id: OwnerId,
	pub last_error: Option<String>,
	pub failed_at: DateTime<Utc>,
}

impl DeadLetterJob {
	pub fn for_job(job: &Job, failed_at: DateTime<Utc>) -> Self {
		Self {
			id: DeadLetterId::new(),
			job_id: job.id,
			owner_id: job.owner_id,
			last_error: job.last_error.clone(),
			failed_at,
		}
	}
}
