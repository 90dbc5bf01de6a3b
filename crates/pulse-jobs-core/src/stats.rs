// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::job::{Job, JobStatus};

/// Per-owner job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
	pub total: u64,
	pub pending: u64,
	pub running: u64,
	pub success: u64,
	pub retrying: u64,
	pub failed: u64,
	pub paused: u64,
	pub dead_letter: u64,
}

impl JobStats {
	pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>, dead_letter: u64) -> Self {
		let mut stats = JobStats {
			dead_letter,
			..Default::default()
		};

		for job in jobs {
			stats.total += 1;
			let bucket = match job.status {
				JobStatus::Pending => &mut stats.pending,
				JobStatus::Running => &mut stats.running,
				JobStatus::Success => &mut stats.success,
				JobStatus::Retrying => &mut stats.retrying,
				JobStatus::Failed => &mut stats.failed,
				JobStatus::Paused => &mut stats.paused,
			};
			*bucket += 1;
		}

		stats
	}
}
