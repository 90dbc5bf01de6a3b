// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence and lock seams consumed by the engine.
//!
//! Implementations live in `pulse-server-db` (SQLite) and
//! `pulse-server-jobs` (in-memory).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::dead_letter::{DeadLetterId, DeadLetterJob};
use crate::error::Result;
use crate::history::JobHistory;
use crate::job::{Job, JobId, OwnerId};

#[async_trait]
pub trait JobStore: Send + Sync {
	/// Jobs in PENDING or RETRYING whose `next_run_time` is at or before `now`.
	async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>>;

	async fn find_by_id(&self, id: JobId) -> Result<Option<Job>>;

	async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Job>>;

	/// Insert or fully replace the job row.
	async fn save(&self, job: &Job) -> Result<()>;

	/// Overwrite an existing row. Returns `false` when the job no longer exists;
	/// a deleted job is never recreated.
	async fn update(&self, job: &Job) -> Result<bool>;

	/// Returns `true` if a row was removed.
	async fn delete(&self, id: JobId) -> Result<bool>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
	async fn append(&self, entry: &JobHistory) -> Result<()>;

	/// Attempts for a job, newest `run_time` first.
	async fn list_by_job_desc(&self, job_id: JobId) -> Result<Vec<JobHistory>>;

	async fn delete_by_job(&self, job_id: JobId) -> Result<u64>;
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
	async fn save(&self, entry: &DeadLetterJob) -> Result<()>;

	async fn find_by_id(&self, id: DeadLetterId) -> Result<Option<DeadLetterJob>>;

	async fn find_by_job(&self, job_id: JobId) -> Result<Option<DeadLetterJob>>;

	async fn delete(&self, id: DeadLetterId) -> Result<bool>;

	async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DeadLetterJob>>;
}

/// Time-bounded advisory lease keyed by string.
#[async_trait]
pub trait LockService: Send + Sync {
	/// Take the lease if no unexpired holder exists. `Ok(false)` means contention.
	async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool>;

	/// Drop the lease regardless of holder.
	async fn release(&self, key: &str) -> Result<()>;
}
