// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-facing job operations.
//!
//! Every operation is scoped to an owner. A job or dead-letter entry that
//! belongs to someone else is reported as not found.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pulse_jobs_core::{
	generate_cron_expression, next_run_time, validate_cron_expression, Clock, DeadLetterId,
	DeadLetterJob, Frequency, Job, JobHistory, JobId, JobStats, JobStatus, JobType, OwnerId,
	ScheduleTimezone, SystemClock,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{JobError, Result};
use crate::stores::Stores;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

const RESUME_DELAY_SECS: i64 = 10;
const REPLAY_DELAY_SECS: i64 = 1;

/// When a new job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSchedule {
	/// Once, at a future instant.
	OneTime { run_at: DateTime<Utc> },
	/// Every `interval` units of `frequency`.
	Recurring { frequency: Frequency, interval: i64 },
	/// On a cron expression (5, 6 or 7 fields).
	Cron { expression: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJobRequest {
	pub name: String,
	pub job_type: JobType,
	pub payload: String,
	#[serde(default)]
	pub max_retries: Option<u32>,
	pub schedule: JobSchedule,
}

pub struct JobService {
	stores: Stores,
	clock: Arc<dyn Clock>,
	timezone: ScheduleTimezone,
}

impl JobService {
	pub fn new(stores: Stores, timezone: ScheduleTimezone) -> Self {
		Self {
			stores,
			clock: Arc::new(SystemClock),
			timezone,
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	#[instrument(skip(self, request), fields(owner_id = %owner_id, job_type = %request.job_type))]
	pub async fn create_job(&self, owner_id: OwnerId, request: CreateJobRequest) -> Result<Job> {
		let name = request.name.trim();
		if name.is_empty() {
			return Err(JobError::InvalidRequest("job name cannot be blank".to_string()));
		}

		let now = self.clock.now();
		let (recurring, cron_expression, first_run) = match request.schedule {
			JobSchedule::OneTime { run_at } => {
				if run_at <= now {
					return Err(JobError::InvalidRequest(format!(
						"run_at must be in the future, got {run_at}"
					)));
				}
				(false, None, run_at)
			}
			JobSchedule::Recurring {
				frequency,
				interval,
			} => {
				let expression = generate_cron_expression(frequency, interval)?;
				let first = next_run_time(&expression, now, &self.timezone)?;
				(true, Some(expression), first)
			}
			JobSchedule::Cron { expression } => {
				let expression = expression.trim().to_string();
				validate_cron_expression(&expression)?;
				let first = next_run_time(&expression, now, &self.timezone)?;
				(true, Some(expression), first)
			}
		};

		let job = Job {
			id: JobId::new(),
			owner_id,
			name: name.to_string(),
			job_type: request.job_type,
			payload: request.payload,
			recurring,
			cron_expression,
			next_run_time: Some(first_run),
			status: JobStatus::Pending,
			retry_count: 0,
			max_retries: request.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
			last_error: None,
			created_at: now,
			updated_at: now,
		};

		self.stores.jobs.save(&job).await?;
		info!(job_id = %job.id, next_run_time = %first_run, recurring, "Job created");
		Ok(job)
	}

	pub async fn get_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Job> {
		self.owned_job(owner_id, job_id).await
	}

	/// The owner's jobs, excluding those that failed terminally. Those are
	/// listed through [`JobService::list_dead_letters`].
	pub async fn list_jobs(&self, owner_id: OwnerId) -> Result<Vec<Job>> {
		let jobs = self.stores.jobs.list_by_owner(owner_id).await?;
		Ok(jobs
			.into_iter()
			.filter(|job| job.status != JobStatus::Failed)
			.collect())
	}

	/// Delete a job with its history and any dead-letter entry.
	#[instrument(skip(self), fields(owner_id = %owner_id, job_id = %job_id))]
	pub async fn delete_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<()> {
		self.owned_job(owner_id, job_id).await?;

		let history = self.stores.history.delete_by_job(job_id).await?;
		if let Some(entry) = self.stores.dead_letters.find_by_job(job_id).await? {
			self.stores.dead_letters.delete(entry.id).await?;
		}
		self.stores.jobs.delete(job_id).await?;

		info!(history_rows = history, "Job deleted");
		Ok(())
	}

	/// Stop the poller from selecting the job. An in-flight run is not interrupted.
	#[instrument(skip(self), fields(owner_id = %owner_id, job_id = %job_id))]
	pub async fn pause_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Job> {
		let mut job = self.owned_job(owner_id, job_id).await?;
		match job.status {
			JobStatus::Pending | JobStatus::Retrying | JobStatus::Paused => {}
			other => {
				return Err(JobError::InvalidState(format!(
					"cannot pause a job in status {other}"
				)))
			}
		}

		job.status = JobStatus::Paused;
		job.updated_at = self.clock.now();
		self.stores.jobs.save(&job).await?;
		info!("Job paused");
		Ok(job)
	}

	/// Return a paused job to PENDING. A missing or past run time becomes now + 10 s.
	#[instrument(skip(self), fields(owner_id = %owner_id, job_id = %job_id))]
	pub async fn resume_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Job> {
		let mut job = self.owned_job(owner_id, job_id).await?;
		if job.status == JobStatus::Failed {
			return Err(JobError::InvalidState(
				"failed jobs are resumed by replaying their dead-letter entry".to_string(),
			));
		}

		let now = self.clock.now();
		job.status = JobStatus::Pending;
		if job.next_run_time.map_or(true, |t| t < now) {
			job.next_run_time = Some(now + Duration::seconds(RESUME_DELAY_SECS));
		}
		job.updated_at = now;
		self.stores.jobs.save(&job).await?;
		info!(next_run_time = ?job.next_run_time, "Job resumed");
		Ok(job)
	}

	/// Put a dead-lettered job back on the schedule with a clean retry budget.
	#[instrument(skip(self), fields(owner_id = %owner_id, dead_letter_id = %dead_letter_id))]
	pub async fn replay_dead_letter(
		&self,
		owner_id: OwnerId,
		dead_letter_id: DeadLetterId,
	) -> Result<Job> {
		let entry = self.owned_dead_letter(owner_id, dead_letter_id).await?;
		let mut job = self
			.stores
			.jobs
			.find_by_id(entry.job_id)
			.await?
			.ok_or(JobError::NotFound(entry.job_id))?;

		let now = self.clock.now();
		job.status = JobStatus::Pending;
		job.retry_count = 0;
		job.last_error = None;
		job.next_run_time = Some(self.replay_run_time(&job, now));
		job.updated_at = now;

		self.stores.jobs.save(&job).await?;
		self.stores.dead_letters.delete(entry.id).await?;

		info!(job_id = %job.id, next_run_time = ?job.next_run_time, "Dead-letter entry replayed");
		Ok(job)
	}

	fn replay_run_time(&self, job: &Job, now: DateTime<Utc>) -> DateTime<Utc> {
		let soon = now + Duration::seconds(REPLAY_DELAY_SECS);
		match (job.recurring, job.cron_expression.as_deref()) {
			(true, Some(expression)) => next_run_time(expression, now, &self.timezone)
				.unwrap_or_else(|e| {
					warn!(job_id = %job.id, error = %e, "Cannot parse cron expression, replaying immediately");
					soon
				}),
			_ => soon,
		}
	}

	pub async fn list_dead_letters(&self, owner_id: OwnerId) -> Result<Vec<DeadLetterJob>> {
		Ok(self.stores.dead_letters.list_by_owner(owner_id).await?)
	}

	/// Discard a dead-letter entry. The FAILED job row stays.
	#[instrument(skip(self), fields(owner_id = %owner_id, dead_letter_id = %dead_letter_id))]
	pub async fn purge_dead_letter(
		&self,
		owner_id: OwnerId,
		dead_letter_id: DeadLetterId,
	) -> Result<()> {
		self.owned_dead_letter(owner_id, dead_letter_id).await?;
		self.stores.dead_letters.delete(dead_letter_id).await?;
		info!("Dead-letter entry purged");
		Ok(())
	}

	/// Attempts for a job, newest first.
	pub async fn job_history(&self, owner_id: OwnerId, job_id: JobId) -> Result<Vec<JobHistory>> {
		self.owned_job(owner_id, job_id).await?;
		Ok(self.stores.history.list_by_job_desc(job_id).await?)
	}

	pub async fn job_stats(&self, owner_id: OwnerId) -> Result<JobStats> {
		let jobs = self.stores.jobs.list_by_owner(owner_id).await?;
		let dead_letters = self.stores.dead_letters.list_by_owner(owner_id).await?;
		Ok(JobStats::from_jobs(&jobs, dead_letters.len() as u64))
	}

	async fn owned_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Job> {
		match self.stores.jobs.find_by_id(job_id).await? {
			Some(job) if job.owner_id == owner_id => Ok(job),
			_ => Err(JobError::NotFound(job_id)),
		}
	}

	async fn owned_dead_letter(
		&self,
		owner_id: OwnerId,
		dead_letter_id: DeadLetterId,
	) -> Result<DeadLetterJob> {
		match self.stores.dead_letters.find_by_id(dead_letter_id).await? {
			Some(entry) if entry.owner_id == owner_id => Ok(entry),
			_ => Err(JobError::DeadLetterNotFound(dead_letter_id)),
		}
	}
}
