// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job lifecycle engine.
//!
//! One tick selects due jobs and runs each under its execution lease:
//! lease → executor → retry policy → state transition + history →
//! dead-letter (terminal failures only) → persist → release.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{stream, FutureExt, StreamExt};
use pulse_jobs_core::{
	next_run_time, Clock, DeadLetterJob, FailureReason, Job, JobFailure, JobHistory, JobId,
	JobStatus, LockService, Result, RetryDecision, ScheduleTimezone, SystemClock,
};
use tracing::{debug, error, info, instrument, warn};

use crate::lock::{with_lock, Locked};
use crate::registry::ExecutorRegistry;
use crate::stores::Stores;

const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Used when a recurring job's cron expression yields no next run.
const CRON_FALLBACK_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub lock_ttl: Duration,
	pub max_concurrency: usize,
	pub timezone: ScheduleTimezone,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			lock_ttl: DEFAULT_LOCK_TTL,
			max_concurrency: DEFAULT_MAX_CONCURRENCY,
			timezone: ScheduleTimezone::Local,
		}
	}
}

/// What happened to one due job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
	/// Not runnable or not yet due when checked under the lease.
	NotDue,
	/// Another worker holds the lease.
	Contended,
	Succeeded {
		next_run_time: Option<DateTime<Utc>>,
	},
	Retrying {
		retry_count: u32,
		next_run_time: DateTime<Utc>,
	},
	Failed {
		reason: FailureReason,
	},
	/// The job was deleted while it ran; the result was dropped.
	Deleted,
}

/// Per-tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
	pub due: usize,
	pub succeeded: usize,
	pub retried: usize,
	pub failed: usize,
	pub skipped: usize,
	pub errors: usize,
}

impl TickReport {
	fn record(&mut self, result: &Result<JobOutcome>) {
		match result {
			Ok(JobOutcome::Succeeded { .. }) => self.succeeded += 1,
			Ok(JobOutcome::Retrying { .. }) => self.retried += 1,
			Ok(JobOutcome::Failed { .. }) => self.failed += 1,
			Ok(JobOutcome::NotDue | JobOutcome::Contended | JobOutcome::Deleted) => {
				self.skipped += 1
			}
			Err(_) => self.errors += 1,
		}
	}
}

/// Everything a finished attempt writes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
	pub outcome: JobOutcome,
	pub history: JobHistory,
	pub dead_letter: Option<DeadLetterJob>,
}

pub struct JobEngine {
	stores: Stores,
	locks: Arc<dyn LockService>,
	registry: Arc<ExecutorRegistry>,
	clock: Arc<dyn Clock>,
	config: EngineConfig,
}

impl JobEngine {
	pub fn new(
		stores: Stores,
		locks: Arc<dyn LockService>,
		registry: Arc<ExecutorRegistry>,
		config: EngineConfig,
	) -> Self {
		Self {
			stores,
			locks,
			registry,
			clock: Arc::new(SystemClock),
			config,
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Run every job due now, at most `max_concurrency` at a time.
	///
	/// Only the due-job query can fail the tick. Per-job errors are logged and
	/// counted in the report.
	#[instrument(skip(self))]
	pub async fn run_tick(&self) -> Result<TickReport> {
		let now = self.clock.now();
		let due: Vec<Job> = self
			.stores
			.jobs
			.find_due(now)
			.await?
			.into_iter()
			.filter(|job| job.is_due(now))
			.collect();

		if due.is_empty() {
			debug!("No due jobs");
			return Ok(TickReport::default());
		}

		let report = Mutex::new(TickReport {
			due: due.len(),
			..Default::default()
		});

		stream::iter(due)
			.for_each_concurrent(self.config.max_concurrency.max(1), |job| {
				let report = &report;
				async move {
					let job_id = job.id;
					let result = self.process_due_job(job).await;
					if let Err(e) = &result {
						error!(job_id = %job_id, error = %e, "Failed to process due job");
					}
					report
						.lock()
						.unwrap_or_else(PoisonError::into_inner)
						.record(&result);
				}
			})
			.await;

		let report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
		info!(
			due = report.due,
			succeeded = report.succeeded,
			retried = report.retried,
			failed = report.failed,
			skipped = report.skipped,
			errors = report.errors,
			"Tick complete"
		);
		Ok(report)
	}

	/// Run one job under its lease if it is still due.
	///
	/// The lease is released after the final state is persisted, on every path.
	#[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
	pub async fn process_due_job(&self, job: Job) -> Result<JobOutcome> {
		if !job.is_due(self.clock.now()) {
			return Ok(JobOutcome::NotDue);
		}

		let job_id = job.id;
		let key = job_id.lock_key();
		match with_lock(self.locks.as_ref(), &key, self.config.lock_ttl, move || {
			self.run_locked(job_id)
		})
		.await?
		{
			Locked::Acquired(result) => result,
			Locked::Contended => Ok(JobOutcome::Contended),
		}
	}

	async fn run_locked(&self, job_id: JobId) -> Result<JobOutcome> {
		// Re-read under the lease; another worker may have finished this run.
		let Some(mut job) = self.stores.jobs.find_by_id(job_id).await? else {
			debug!("Job deleted before execution");
			return Ok(JobOutcome::NotDue);
		};

		if !job.is_due(self.clock.now()) {
			debug!(status = %job.status, "Job no longer due");
			return Ok(JobOutcome::NotDue);
		}

		job.status = JobStatus::Running;
		info!(
			name = %job.name,
			retry_count = job.retry_count,
			max_retries = job.max_retries,
			"Executing job"
		);

		let result = self.execute(&job).await;
		let transition = apply_result(&mut job, result, self.clock.now(), &self.config.timezone);

		if !self.persist(&job, &transition).await? {
			warn!("Job deleted during execution, result discarded");
			return Ok(JobOutcome::Deleted);
		}
		Ok(transition.outcome)
	}

	async fn execute(&self, job: &Job) -> std::result::Result<(), JobFailure> {
		let executor = self.registry.resolve(job)?;
		match AssertUnwindSafe(executor.execute(job)).catch_unwind().await {
			Ok(result) => result,
			Err(panic) => Err(JobFailure::unknown(format!(
				"executor panicked: {}",
				panic_message(panic.as_ref())
			))),
		}
	}

	/// Write the attempt back. Returns `false` when the job row no longer
	/// exists, in which case nothing is kept.
	///
	/// A terminal failure writes its dead-letter entry before the FAILED row,
	/// so a FAILED job always has an entry to replay. If that write fails the
	/// row keeps its pre-run state and the job is picked up on a later tick.
	async fn persist(&self, job: &Job, transition: &Transition) -> Result<bool> {
		if let Some(entry) = &transition.dead_letter {
			if self.stores.jobs.find_by_id(job.id).await?.is_none() {
				return Ok(false);
			}
			self.stores.dead_letters.save(entry).await?;
		}

		if !self.stores.jobs.update(job).await? {
			if let Some(entry) = &transition.dead_letter {
				self.stores.dead_letters.delete(entry.id).await?;
			}
			return Ok(false);
		}

		self.stores.history.append(&transition.history).await?;
		Ok(true)
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	panic
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| panic.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("non-string panic payload")
}

/// Apply an attempt's result to `job` and describe what must be written.
///
/// `run_time` is the instant the attempt completed. The history row, the
/// backoff and the cron reschedule are all stamped from it.
pub fn apply_result(
	job: &mut Job,
	result: std::result::Result<(), JobFailure>,
	run_time: DateTime<Utc>,
	timezone: &ScheduleTimezone,
) -> Transition {
	job.updated_at = run_time;

	let failure = match result {
		Ok(()) => {
			job.retry_count = 0;
			job.last_error = None;
			if job.recurring {
				job.status = JobStatus::Pending;
				job.next_run_time = Some(next_recurring_run(job, run_time, timezone));
			} else {
				job.status = JobStatus::Success;
				job.next_run_time = None;
			}
			info!(job_id = %job.id, next_run_time = ?job.next_run_time, "Job succeeded");
			return Transition {
				outcome: JobOutcome::Succeeded {
					next_run_time: job.next_run_time,
				},
				history: JobHistory::success(job.id, run_time),
				dead_letter: None,
			};
		}
		Err(failure) => failure,
	};

	let decision = RetryDecision::decide(
		failure.reason,
		job.retry_count,
		job.max_retries,
		run_time,
	);
	job.retry_count = decision.retry_count();
	job.last_error = Some(failure.message.clone());

	match decision {
		RetryDecision::Retry {
			retry_count,
			next_run_time,
		} => {
			job.status = JobStatus::Retrying;
			job.next_run_time = Some(next_run_time);
			warn!(
				job_id = %job.id,
				reason = %failure.reason,
				retry_count,
				next_run_time = %next_run_time,
				error = %failure.message,
				"Job failed, scheduling retry"
			);
			Transition {
				outcome: JobOutcome::Retrying {
					retry_count,
					next_run_time,
				},
				history: JobHistory::failure(
					job.id,
					run_time,
					JobStatus::Retrying,
					failure.message,
					retry_count,
				),
				dead_letter: None,
			}
		}
		RetryDecision::GiveUp {
			retry_count,
			retryable,
		} => {
			job.status = JobStatus::Failed;
			job.next_run_time = None;
			error!(
				job_id = %job.id,
				reason = %failure.reason,
				retryable,
				retry_count,
				error = %failure.message,
				"Job failed permanently, moving to dead-letter"
			);
			Transition {
				outcome: JobOutcome::Failed {
					reason: failure.reason,
				},
				history: JobHistory::failure(
					job.id,
					run_time,
					JobStatus::Failed,
					failure.message,
					retry_count,
				),
				dead_letter: Some(DeadLetterJob::for_job(job, run_time)),
			}
		}
	}
}

fn next_recurring_run(
	job: &Job,
	from: DateTime<Utc>,
	timezone: &ScheduleTimezone,
) -> DateTime<Utc> {
	let computed = match job.cron_expression.as_deref() {
		Some(expression) => next_run_time(expression, from, timezone).map_err(|e| e.to_string()),
		None => Err("recurring job has no cron expression".to_string()),
	};

	computed.unwrap_or_else(|e| {
		error!(job_id = %job.id, error = %e, "Cannot compute next run time, retrying schedule in 5 minutes");
		from + chrono::Duration::minutes(CRON_FALLBACK_MINUTES)
	})
}
