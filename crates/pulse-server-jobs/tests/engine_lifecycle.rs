// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end lifecycle scenarios against an in-memory SQLite database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pulse_jobs_core::{
	Clock, FailureReason, Job, JobFailure, JobStatus, JobType, LockService, ManualClock, OwnerId,
	ScheduleTimezone,
};
use pulse_server_db::testing::create_test_pool;
use pulse_server_db::SqliteLockService;
use pulse_server_jobs::{
	CreateJobRequest, EngineConfig, ExecutorRegistry, JobEngine, JobExecutor, JobSchedule,
	JobService, Stores, TickReport,
};
use sqlx::SqlitePool;

fn t0() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
}

fn utc() -> ScheduleTimezone {
	"UTC".parse().unwrap()
}

/// LOG executor that fails with a fixed reason, or succeeds when `reason` is `None`.
struct Counting {
	reason: Option<FailureReason>,
	delay: Duration,
	calls: AtomicUsize,
}

impl Counting {
	fn succeeding() -> Arc<Self> {
		Arc::new(Self {
			reason: None,
			delay: Duration::ZERO,
			calls: AtomicUsize::new(0),
		})
	}

	fn failing(reason: FailureReason) -> Arc<Self> {
		Arc::new(Self {
			reason: Some(reason),
			delay: Duration::ZERO,
			calls: AtomicUsize::new(0),
		})
	}

	fn slow() -> Arc<Self> {
		Arc::new(Self {
			reason: None,
			delay: Duration::from_millis(100),
			calls: AtomicUsize::new(0),
		})
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl JobExecutor for Counting {
	fn job_type(&self) -> JobType {
		JobType::Log
	}

	async fn execute(&self, _job: &Job) -> Result<(), JobFailure> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		match self.reason {
			None => Ok(()),
			Some(FailureReason::NetworkError) => Err(JobFailure::network("connection reset")),
			Some(FailureReason::BadRequest) => Err(JobFailure::bad_request("HTTP 400")),
			Some(_) => Err(JobFailure::unknown("boom")),
		}
	}
}

struct Fixture {
	pool: SqlitePool,
	clock: Arc<ManualClock>,
	stores: Stores,
	service: JobService,
	locks: Arc<SqliteLockService>,
}

impl Fixture {
	async fn new() -> Self {
		let pool = create_test_pool().await.unwrap();
		let clock = Arc::new(ManualClock::new(t0()));
		let stores = Stores::sqlite(pool.clone());
		let service = JobService::new(stores.clone(), utc()).with_clock(clock.clone());
		let locks = Arc::new(SqliteLockService::with_clock(pool.clone(), clock.clone()));
		Self {
			pool,
			clock,
			stores,
			service,
			locks,
		}
	}

	fn engine(&self, executor: Arc<dyn JobExecutor>) -> JobEngine {
		JobEngine::new(
			self.stores.clone(),
			self.locks.clone(),
			Arc::new(ExecutorRegistry::new().with(executor)),
			EngineConfig {
				timezone: utc(),
				..Default::default()
			},
		)
		.with_clock(self.clock.clone())
	}

	async fn create(&self, owner: OwnerId, schedule: JobSchedule, max_retries: u32) -> Job {
		self.service
			.create_job(
				owner,
				CreateJobRequest {
					name: "nightly".to_string(),
					job_type: JobType::Log,
					payload: r#"{"message":"tick"}"#.to_string(),
					max_retries: Some(max_retries),
					schedule,
				},
			)
			.await
			.unwrap()
	}

	async fn reload(&self, owner: OwnerId, job: &Job) -> Job {
		self.service.get_job(owner, job.id).await.unwrap()
	}

	fn advance_to(&self, at: DateTime<Utc>) {
		self.clock.set(at);
	}
}

#[tokio::test]
async fn retries_with_backoff_then_dead_letters() {
	let fx = Fixture::new().await;
	let owner = OwnerId::new();
	let run_at = t0() + chrono::Duration::minutes(1);
	let job = fx.create(owner, JobSchedule::OneTime { run_at }, 3).await;

	let executor = Counting::failing(FailureReason::NetworkError);
	let engine = fx.engine(executor.clone());

	fx.advance_to(run_at);
	let report = engine.run_tick().await.unwrap();
	assert_eq!(report.retried, 1);
	let after_first = fx.reload(owner, &job).await;
	assert_eq!(after_first.status, JobStatus::Retrying);
	assert_eq!(after_first.retry_count, 1);
	assert_eq!(
		after_first.next_run_time,
		Some(run_at + chrono::Duration::minutes(2))
	);
	assert_eq!(after_first.last_error.as_deref(), Some("connection reset"));

	let second_at = run_at + chrono::Duration::minutes(2);
	fx.advance_to(second_at);
	engine.run_tick().await.unwrap();
	let after_second = fx.reload(owner, &job).await;
	assert_eq!(after_second.retry_count, 2);
	assert_eq!(
		after_second.next_run_time,
		Some(second_at + chrono::Duration::minutes(4))
	);

	fx.advance_to(second_at + chrono::Duration::minutes(4));
	let report = engine.run_tick().await.unwrap();
	assert_eq!(report.failed, 1);

	let failed = fx.reload(owner, &job).await;
	assert_eq!(failed.status, JobStatus::Failed);
	assert_eq!(failed.next_run_time, None);
	assert_eq!(executor.calls(), 3);

	let dead_letters = fx.service.list_dead_letters(owner).await.unwrap();
	assert_eq!(dead_letters.len(), 1);
	assert_eq!(dead_letters[0].job_id, job.id);

	let history = fx.service.job_history(owner, job.id).await.unwrap();
	assert_eq!(history.len(), 3);
	assert_eq!(history[0].status, JobStatus::Failed);
	assert!(history[1..].iter().all(|h| h.status == JobStatus::Retrying));

	// Terminal jobs are never picked up again.
	fx.advance_to(t0() + chrono::Duration::days(1));
	assert_eq!(engine.run_tick().await.unwrap().due, 0);
}

#[tokio::test]
async fn non_retryable_failure_dead_letters_immediately() {
	let fx = Fixture::new().await;
	let owner = OwnerId::new();
	let run_at = t0() + chrono::Duration::seconds(30);
	let job = fx.create(owner, JobSchedule::OneTime { run_at }, 5).await;

	let engine = fx.engine(Counting::failing(FailureReason::BadRequest));
	fx.advance_to(run_at);
	engine.run_tick().await.unwrap();

	let failed = fx.reload(owner, &job).await;
	assert_eq!(failed.status, JobStatus::Failed);
	assert_eq!(failed.retry_count, 1);
	assert_eq!(fx.service.list_dead_letters(owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn replay_puts_dead_letter_back_on_schedule() {
	let fx = Fixture::new().await;
	let owner = OwnerId::new();
	let run_at = t0() + chrono::Duration::minutes(1);
	let job = fx.create(owner, JobSchedule::OneTime { run_at }, 1).await;

	fx.advance_to(run_at);
	fx.engine(Counting::failing(FailureReason::Unknown))
		.run_tick()
		.await
		.unwrap();
	let dead_letter = fx.service.list_dead_letters(owner).await.unwrap().remove(0);

	let replayed = fx
		.service
		.replay_dead_letter(owner, dead_letter.id)
		.await
		.unwrap();
	assert_eq!(replayed.status, JobStatus::Pending);
	assert_eq!(replayed.retry_count, 0);
	assert_eq!(replayed.last_error, None);
	assert_eq!(
		replayed.next_run_time,
		Some(run_at + chrono::Duration::seconds(1))
	);
	assert!(fx.service.list_dead_letters(owner).await.unwrap().is_empty());

	fx.advance_to(run_at + chrono::Duration::seconds(1));
	let executor = Counting::succeeding();
	fx.engine(executor.clone()).run_tick().await.unwrap();
	assert_eq!(executor.calls(), 1);
	assert_eq!(fx.reload(owner, &job).await.status, JobStatus::Success);
}

#[tokio::test]
async fn recurring_success_reschedules_from_cron() {
	let fx = Fixture::new().await;
	let owner = OwnerId::new();
	let job = fx
		.create(
			owner,
			JobSchedule::Cron {
				expression: "0 */15 * * * *".to_string(),
			},
			3,
		)
		.await;
	let first = t0() + chrono::Duration::minutes(15);
	assert_eq!(job.next_run_time, Some(first));

	let executor = Counting::succeeding();
	let engine = fx.engine(executor.clone());

	fx.advance_to(first);
	let report = engine.run_tick().await.unwrap();
	assert_eq!(report.succeeded, 1);

	let rescheduled = fx.reload(owner, &job).await;
	assert_eq!(rescheduled.status, JobStatus::Pending);
	assert_eq!(
		rescheduled.next_run_time,
		Some(first + chrono::Duration::minutes(15))
	);

	// Not due again until the next slot.
	fx.advance_to(first + chrono::Duration::minutes(5));
	assert_eq!(engine.run_tick().await.unwrap(), TickReport::default());
	assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn future_and_paused_jobs_are_not_selected() {
	let fx = Fixture::new().await;
	let owner = OwnerId::new();
	let later = fx
		.create(
			owner,
			JobSchedule::OneTime {
				run_at: t0() + chrono::Duration::hours(2),
			},
			3,
		)
		.await;
	let paused = fx
		.create(
			owner,
			JobSchedule::OneTime {
				run_at: t0() + chrono::Duration::minutes(1),
			},
			3,
		)
		.await;
	fx.service.pause_job(owner, paused.id).await.unwrap();

	let executor = Counting::succeeding();
	let engine = fx.engine(executor.clone());
	fx.advance_to(t0() + chrono::Duration::minutes(30));
	assert_eq!(engine.run_tick().await.unwrap().due, 0);
	assert_eq!(executor.calls(), 0);

	assert_eq!(fx.reload(owner, &later).await.status, JobStatus::Pending);
	assert_eq!(fx.reload(owner, &paused).await.status, JobStatus::Paused);
}

#[tokio::test]
async fn held_lease_blocks_other_workers() {
	let fx = Fixture::new().await;
	let owner = OwnerId::new();
	let run_at = t0() + chrono::Duration::minutes(1);
	let job = fx.create(owner, JobSchedule::OneTime { run_at }, 3).await;

	// Another node holds the lease.
	let other = SqliteLockService::with_clock(fx.pool.clone(), fx.clock.clone());
	assert!(other
		.acquire(&job.id.lock_key(), Duration::from_secs(60))
		.await
		.unwrap());

	let executor = Counting::succeeding();
	let engine = fx.engine(executor.clone());
	fx.advance_to(run_at);
	let report = engine.run_tick().await.unwrap();
	assert_eq!(report.skipped, 1);
	assert_eq!(executor.calls(), 0);

	// Once the lease expires the job is taken over.
	fx.advance_to(run_at + chrono::Duration::seconds(61));
	engine.run_tick().await.unwrap();
	assert_eq!(executor.calls(), 1);
	assert_eq!(fx.reload(owner, &job).await.status, JobStatus::Success);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_engines_execute_a_job_once() {
	let fx = Fixture::new().await;
	let owner = OwnerId::new();
	let run_at = t0() + chrono::Duration::minutes(1);
	let job = fx.create(owner, JobSchedule::OneTime { run_at }, 3).await;

	let executor = Counting::slow();
	let first = fx.engine(executor.clone());
	let second = fx.engine(executor.clone());
	fx.advance_to(run_at);

	let (a, b) = tokio::join!(first.run_tick(), second.run_tick());
	let (a, b) = (a.unwrap(), b.unwrap());

	assert_eq!(executor.calls(), 1);
	assert_eq!(a.succeeded + b.succeeded, 1);
	assert_eq!(fx.reload(owner, &job).await.status, JobStatus::Success);
	assert_eq!(
		fx.service.job_history(owner, job.id).await.unwrap().len(),
		1
	);
	assert_eq!(fx.clock.now(), run_at);
}

/// Deletes the job it is running through the owner's service, then reports `outcome`.
struct DeletesWhileRunning {
	service: JobService,
	owner: OwnerId,
	outcome: Result<(), JobFailure>,
}

#[async_trait]
impl JobExecutor for DeletesWhileRunning {
	fn job_type(&self) -> JobType {
		JobType::Log
	}

	async fn execute(&self, job: &Job) -> Result<(), JobFailure> {
		self.service.delete_job(self.owner, job.id).await.unwrap();
		self.outcome.clone()
	}
}

#[tokio::test]
async fn job_deleted_mid_run_stays_deleted() {
	for outcome in [Ok(()), Err(JobFailure::bad_request("HTTP 400"))] {
		let fx = Fixture::new().await;
		let owner = OwnerId::new();
		let job = fx
			.create(
				owner,
				JobSchedule::Cron {
					expression: "0 */5 * * * *".to_string(),
				},
				3,
			)
			.await;
		let engine = fx.engine(Arc::new(DeletesWhileRunning {
			service: JobService::new(fx.stores.clone(), utc()).with_clock(fx.clock.clone()),
			owner,
			outcome,
		}));

		fx.advance_to(job.next_run_time.unwrap());
		let report = engine.run_tick().await.unwrap();

		assert_eq!(report.due, 1);
		assert_eq!(report.skipped, 1);
		assert_eq!(report.errors, 0);
		assert!(fx.service.get_job(owner, job.id).await.is_err());
		assert!(fx.service.list_dead_letters(owner).await.unwrap().is_empty());
		let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_history WHERE job_id = ?")
			.bind(job.id.to_string())
			.fetch_one(&fx.pool)
			.await
			.unwrap();
		assert_eq!(history, 0);
		assert!(fx.locks.acquire(&job.id.lock_key(), Duration::from_secs(60)).await.unwrap());
	}
}
