// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_jobs_core::{Job, JobId, JobStore, OwnerId};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{DbError, Result};
use crate::timestamp;

const JOB_COLUMNS: &str = "id, owner_id, name, job_type, payload, recurring, cron_expression, \
	next_run_time, status, retry_count, max_retries, last_error, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct JobRow {
	id: String,
	owner_id: String,
	name: String,
	job_type: String,
	payload: String,
	recurring: bool,
	cron_expression: Option<String>,
	next_run_time: Option<String>,
	status: String,
	retry_count: i64,
	max_retries: i64,
	last_error: Option<String>,
	created_at: String,
	updated_at: String,
}

impl TryFrom<JobRow> for Job {
	type Error = DbError;

	fn try_from(row: JobRow) -> Result<Self> {
		Ok(Job {
			id: row
				.id
				.parse()
				.map_err(|_| DbError::Internal(format!("Invalid job ID: {}", row.id)))?,
			owner_id: row
				.owner_id
				.parse()
				.map_err(|_| DbError::Internal(format!("Invalid owner ID: {}", row.owner_id)))?,
			name: row.name,
			job_type: row
				.job_type
				.parse()
				.map_err(|e| DbError::Internal(format!("{e}")))?,
			payload: row.payload,
			recurring: row.recurring,
			cron_expression: row.cron_expression,
			next_run_time: timestamp::decode_opt("next_run_time", row.next_run_time.as_deref())?,
			status: row
				.status
				.parse()
				.map_err(|e| DbError::Internal(format!("{e}")))?,
			retry_count: u32::try_from(row.retry_count)
				.map_err(|_| DbError::Internal(format!("Invalid retry_count: {}", row.retry_count)))?,
			max_retries: u32::try_from(row.max_retries)
				.map_err(|_| DbError::Internal(format!("Invalid max_retries: {}", row.max_retries)))?,
			last_error: row.last_error,
			created_at: timestamp::decode("created_at", &row.created_at)?,
			updated_at: timestamp::decode("updated_at", &row.updated_at)?,
		})
	}
}

/// SQLite implementation of [`JobStore`].
#[derive(Clone)]
pub struct SqliteJobStore {
	pool: SqlitePool,
}

impl SqliteJobStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[instrument(skip(self))]
	pub async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
		let rows = sqlx::query_as::<_, JobRow>(&format!(
			r#"
			SELECT {JOB_COLUMNS}
			FROM jobs
			WHERE status IN ('PENDING', 'RETRYING')
			  AND next_run_time IS NOT NULL
			  AND next_run_time <= ?
			ORDER BY next_run_time
			"#
		))
		.bind(timestamp::encode(now))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Job::try_from).collect()
	}

	#[instrument(skip(self), fields(job_id = %id))]
	pub async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
		let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(Job::try_from).transpose()
	}

	#[instrument(skip(self), fields(owner_id = %owner_id))]
	pub async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Job>> {
		let rows = sqlx::query_as::<_, JobRow>(&format!(
			"SELECT {JOB_COLUMNS} FROM jobs WHERE owner_id = ? ORDER BY created_at, id"
		))
		.bind(owner_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Job::try_from).collect()
	}

	#[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status))]
	pub async fn save(&self, job: &Job) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO jobs (
				id, owner_id, name, job_type, payload, recurring, cron_expression,
				next_run_time, status, retry_count, max_retries, last_error, created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(id) DO UPDATE SET
				owner_id = excluded.owner_id,
				name = excluded.name,
				job_type = excluded.job_type,
				payload = excluded.payload,
				recurring = excluded.recurring,
				cron_expression = excluded.cron_expression,
				next_run_time = excluded.next_run_time,
				status = excluded.status,
				retry_count = excluded.retry_count,
				max_retries = excluded.max_retries,
				last_error = excluded.last_error,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(job.id.to_string())
		.bind(job.owner_id.to_string())
		.bind(&job.name)
		.bind(job.job_type.as_str())
		.bind(&job.payload)
		.bind(job.recurring)
		.bind(&job.cron_expression)
		.bind(job.next_run_time.map(timestamp::encode))
		.bind(job.status.as_str())
		.bind(i64::from(job.retry_count))
		.bind(i64::from(job.max_retries))
		.bind(&job.last_error)
		.bind(timestamp::encode(job.created_at))
		.bind(timestamp::encode(job.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Update-only write; `false` means the row is gone.
	#[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status))]
	pub async fn update(&self, job: &Job) -> Result<bool> {
		let result = sqlx::query(
			r#"
			UPDATE jobs SET
				name = ?,
				job_type = ?,
				payload = ?,
				recurring = ?,
				cron_expression = ?,
				next_run_time = ?,
				status = ?,
				retry_count = ?,
				max_retries = ?,
				last_error = ?,
				updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&job.name)
		.bind(job.job_type.as_str())
		.bind(&job.payload)
		.bind(job.recurring)
		.bind(&job.cron_expression)
		.bind(job.next_run_time.map(timestamp::encode))
		.bind(job.status.as_str())
		.bind(i64::from(job.retry_count))
		.bind(i64::from(job.max_retries))
		.bind(&job.last_error)
		.bind(timestamp::encode(job.updated_at))
		.bind(job.id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(job_id = %id))]
	pub async fn delete(&self, id: JobId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl JobStore for SqliteJobStore {
	async fn find_due(&self, now: DateTime<Utc>) -> pulse_jobs_core::Result<Vec<Job>> {
		Ok(self.find_due(now).await?)
	}

	async fn find_by_id(&self, id: JobId) -> pulse_jobs_core::Result<Option<Job>> {
		Ok(self.find_by_id(id).await?)
	}

	async fn list_by_owner(&self, owner_id: OwnerId) -> pulse_jobs_core::Result<Vec<Job>> {
		Ok(self.list_by_owner(owner_id).await?)
	}

	async fn save(&self, job: &Job) -> pulse_jobs_core::Result<()> {
		Ok(self.save(job).await?)
	}

	async fn update(&self, job: &Job) -> pulse_jobs_core::Result<bool> {
		Ok(self.update(job).await?)
	}

	async fn delete(&self, id: JobId) -> pulse_jobs_core::Result<bool> {
		Ok(self.delete(id).await?)
	}
}
