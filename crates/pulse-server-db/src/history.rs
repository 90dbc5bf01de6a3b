// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use pulse_jobs_core::{HistoryId, HistoryStore, JobHistory, JobId};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{DbError, Result};
use crate::timestamp;

#[derive(sqlx::FromRow)]
struct HistoryRow {
	id: String,
	job_id: String,
	run_time: String,
	status: String,
	error_message: Option<String>,
	retry_attempt: i64,
}

impl TryFrom<HistoryRow> for JobHistory {
	type Error = DbError;

	fn try_from(row: HistoryRow) -> Result<Self> {
		Ok(JobHistory {
			id: HistoryId(
				row.id
					.parse()
					.map_err(|_| DbError::Internal(format!("Invalid history ID: {}", row.id)))?,
			),
			job_id: row
				.job_id
				.parse()
				.map_err(|_| DbError::Internal(format!("Invalid job ID: {}", row.job_id)))?,
			run_time: timestamp::decode("run_time", &row.run_time)?,
			status: row
				.status
				.parse()
				.map_err(|e| DbError::Internal(format!("{e}")))?,
			error_message: row.error_message,
			retry_attempt: u32::try_from(row.retry_attempt).map_err(|_| {
				DbError::Internal(format!("Invalid retry_attempt: {}", row.retry_attempt))
			})?,
		})
	}
}

/// Append-only SQLite history of execution attempts.
#[derive(Clone)]
pub struct SqliteHistoryStore {
	pool: SqlitePool,
}

impl SqliteHistoryStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[instrument(skip(self, entry), fields(job_id = %entry.job_id, status = %entry.status))]
	pub async fn append(&self, entry: &JobHistory) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO job_history (id, job_id, run_time, status, error_message, retry_attempt)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(entry.id.to_string())
		.bind(entry.job_id.to_string())
		.bind(timestamp::encode(entry.run_time))
		.bind(entry.status.as_str())
		.bind(&entry.error_message)
		.bind(i64::from(entry.retry_attempt))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn list_by_job_desc(&self, job_id: JobId) -> Result<Vec<JobHistory>> {
		let rows = sqlx::query_as::<_, HistoryRow>(
			r#"
			SELECT id, job_id, run_time, status, error_message, retry_attempt
			FROM job_history
			WHERE job_id = ?
			ORDER BY run_time DESC, rowid DESC
			"#,
		)
		.bind(job_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(JobHistory::try_from).collect()
	}

	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn delete_by_job(&self, job_id: JobId) -> Result<u64> {
		let result = sqlx::query("DELETE FROM job_history WHERE job_id = ?")
			.bind(job_id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
	async fn append(&self, entry: &JobHistory) -> pulse_jobs_core::Result<()> {
		Ok(self.append(entry).await?)
	}

	async fn list_by_job_desc(&self, job_id: JobId) -> pulse_jobs_core::Result<Vec<JobHistory>> {
		Ok(self.list_by_job_desc(job_id).await?)
	}

	async fn delete_by_job(&self, job_id: JobId) -> pulse_jobs_core::Result<u64> {
		Ok(self.delete_by_job(job_id).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::SqliteJobStore;
	use crate::testing::{create_test_pool, sample_job};
	use chrono::{Duration, TimeZone, Utc};
	use pulse_jobs_core::{JobStatus, OwnerId};

	#[tokio::test]
	async fn test_history_is_newest_first() {
		let pool = create_test_pool().await.unwrap();
		let jobs = SqliteJobStore::new(pool.clone());
		let history = SqliteHistoryStore::new(pool);

		let job = sample_job(OwnerId::new(), None);
		jobs.save(&job).await.unwrap();

		let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
		history
			.append(&JobHistory::failure(job.id, t0, JobStatus::Retrying, "timeout", 1))
			.await
			.unwrap();
		history
			.append(&JobHistory::failure(
				job.id,
				t0 + Duration::minutes(2),
				JobStatus::Retrying,
				"timeout",
				2,
			))
			.await
			.unwrap();
		history
			.append(&JobHistory::success(job.id, t0 + Duration::minutes(6)))
			.await
			.unwrap();

		let entries = history.list_by_job_desc(job.id).await.unwrap();
		let attempts: Vec<u32> = entries.iter().map(|e| e.retry_attempt).collect();
		assert_eq!(attempts, vec![0, 2, 1]);
		assert_eq!(entries[0].status, JobStatus::Success);
		assert_eq!(entries[2].error_message.as_deref(), Some("timeout"));
	}

	#[tokio::test]
	async fn test_job_deletion_cascades_to_history() {
		let pool = create_test_pool().await.unwrap();
		let jobs = SqliteJobStore::new(pool.clone());
		let history = SqliteHistoryStore::new(pool);

		let job = sample_job(OwnerId::new(), None);
		jobs.save(&job).await.unwrap();
		history
			.append(&JobHistory::success(job.id, Utc::now()))
			.await
			.unwrap();

		jobs.delete(job.id).await.unwrap();
		assert!(history.list_by_job_desc(job.id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_delete_by_job_counts_rows() {
		let pool = create_test_pool().await.unwrap();
		let jobs = SqliteJobStore::new(pool.clone());
		let history = SqliteHistoryStore::new(pool);

		let job = sample_job(OwnerId::new(), None);
		jobs.save(&job).await.unwrap();
		for _ in 0..3 {
			history
				.append(&JobHistory::success(job.id, Utc::now()))
				.await
				.unwrap();
		}

		assert_eq!(history.delete_by_job(job.id).await.unwrap(), 3);
		assert_eq!(history.delete_by_job(job.id).await.unwrap(), 0);
	}
}
