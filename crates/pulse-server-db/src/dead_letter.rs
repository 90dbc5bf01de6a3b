// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use pulse_jobs_core::{DeadLetterId, DeadLetterJob, DeadLetterStore, JobId, OwnerId};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::{DbError, Result};
use crate::timestamp;

const DEAD_LETTER_COLUMNS: &str = "id, job_id, owner_id, last_error, failed_at";

#[derive(sqlx::FromRow)]
struct DeadLetterRow {
	id: String,
	job_id: String,
	owner_id: String,
	last_error: Option<String>,
	failed_at: String,
}

impl TryFrom<DeadLetterRow> for DeadLetterJob {
	type Error = DbError;

	fn try_from(row: DeadLetterRow) -> Result<Self> {
		Ok(DeadLetterJob {
			id: row
				.id
				.parse()
				.map_err(|_| DbError::Internal(format!("Invalid dead-letter ID: {}", row.id)))?,
			job_id: row
				.job_id
				.parse()
				.map_err(|_| DbError::Internal(format!("Invalid job ID: {}", row.job_id)))?,
			owner_id: row
				.owner_id
				.parse()
				.map_err(|_| DbError::Internal(format!("Invalid owner ID: {}", row.owner_id)))?,
			last_error: row.last_error,
			failed_at: timestamp::decode("failed_at", &row.failed_at)?,
		})
	}
}

/// SQLite dead-letter store. A job has at most one record; saving again replaces it.
#[derive(Clone)]
pub struct SqliteDeadLetterStore {
	pool: SqlitePool,
}

impl SqliteDeadLetterStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[instrument(skip(self, entry), fields(dead_letter_id = %entry.id, job_id = %entry.job_id))]
	pub async fn save(&self, entry: &DeadLetterJob) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO dead_letter_jobs (id, job_id, owner_id, last_error, failed_at)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(job_id) DO UPDATE SET
				id = excluded.id,
				owner_id = excluded.owner_id,
				last_error = excluded.last_error,
				failed_at = excluded.failed_at
			"#,
		)
		.bind(entry.id.to_string())
		.bind(entry.job_id.to_string())
		.bind(entry.owner_id.to_string())
		.bind(&entry.last_error)
		.bind(timestamp::encode(entry.failed_at))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(dead_letter_id = %id))]
	pub async fn find_by_id(&self, id: DeadLetterId) -> Result<Option<DeadLetterJob>> {
		let row = sqlx::query_as::<_, DeadLetterRow>(&format!(
			"SELECT {DEAD_LETTER_COLUMNS} FROM dead_letter_jobs WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(DeadLetterJob::try_from).transpose()
	}

	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn find_by_job(&self, job_id: JobId) -> Result<Option<DeadLetterJob>> {
		let row = sqlx::query_as::<_, DeadLetterRow>(&format!(
			"SELECT {DEAD_LETTER_COLUMNS} FROM dead_letter_jobs WHERE job_id = ?"
		))
		.bind(job_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(DeadLetterJob::try_from).transpose()
	}

	#[instrument(skip(self), fields(dead_letter_id = %id))]
	pub async fn delete(&self, id: DeadLetterId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM dead_letter_jobs WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(owner_id = %owner_id))]
	pub async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DeadLetterJob>> {
		let rows = sqlx::query_as::<_, DeadLetterRow>(&format!(
			"SELECT {DEAD_LETTER_COLUMNS} FROM dead_letter_jobs WHERE owner_id = ? ORDER BY failed_at DESC"
		))
		.bind(owner_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(DeadLetterJob::try_from).collect()
	}
}

#[async_trait]
impl DeadLetterStore for SqliteDeadLetterStore {
	async fn save(&self, entry: &DeadLetterJob) -> pulse_jobs_core::Result<()> {
		Ok(self.save(entry).await?)
	}

	async fn find_by_id(&self, id: DeadLetterId) -> pulse_jobs_core::Result<Option<DeadLetterJob>> {
		Ok(self.find_by_id(id).await?)
	}

	async fn find_by_job(&self, job_id: JobId) -> pulse_jobs_core::Result<Option<DeadLetterJob>> {
		Ok(self.find_by_job(job_id).await?)
	}

	async fn delete(&self, id: DeadLetterId) -> pulse_jobs_core::Result<bool> {
		Ok(self.delete(id).await?)
	}

	async fn list_by_owner(&self, owner_id: OwnerId) -> pulse_jobs_core::Result<Vec<DeadLetterJob>> {
		Ok(self.list_by_owner(owner_id).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::SqliteJobStore;
	use crate::testing::{create_test_pool, sample_job};
	use chrono::{TimeZone, Utc};

	#[tokio::test]
	async fn test_save_find_and_delete() {
		let pool = create_test_pool().await.unwrap();
		let jobs = SqliteJobStore::new(pool.clone());
		let store = SqliteDeadLetterStore::new(pool);

		let mut job = sample_job(OwnerId::new(), None);
		job.last_error = Some("401 Unauthorized".to_string());
		jobs.save(&job).await.unwrap();

		let failed_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
		let entry = DeadLetterJob::for_job(&job, failed_at);
		store.save(&entry).await.unwrap();

		assert_eq!(store.find_by_id(entry.id).await.unwrap(), Some(entry.clone()));
		assert_eq!(store.find_by_job(job.id).await.unwrap(), Some(entry.clone()));
		assert_eq!(store.list_by_owner(job.owner_id).await.unwrap(), vec![entry.clone()]);

		assert!(store.delete(entry.id).await.unwrap());
		assert!(!store.delete(entry.id).await.unwrap());
		assert!(store.find_by_job(job.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_second_record_for_same_job_replaces_first() {
		let pool = create_test_pool().await.unwrap();
		let jobs = SqliteJobStore::new(pool.clone());
		let store = SqliteDeadLetterStore::new(pool);

		let job = sample_job(OwnerId::new(), None);
		jobs.save(&job).await.unwrap();

		let first = DeadLetterJob::for_job(&job, Utc::now());
		let second = DeadLetterJob::for_job(&job, Utc::now());
		store.save(&first).await.unwrap();
		store.save(&second).await.unwrap();

		let all = store.list_by_owner(job.owner_id).await.unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].id, second.id);
	}

	#[tokio::test]
	async fn test_job_deletion_cascades_to_dead_letter() {
		let pool = create_test_pool().await.unwrap();
		let jobs = SqliteJobStore::new(pool.clone());
		let store = SqliteDeadLetterStore::new(pool);

		let job = sample_job(OwnerId::new(), None);
		jobs.save(&job).await.unwrap();
		store
			.save(&DeadLetterJob::for_job(&job, Utc::now()))
			.await
			.unwrap();

		jobs.delete(job.id).await.unwrap();
		assert!(store.find_by_job(job.id).await.unwrap().is_none());
	}
}
