// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Housekeeping against the server database.
//!
//! Date columns are compared as RFC 3339 UTC text, the format Pulse itself
//! stores. Table and column names are checked against
//! `^[a-zA-Z_][a-zA-Z0-9_]*$` before they are spliced into SQL.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use pulse_jobs_core::{Clock, Job, JobFailure, JobType, SystemClock};
use regex::Regex;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::executor::{parse_payload, require, JobExecutor};

const DEFAULT_DATE_COLUMN: &str = "created_at";
const DEFAULT_DELETE_DAYS: i64 = 30;
const DEFAULT_ARCHIVE_DAYS: i64 = 90;

static IDENTIFIER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupPayload {
	action: Option<String>,
	table_name: Option<String>,
	source_table: Option<String>,
	archive_table: Option<String>,
	date_column: Option<String>,
	days_old: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CleanupAction {
	DeleteOldRecords {
		table: String,
		date_column: String,
		days_old: i64,
	},
	TruncateTable {
		table: String,
	},
	ArchiveData {
		source: String,
		archive: String,
		date_column: String,
		days_old: i64,
	},
}

fn identifier(value: Option<&str>, field: &str) -> Result<String, JobFailure> {
	let value = require(value, field)?;
	if IDENTIFIER.is_match(value) {
		Ok(value.to_string())
	} else {
		Err(JobFailure::invalid_config(format!(
			"invalid identifier for '{field}': {value}"
		)))
	}
}

fn days(value: Option<i64>, default: i64) -> Result<i64, JobFailure> {
	match value.unwrap_or(default) {
		d if d >= 0 => Ok(d),
		d => Err(JobFailure::invalid_config(format!(
			"daysOld must not be negative, got {d}"
		))),
	}
}

impl CleanupAction {
	fn from_payload(payload: CleanupPayload) -> Result<Self, JobFailure> {
		let action = require(payload.action.as_deref(), "action")?.to_ascii_lowercase();
		let date_column = || {
			identifier(
				Some(payload.date_column.as_deref().unwrap_or(DEFAULT_DATE_COLUMN)),
				"dateColumn",
			)
		};

		match action.as_str() {
			"delete_old_records" => Ok(CleanupAction::DeleteOldRecords {
				table: identifier(payload.table_name.as_deref(), "tableName")?,
				date_column: date_column()?,
				days_old: days(payload.days_old, DEFAULT_DELETE_DAYS)?,
			}),
			"truncate_table" => Ok(CleanupAction::TruncateTable {
				table: identifier(payload.table_name.as_deref(), "tableName")?,
			}),
			"archive_data" => Ok(CleanupAction::ArchiveData {
				source: identifier(payload.source_table.as_deref(), "sourceTable")?,
				archive: identifier(payload.archive_table.as_deref(), "archiveTable")?,
				date_column: date_column()?,
				days_old: days(payload.days_old, DEFAULT_ARCHIVE_DAYS)?,
			}),
			other => Err(JobFailure::invalid_config(format!(
				"unknown cleanup action: {other}"
			))),
		}
	}
}

fn classify_db_error(e: sqlx::Error) -> JobFailure {
	match e {
		sqlx::Error::PoolTimedOut => JobFailure::timeout(format!("database pool timed out: {e}")),
		sqlx::Error::Io(_) => JobFailure::network(format!("database I/O error: {e}")),
		other => JobFailure::unknown(format!("cleanup failed: {other}")),
	}
}

fn cutoff(now: DateTime<Utc>, days_old: i64) -> String {
	let cutoff = Duration::try_days(days_old)
		.and_then(|d| now.checked_sub_signed(d))
		.unwrap_or(DateTime::<Utc>::MIN_UTC);
	cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct DataCleanupExecutor {
	pool: SqlitePool,
	clock: Arc<dyn Clock>,
}

impl DataCleanupExecutor {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	async fn run(&self, action: &CleanupAction) -> Result<u64, sqlx::Error> {
		let now = self.clock.now();
		match action {
			CleanupAction::DeleteOldRecords {
				table,
				date_column,
				days_old,
			} => {
				let sql = format!(r#"DELETE FROM "{table}" WHERE "{date_column}" < ?"#);
				let result = sqlx::query(&sql)
					.bind(cutoff(now, *days_old))
					.execute(&self.pool)
					.await?;
				Ok(result.rows_affected())
			}
			CleanupAction::TruncateTable { table } => {
				let sql = format!(r#"DELETE FROM "{table}""#);
				let result = sqlx::query(&sql).execute(&self.pool).await?;
				Ok(result.rows_affected())
			}
			CleanupAction::ArchiveData {
				source,
				archive,
				date_column,
				days_old,
			} => {
				let cutoff = cutoff(now, *days_old);
				let mut tx = self.pool.begin().await?;

				let insert = format!(
					r#"INSERT INTO "{archive}" SELECT * FROM "{source}" WHERE "{date_column}" < ?"#
				);
				sqlx::query(&insert)
					.bind(&cutoff)
					.execute(&mut *tx)
					.await?;

				let delete = format!(r#"DELETE FROM "{source}" WHERE "{date_column}" < ?"#);
				let result = sqlx::query(&delete)
					.bind(&cutoff)
					.execute(&mut *tx)
					.await?;

				tx.commit().await?;
				Ok(result.rows_affected())
			}
		}
	}
}

#[async_trait]
impl JobExecutor for DataCleanupExecutor {
	fn job_type(&self) -> JobType {
		JobType::DataCleanup
	}

	#[instrument(skip(self, job), fields(job_id = %job.id))]
	async fn execute(&self, job: &Job) -> Result<(), JobFailure> {
		let payload: CleanupPayload = parse_payload(job)?;
		let action = CleanupAction::from_payload(payload)?;

		let rows = self.run(&action).await.map_err(classify_db_error)?;
		info!(?action, rows, "Data cleanup completed");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use pulse_jobs_core::{FailureReason, ManualClock, OwnerId};
	use pulse_server_db::testing::create_test_pool;

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()
	}

	fn job(payload: serde_json::Value) -> Job {
		let mut job = pulse_server_db::testing::sample_job(OwnerId::new(), None);
		job.job_type = JobType::DataCleanup;
		job.payload = payload.to_string();
		job
	}

	async fn setup() -> (SqlitePool, DataCleanupExecutor) {
		let pool = create_test_pool().await.unwrap();
		for table in ["audit_events", "audit_archive"] {
			sqlx::query(&format!(
				"CREATE TABLE {table} (id INTEGER PRIMARY KEY, created_at TEXT NOT NULL)"
			))
			.execute(&pool)
			.await
			.unwrap();
		}
		for (id, created_at) in [
			(1, "2026-01-01T00:00:00Z"),
			(2, "2026-03-15T00:00:00Z"),
			(3, "2026-04-30T00:00:00Z"),
		] {
			sqlx::query("INSERT INTO audit_events (id, created_at) VALUES (?, ?)")
				.bind(id)
				.bind(created_at)
				.execute(&pool)
				.await
				.unwrap();
		}
		let executor =
			DataCleanupExecutor::new(pool.clone()).with_clock(Arc::new(ManualClock::new(now())));
		(pool, executor)
	}

	async fn count(pool: &SqlitePool, table: &str) -> i64 {
		sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
			.fetch_one(pool)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_delete_old_records_uses_default_thirty_days() {
		let (pool, executor) = setup().await;
		executor
			.execute(&job(serde_json::json!({
				"action": "delete_old_records",
				"tableName": "audit_events",
			})))
			.await
			.unwrap();
		assert_eq!(count(&pool, "audit_events").await, 1);
	}

	#[tokio::test]
	async fn test_truncate_table() {
		let (pool, executor) = setup().await;
		executor
			.execute(&job(serde_json::json!({
				"action": "TRUNCATE_TABLE",
				"tableName": "audit_events",
			})))
			.await
			.unwrap();
		assert_eq!(count(&pool, "audit_events").await, 0);
	}

	#[tokio::test]
	async fn test_archive_moves_rows() {
		let (pool, executor) = setup().await;
		executor
			.execute(&job(serde_json::json!({
				"action": "archive_data",
				"sourceTable": "audit_events",
				"archiveTable": "audit_archive",
				"daysOld": 40,
			})))
			.await
			.unwrap();
		assert_eq!(count(&pool, "audit_events").await, 1);
		assert_eq!(count(&pool, "audit_archive").await, 2);
	}

	#[tokio::test]
	async fn test_injection_attempts_are_rejected() {
		let (pool, executor) = setup().await;
		for payload in [
			serde_json::json!({"action": "truncate_table", "tableName": "jobs; DROP TABLE jobs"}),
			serde_json::json!({"action": "delete_old_records", "tableName": "audit_events", "dateColumn": "1=1 OR created_at"}),
			serde_json::json!({"action": "archive_data", "sourceTable": "audit_events", "archiveTable": "9lives"}),
		] {
			let err = executor.execute(&job(payload)).await.unwrap_err();
			assert_eq!(err.reason, FailureReason::InvalidConfig);
		}
		assert_eq!(count(&pool, "audit_events").await, 3);
	}

	#[tokio::test]
	async fn test_unknown_action_and_negative_days() {
		let (_, executor) = setup().await;
		let unknown = executor
			.execute(&job(serde_json::json!({"action": "vacuum"})))
			.await
			.unwrap_err();
		assert_eq!(unknown.reason, FailureReason::InvalidConfig);

		let negative = executor
			.execute(&job(serde_json::json!({
				"action": "delete_old_records",
				"tableName": "audit_events",
				"daysOld": -1,
			})))
			.await
			.unwrap_err();
		assert_eq!(negative.reason, FailureReason::InvalidConfig);
	}

	#[tokio::test]
	async fn test_missing_table_is_unknown() {
		let (_, executor) = setup().await;
		let err = executor
			.execute(&job(serde_json::json!({
				"action": "truncate_table",
				"tableName": "no_such_table",
			})))
			.await
			.unwrap_err();
		assert_eq!(err.reason, FailureReason::Unknown);
	}

	#[test]
	fn test_cutoff_format() {
		assert_eq!(cutoff(now(), 30), "2026-04-01T00:00:00Z");
	}
}
