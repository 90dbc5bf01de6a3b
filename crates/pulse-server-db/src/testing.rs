// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::Result;
use crate::pool::run_migrations;

/// Migrated in-memory database. A single connection is kept alive so every
/// query sees the same database.
pub async fn create_test_pool() -> Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await?;
	run_migrations(&pool).await?;
	Ok(pool)
}

/// A pending LOG job due at `next_run_time`, with whole-second timestamps.
pub fn sample_job(
	owner_id: pulse_jobs_core::OwnerId,
	next_run_time: Option<chrono::DateTime<chrono::Utc>>,
) -> pulse_jobs_core::Job {
	use chrono::{TimeZone, Utc};
	use pulse_jobs_core::{Job, JobId, JobStatus, JobType};

	let created = Utc
		.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
		.single()
		.unwrap_or_else(Utc::now);
	Job {
		id: JobId::new(),
		owner_id,
		name: "sample".to_string(),
		job_type: JobType::Log,
		payload: r#"{"message":"hello"}"#.to_string(),
		recurring: false,
		cron_expression: None,
		next_run_time,
		status: JobStatus::Pending,
		retry_count: 0,
		max_retries: 3,
		last_error: None,
		created_at: created,
		updated_at: created,
	}
}
