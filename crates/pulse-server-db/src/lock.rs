// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lease table lock shared by every process attached to the same database.

use async_trait::async_trait;
use pulse_jobs_core::{Clock, LockService, SystemClock};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;

/// Advisory lease lock backed by the `job_locks` table.
///
/// A lease is taken when no row exists for the key or the existing row has
/// expired. Release deletes the row whoever holds it.
#[derive(Clone)]
pub struct SqliteLockService {
	pool: SqlitePool,
	holder: String,
	clock: Arc<dyn Clock>,
}

impl SqliteLockService {
	pub fn new(pool: SqlitePool) -> Self {
		Self::with_clock(pool, Arc::new(SystemClock))
	}

	pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
		Self {
			pool,
			holder: Uuid::new_v4().to_string(),
			clock,
		}
	}

	pub fn holder(&self) -> &str {
		&self.holder
	}

	#[instrument(skip(self), fields(holder = %self.holder))]
	pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
		let now_ms = self.clock.now().timestamp_millis();
		let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
		let expires_at = now_ms.saturating_add(ttl_ms);

		let result = sqlx::query(
			r#"
			INSERT INTO job_locks (key, holder, expires_at)
			VALUES (?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET
				holder = excluded.holder,
				expires_at = excluded.expires_at
			WHERE job_locks.expires_at <= ?
			"#,
		)
		.bind(key)
		.bind(&self.holder)
		.bind(expires_at)
		.bind(now_ms)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() == 1)
	}

	#[instrument(skip(self), fields(holder = %self.holder))]
	pub async fn release(&self, key: &str) -> Result<()> {
		sqlx::query("DELETE FROM job_locks WHERE key = ?")
			.bind(key)
			.execute(&self.pool)
			.await?;

		Ok(())
	}
}

#[async_trait]
impl LockService for SqliteLockService {
	async fn acquire(&self, key: &str, ttl: Duration) -> pulse_jobs_core::Result<bool> {
		Ok(self.acquire(key, ttl).await?)
	}

	async fn release(&self, key: &str) -> pulse_jobs_core::Result<()> {
		Ok(self.release(key).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use chrono::{TimeZone, Utc};
	use pulse_jobs_core::ManualClock;

	const TTL: Duration = Duration::from_secs(300);

	#[tokio::test]
	async fn test_second_holder_is_refused_until_release() {
		let pool = create_test_pool().await.unwrap();
		let a = SqliteLockService::new(pool.clone());
		let b = SqliteLockService::new(pool);

		assert!(a.acquire("job-lock:1", TTL).await.unwrap());
		assert!(!b.acquire("job-lock:1", TTL).await.unwrap());
		assert!(!a.acquire("job-lock:1", TTL).await.unwrap());

		a.release("job-lock:1").await.unwrap();
		assert!(b.acquire("job-lock:1", TTL).await.unwrap());
	}

	#[tokio::test]
	async fn test_keys_are_independent() {
		let pool = create_test_pool().await.unwrap();
		let lock = SqliteLockService::new(pool);

		assert!(lock.acquire("job-lock:1", TTL).await.unwrap());
		assert!(lock.acquire("job-lock:2", TTL).await.unwrap());
	}

	#[tokio::test]
	async fn test_expired_lease_can_be_taken_over() {
		let pool = create_test_pool().await.unwrap();
		let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
		let a = SqliteLockService::with_clock(pool.clone(), Arc::new(clock.clone()));
		let b = SqliteLockService::with_clock(pool.clone(), Arc::new(clock.clone()));

		assert!(a.acquire("job-lock:1", TTL).await.unwrap());
		clock.advance(chrono::Duration::minutes(4));
		assert!(!b.acquire("job-lock:1", TTL).await.unwrap());
		clock.advance(chrono::Duration::minutes(1));
		assert!(b.acquire("job-lock:1", TTL).await.unwrap());

		let (holder,): (String,) = sqlx::query_as("SELECT holder FROM job_locks WHERE key = 'job-lock:1'")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(holder, b.holder());
	}

	#[tokio::test]
	async fn test_release_of_unheld_key_is_ok() {
		let pool = create_test_pool().await.unwrap();
		let lock = SqliteLockService::new(pool);
		lock.release("job-lock:missing").await.unwrap();
	}
}
