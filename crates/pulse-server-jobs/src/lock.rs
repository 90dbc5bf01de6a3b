// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Execution lease helpers.
//!
//! - [`InMemoryLockService`]: process-local leases for tests and embedded use
//! - [`with_lock`]: acquire, run, release exactly once

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_jobs_core::{Clock, LockService, Result, SystemClock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Leases held in a map guarded by a mutex. Expired leases can be taken over.
pub struct InMemoryLockService {
	leases: Mutex<HashMap<String, DateTime<Utc>>>,
	clock: Arc<dyn Clock>,
}

impl InMemoryLockService {
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self {
			leases: Mutex::new(HashMap::new()),
			clock,
		}
	}
}

impl Default for InMemoryLockService {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl LockService for InMemoryLockService {
	async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
		let now = self.clock.now();
		let expires_at = chrono::Duration::from_std(ttl)
			.ok()
			.and_then(|ttl| now.checked_add_signed(ttl))
			.unwrap_or(DateTime::<Utc>::MAX_UTC);

		let mut leases = self.leases.lock().await;
		match leases.get(key) {
			Some(current) if *current > now => Ok(false),
			_ => {
				leases.insert(key.to_string(), expires_at);
				Ok(true)
			}
		}
	}

	async fn release(&self, key: &str) -> Result<()> {
		self.leases.lock().await.remove(key);
		Ok(())
	}
}

/// Result of running work under a lease.
#[derive(Debug, PartialEq, Eq)]
pub enum Locked<T> {
	Acquired(T),
	/// Someone else holds the lease; the work did not run.
	Contended,
}

/// Run `work` while holding the lease on `key`.
///
/// The lease is released once `work` completes, whatever it returned. A
/// failed release is logged and the lease is left to expire.
pub async fn with_lock<F, Fut, T>(
	locks: &dyn LockService,
	key: &str,
	ttl: Duration,
	work: F,
) -> Result<Locked<T>>
where
	F: FnOnce() -> Fut,
	Fut: Future<Output = T>,
{
	if !locks.acquire(key, ttl).await? {
		debug!(lock_key = %key, "Lease held elsewhere, skipping");
		return Ok(Locked::Contended);
	}

	let output = work().await;

	if let Err(e) = locks.release(key).await {
		warn!(lock_key = %key, error = %e, "Failed to release lease, it will expire");
	}

	Ok(Locked::Acquired(output))
}
