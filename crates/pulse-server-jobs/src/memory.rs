// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory stores for tests and single-process embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_jobs_core::{
	DeadLetterId, DeadLetterJob, DeadLetterStore, HistoryStore, Job, JobHistory, JobId,
	JobStore, OwnerId, Result,
};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryJobStore {
	jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl JobStore for InMemoryJobStore {
	async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
		let jobs = self.jobs.read().await;
		let mut due: Vec<Job> = jobs.values().filter(|j| j.is_due(now)).cloned().collect();
		due.sort_by_key(|j| j.next_run_time);
		Ok(due)
	}

	async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
		Ok(self.jobs.read().await.get(&id).cloned())
	}

	async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Job>> {
		let jobs = self.jobs.read().await;
		let mut owned: Vec<Job> = jobs
			.values()
			.filter(|j| j.owner_id == owner_id)
			.cloned()
			.collect();
		owned.sort_by_key(|j| j.created_at);
		Ok(owned)
	}

	async fn save(&self, job: &Job) -> Result<()> {
		self.jobs.write().await.insert(job.id, job.clone());
		Ok(())
	}

	async fn update(&self, job: &Job) -> Result<bool> {
		match self.jobs.write().await.get_mut(&job.id) {
			Some(existing) => {
				*existing = job.clone();
				Ok(true)
			}
			None => Ok(false),
		}
	}

	async fn delete(&self, id: JobId) -> Result<bool> {
		Ok(self.jobs.write().await.remove(&id).is_some())
	}
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
	entries: RwLock<Vec<JobHistory>>,
}

impl InMemoryHistoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
	async fn append(&self, entry: &JobHistory) -> Result<()> {
		self.entries.write().await.push(entry.clone());
		Ok(())
	}

	async fn list_by_job_desc(&self, job_id: JobId) -> Result<Vec<JobHistory>> {
		let entries = self.entries.read().await;
		let mut rows: Vec<JobHistory> = entries
			.iter()
			.filter(|e| e.job_id == job_id)
			.cloned()
			.collect();
		// equal run times: latest append first
		rows.reverse();
		rows.sort_by(|a, b| b.run_time.cmp(&a.run_time));
		Ok(rows)
	}

	async fn delete_by_job(&self, job_id: JobId) -> Result<u64> {
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|e| e.job_id != job_id);
		Ok((before - entries.len()) as u64)
	}
}

/// Keeps at most one entry per job; saving again replaces it.
#[derive(Default)]
pub struct InMemoryDeadLetterStore {
	entries: RwLock<HashMap<JobId, DeadLetterJob>>,
}

impl InMemoryDeadLetterStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
	async fn save(&self, entry: &DeadLetterJob) -> Result<()> {
		self.entries
			.write()
			.await
			.insert(entry.job_id, entry.clone());
		Ok(())
	}

	async fn find_by_id(&self, id: DeadLetterId) -> Result<Option<DeadLetterJob>> {
		let entries = self.entries.read().await;
		Ok(entries.values().find(|e| e.id == id).cloned())
	}

	async fn find_by_job(&self, job_id: JobId) -> Result<Option<DeadLetterJob>> {
		Ok(self.entries.read().await.get(&job_id).cloned())
	}

	async fn delete(&self, id: DeadLetterId) -> Result<bool> {
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|_, e| e.id != id);
		Ok(entries.len() < before)
	}

	async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<DeadLetterJob>> {
		let entries = self.entries.read().await;
		let mut owned: Vec<DeadLetterJob> = entries
			.values()
			.filter(|e| e.owner_id == owner_id)
			.cloned()
			.collect();
		owned.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
		Ok(owned)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Duration, TimeZone};
	use pulse_jobs_core::JobStatus;
	use pulse_server_db::testing::sample_job;

	fn t0() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
	}

	#[tokio::test]
	async fn test_find_due_skips_future_and_paused() {
		let store = InMemoryJobStore::new();
		let owner = OwnerId::new();

		let due = sample_job(owner, Some(t0()));
		let future = sample_job(owner, Some(t0() + Duration::seconds(1)));
		let mut paused = sample_job(owner, Some(t0() - Duration::minutes(1)));
		paused.status = JobStatus::Paused;

		for job in [&due, &future, &paused] {
			store.save(job).await.unwrap();
		}

		let found = store.find_due(t0()).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].id, due.id);
	}

	#[tokio::test]
	async fn test_update_only_touches_existing_jobs() {
		let store = InMemoryJobStore::new();
		let mut job = sample_job(OwnerId::new(), Some(t0()));
		assert!(!store.update(&job).await.unwrap());
		assert!(store.find_by_id(job.id).await.unwrap().is_none());

		store.save(&job).await.unwrap();
		job.retry_count = 2;
		assert!(store.update(&job).await.unwrap());
		assert_eq!(store.find_by_id(job.id).await.unwrap().unwrap().retry_count, 2);
	}

	#[tokio::test]
	async fn test_history_newest_first() {
		let store = InMemoryHistoryStore::new();
		let job_id = JobId::new();
		store.append(&JobHistory::success(job_id, t0())).await.unwrap();
		store
			.append(&JobHistory::success(job_id, t0() + Duration::minutes(5)))
			.await
			.unwrap();
		store
			.append(&JobHistory::success(JobId::new(), t0()))
			.await
			.unwrap();

		let rows = store.list_by_job_desc(job_id).await.unwrap();
		assert_eq!(rows.len(), 2);
		assert!(rows[0].run_time > rows[1].run_time);
		assert_eq!(store.delete_by_job(job_id).await.unwrap(), 2);
	}

	#[tokio::test]
	async fn test_dead_letter_one_entry_per_job() {
		let store = InMemoryDeadLetterStore::new();
		let job = sample_job(OwnerId::new(), None);

		let first = DeadLetterJob::for_job(&job, t0());
		let second = DeadLetterJob::for_job(&job, t0() + Duration::minutes(1));
		store.save(&first).await.unwrap();
		store.save(&second).await.unwrap();

		assert!(store.find_by_id(first.id).await.unwrap().is_none());
		assert_eq!(store.find_by_job(job.id).await.unwrap(), Some(second.clone()));
		assert!(store.delete(second.id).await.unwrap());
		assert!(!store.delete(second.id).await.unwrap());
	}
}
