// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use pulse_jobs_core::{DeadLetterStore, HistoryStore, JobStore};
use pulse_server_db::{SqliteDeadLetterStore, SqliteHistoryStore, SqliteJobStore};
use sqlx::SqlitePool;

use crate::memory::{InMemoryDeadLetterStore, InMemoryHistoryStore, InMemoryJobStore};

/// The persistence handles shared by the engine and the job service.
#[derive(Clone)]
pub struct Stores {
	pub jobs: Arc<dyn JobStore>,
	pub history: Arc<dyn HistoryStore>,
	pub dead_letters: Arc<dyn DeadLetterStore>,
}

impl Stores {
	pub fn sqlite(pool: SqlitePool) -> Self {
		Self {
			jobs: Arc::new(SqliteJobStore::new(pool.clone())),
			history: Arc::new(SqliteHistoryStore::new(pool.clone())),
			dead_letters: Arc::new(SqliteDeadLetterStore::new(pool)),
		}
	}

	pub fn in_memory() -> Self {
		Self {
			jobs: Arc::new(InMemoryJobStore::new()),
			history: Arc::new(InMemoryHistoryStore::new()),
			dead_letters: Arc::new(InMemoryDeadLetterStore::new()),
		}
	}
}
