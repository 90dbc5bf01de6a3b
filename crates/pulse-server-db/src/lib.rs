// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Pulse job scheduling engine.
//!
//! Provides the connection pool, schema migrations, and SQLite
//! implementations of the job, history and dead-letter stores plus the
//! lease-table lock service.

pub mod dead_letter;
pub mod error;
pub mod history;
pub mod job;
pub mod lock;
pub mod pool;
mod timestamp;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dead_letter::SqliteDeadLetterStore;
pub use error::{DbError, Result};
pub use history::SqliteHistoryStore;
pub use job::SqliteJobStore;
pub use lock::SqliteLockService;
pub use pool::{create_pool, run_migrations};
