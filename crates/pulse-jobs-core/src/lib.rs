// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Pulse job scheduling engine.
//!
//! This crate holds everything the engine reasons about without touching I/O:
//!
//! - The job model ([`Job`], [`JobHistory`], [`DeadLetterJob`]) and its status enum
//! - Failure classification ([`FailureReason`]) and the retry policy
//! - The cron calculator used to compute next run instants
//! - Store and lock traits implemented by the persistence crates
//! - A [`Clock`] abstraction so lifecycle transitions can be tested deterministically

pub mod clock;
pub mod dead_letter;
pub mod error;
pub mod failure;
pub mod history;
pub mod job;
pub mod retry;
pub mod schedule;
pub mod stats;
pub mod store;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::ManualClock;
pub use dead_letter::{DeadLetterId, DeadLetterJob};
pub use error::{JobsCoreError, Result};
pub use failure::{FailureReason, JobFailure};
pub use history::{HistoryId, JobHistory};
pub use job::{Job, JobId, JobStatus, JobType, OwnerId};
pub use retry::{backoff_delay, is_retryable, retry_at, RetryDecision};
pub use schedule::{
	generate_cron_expression, next_run_time, validate_cron_expression, Frequency, ScheduleTimezone,
};
pub use stats::JobStats;
pub use store::{DeadLetterStore, HistoryStore, JobStore, LockService};
