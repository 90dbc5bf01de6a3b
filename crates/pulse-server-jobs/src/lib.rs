// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job scheduling and execution engine for the Pulse server.
//!
//! The [`JobPoller`] ticks the [`JobEngine`], which picks up due jobs, runs
//! each one under a per-job lease and applies the lifecycle transition.
//! [`JobService`] is the owner-scoped surface for creating and managing jobs.

pub mod engine;
pub mod error;
pub mod executor;
pub mod executors;
pub mod lock;
pub mod memory;
pub mod poller;
pub mod registry;
pub mod service;
pub mod stores;

pub use engine::{apply_result, EngineConfig, JobEngine, JobOutcome, TickReport, Transition};
pub use error::{JobError, Result};
pub use executor::{parse_payload, JobExecutor};
pub use lock::{with_lock, InMemoryLockService, Locked};
pub use memory::{InMemoryDeadLetterStore, InMemoryHistoryStore, InMemoryJobStore};
pub use poller::JobPoller;
pub use registry::ExecutorRegistry;
pub use service::{CreateJobRequest, JobSchedule, JobService, DEFAULT_MAX_RETRIES};
pub use stores::Stores;
