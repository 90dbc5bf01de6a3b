// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job types for the scheduling engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::JobsCoreError;

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	/// Key under which the execution lease for this job is held.
	pub fn lock_key(&self) -> String {
		format!("job-lock:{}", self.0)
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Owner of a job. Opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for OwnerId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for OwnerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for OwnerId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Tag selecting the executor that runs a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
	Email,
	HttpCall,
	Script,
	DataCleanup,
	ReportGeneration,
	Log,
}

impl JobType {
	pub const ALL: [JobType; 6] = [
		JobType::Email,
		JobType::HttpCall,
		JobType::Script,
		JobType::DataCleanup,
		JobType::ReportGeneration,
		JobType::Log,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			JobType::Email => "EMAIL",
			JobType::HttpCall => "HTTP_CALL",
			JobType::Script => "SCRIPT",
			JobType::DataCleanup => "DATA_CLEANUP",
			JobType::ReportGeneration => "REPORT_GENERATION",
			JobType::Log => "LOG",
		}
	}
}

impl fmt::Display for JobType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for JobType {
	type Err = JobsCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		JobType::ALL
			.into_iter()
			.find(|t| t.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| JobsCoreError::UnknownJobType(s.to_string()))
	}
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
	Pending,
	Running,
	Success,
	Retrying,
	Failed,
	Paused,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Pending => "PENDING",
			JobStatus::Running => "RUNNING",
			JobStatus::Success => "SUCCESS",
			JobStatus::Retrying => "RETRYING",
			JobStatus::Failed => "FAILED",
			JobStatus::Paused => "PAUSED",
		}
	}

	/// Whether the poller may pick up a job in this state.
	pub fn is_runnable(&self) -> bool {
		matches!(self, JobStatus::Pending | JobStatus::Retrying)
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for JobStatus {
	type Err = JobsCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"PENDING" => Ok(JobStatus::Pending),
			"RUNNING" => Ok(JobStatus::Running),
			"SUCCESS" => Ok(JobStatus::Success),
			"RETRYING" => Ok(JobStatus::Retrying),
			"FAILED" => Ok(JobStatus::Failed),
			"PAUSED" => Ok(JobStatus::Paused),
			_ => Err(JobsCoreError::UnknownJobStatus(s.to_string())),
		}
	}
}

/// A unit of schedulable work.
///
/// `status`, `retry_count`, `next_run_time` and `last_error` are owned by the
/// engine while a job is in its due cycle. Callers only create, pause,
/// resume, delete or replay jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
	pub id: JobId,
	pub owner_id: OwnerId,
	pub name: String,
	pub job_type: JobType,
	/// Executor-specific parameters. Never interpreted by the engine.
	pub payload: String,

	pub recurring: bool,
	pub cron_expression: Option<String>,
	/// Null only for terminated one-time jobs, failed jobs and paused jobs.
	pub next_run_time: Option<DateTime<Utc>>,

	pub status: JobStatus,
	pub retry_count: u32,
	pub max_retries: u32,
	pub last_error: Option<String>,

	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Job {
	/// A job is due when it is runnable and its next run time has arrived.
	pub fn is_due(&self, now: DateTime<Utc>) -> bool {
		self.status.is_runnable() && self.next_run_time.is_some_and(|t| t <= now)
	}
}
