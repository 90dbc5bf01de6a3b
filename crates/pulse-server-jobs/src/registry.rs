// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use pulse_jobs_core::{Job, JobFailure, JobType};
use tracing::warn;

use crate::executor::JobExecutor;

/// Job type to executor table, built once at startup.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
	executors: HashMap<JobType, Arc<dyn JobExecutor>>,
}

impl ExecutorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an executor under the type it declares. A later registration
	/// for the same type replaces the earlier one.
	pub fn register(&mut self, executor: Arc<dyn JobExecutor>) {
		let job_type = executor.job_type();
		if self.executors.insert(job_type, executor).is_some() {
			warn!(job_type = %job_type, "Replaced previously registered executor");
		}
	}

	pub fn with(mut self, executor: Arc<dyn JobExecutor>) -> Self {
		self.register(executor);
		self
	}

	pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobExecutor>> {
		self.executors.get(&job_type).cloned()
	}

	pub fn job_types(&self) -> Vec<JobType> {
		let mut types: Vec<_> = self.executors.keys().copied().collect();
		types.sort_by_key(|t| t.as_str());
		types
	}

	/// Resolve the executor for `job`, or the config failure recorded when none exists.
	pub fn resolve(&self, job: &Job) -> Result<Arc<dyn JobExecutor>, JobFailure> {
		self.get(job.job_type).ok_or_else(|| {
			JobFailure::invalid_config(format!(
				"no executor registered for job type {}",
				job.job_type
			))
		})
	}
}
