// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring for the Pulse server binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pulse_jobs_core::{JobsCoreError, ScheduleTimezone};
use pulse_server_config::{JobsConfig, ServerConfig, SmtpConfig};
use pulse_server_db::{create_pool, run_migrations, DbError, SqliteLockService};
use pulse_server_jobs::executors::{
	DataCleanupExecutor, EmailExecutor, HttpCallExecutor, LogExecutor, Mailer, ReportExecutor,
	ScriptExecutor,
};
use pulse_server_jobs::{EngineConfig, ExecutorRegistry, JobEngine, JobPoller, JobService, Stores};
use pulse_server_smtp::{SmtpClient, SmtpError};
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("database error: {0}")]
	Db(#[from] DbError),

	#[error("invalid jobs configuration: {0}")]
	Jobs(#[from] JobsCoreError),

	#[error("email service setup failed: {0}")]
	Smtp(#[from] SmtpError),

	#[error("http client setup failed: {0}")]
	Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

pub fn schedule_timezone(config: &JobsConfig) -> Result<ScheduleTimezone> {
	match config.timezone.as_deref() {
		Some(zone) => Ok(zone.parse()?),
		None => Ok(ScheduleTimezone::Local),
	}
}

/// `None` when SMTP is not configured; EMAIL jobs then fail as misconfigured.
pub fn mailer(config: Option<&SmtpConfig>) -> Result<Option<Arc<dyn Mailer>>> {
	let Some(config) = config else {
		return Ok(None);
	};
	let client = SmtpClient::new(pulse_server_smtp::SmtpConfig {
		host: config.host.clone(),
		port: config.port,
		username: config.username.clone(),
		password: config.password.clone(),
		from_address: config.from_address.clone(),
		from_name: config.from_name.clone(),
		use_tls: config.use_tls,
		timeout_secs: config.timeout_secs,
	})?;
	Ok(Some(Arc::new(client)))
}

/// One executor per job type.
pub fn build_registry(
	jobs: &JobsConfig,
	pool: &SqlitePool,
	mailer: Option<Arc<dyn Mailer>>,
) -> Result<ExecutorRegistry> {
	let http_client = reqwest::Client::builder().build()?;

	Ok(ExecutorRegistry::new()
		.with(Arc::new(LogExecutor))
		.with(Arc::new(EmailExecutor::new(mailer)))
		.with(Arc::new(
			HttpCallExecutor::new(http_client)
				.with_default_timeout(Duration::from_secs(jobs.http_timeout_secs)),
		))
		.with(Arc::new(ScriptExecutor::new(Duration::from_secs(
			jobs.script_timeout_secs,
		))))
		.with(Arc::new(DataCleanupExecutor::new(pool.clone())))
		.with(Arc::new(ReportExecutor::new(
			pool.clone(),
			PathBuf::from(&jobs.reports_dir),
		))))
}

pub async fn connect(config: &ServerConfig) -> Result<SqlitePool> {
	let pool = create_pool(&config.database.url, config.database.max_connections).await?;
	run_migrations(&pool).await?;
	Ok(pool)
}

/// The assembled scheduler: engine, optional poller and the job service.
pub struct PulseServer {
	pool: SqlitePool,
	engine: Arc<JobEngine>,
	service: Arc<JobService>,
	poller: Option<JobPoller>,
}

impl PulseServer {
	pub async fn build(config: &ServerConfig) -> Result<Self> {
		let pool = connect(config).await?;
		Self::with_pool(config, pool)
	}

	pub fn with_pool(config: &ServerConfig, pool: SqlitePool) -> Result<Self> {
		let timezone = schedule_timezone(&config.jobs)?;
		let registry = build_registry(&config.jobs, &pool, mailer(config.smtp.as_ref())?)?;
		info!(job_types = ?registry.job_types(), "Executors registered");

		let stores = Stores::sqlite(pool.clone());
		let engine = Arc::new(JobEngine::new(
			stores.clone(),
			Arc::new(SqliteLockService::new(pool.clone())),
			Arc::new(registry),
			EngineConfig {
				lock_ttl: Duration::from_secs(config.jobs.lock_ttl_secs),
				max_concurrency: config.jobs.max_concurrency,
				timezone,
			},
		));
		let service = Arc::new(JobService::new(stores, timezone));
		let poller = config.jobs.poller_enabled.then(|| {
			JobPoller::new(
				engine.clone(),
				Duration::from_secs(config.jobs.poll_interval_secs),
			)
		});

		Ok(Self {
			pool,
			engine,
			service,
			poller,
		})
	}

	pub fn engine(&self) -> &Arc<JobEngine> {
		&self.engine
	}

	pub fn service(&self) -> &Arc<JobService> {
		&self.service
	}

	pub fn poller(&self) -> Option<&JobPoller> {
		self.poller.as_ref()
	}

	pub async fn start(&self) {
		match &self.poller {
			Some(poller) => poller.start().await,
			None => info!("Job poller disabled"),
		}
	}

	/// Stop polling, wait for the in-flight tick, then close the pool.
	pub async fn shutdown(&self) {
		if let Some(poller) = &self.poller {
			poller.shutdown().await;
		}
		self.pool.close().await;
		info!("Pulse server stopped");
	}
}
