// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pulse_jobs_core::{Clock, Job, JobFailure, JobType, SystemClock};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::executor::{parse_payload, require, JobExecutor};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportPayload {
	report_type: Option<String>,
	output_format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
	JobExecutionStats,
	OwnerActivity,
	SystemHealth,
}

impl ReportKind {
	fn parse(s: &str) -> Result<Self, JobFailure> {
		match s.to_ascii_lowercase().as_str() {
			"job_execution_stats" => Ok(ReportKind::JobExecutionStats),
			"owner_activity" => Ok(ReportKind::OwnerActivity),
			"system_health" => Ok(ReportKind::SystemHealth),
			_ => Err(JobFailure::invalid_config(format!("unknown report type: {s}"))),
		}
	}

	fn as_str(&self) -> &'static str {
		match self {
			ReportKind::JobExecutionStats => "job_execution_stats",
			ReportKind::OwnerActivity => "owner_activity",
			ReportKind::SystemHealth => "system_health",
		}
	}

	fn columns(&self) -> [&'static str; 2] {
		match self {
			ReportKind::JobExecutionStats => ["status", "count"],
			ReportKind::OwnerActivity => ["owner_id", "job_count"],
			ReportKind::SystemHealth => ["metric", "value"],
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
	Csv,
	Json,
}

impl OutputFormat {
	fn parse(s: &str) -> Result<Self, JobFailure> {
		match s.to_ascii_uppercase().as_str() {
			"CSV" => Ok(OutputFormat::Csv),
			"JSON" => Ok(OutputFormat::Json),
			_ => Err(JobFailure::invalid_config(format!(
				"unsupported output format: {s}"
			))),
		}
	}

	fn extension(&self) -> &'static str {
		match self {
			OutputFormat::Csv => "csv",
			OutputFormat::Json => "json",
		}
	}
}

/// Two-column tabular result.
#[derive(Debug, Clone, PartialEq)]
struct Report {
	kind: ReportKind,
	generated_at: DateTime<Utc>,
	rows: Vec<(String, String)>,
}

fn csv_field(value: &str) -> String {
	if value.contains([',', '"', '\n', '\r']) {
		format!("\"{}\"", value.replace('"', "\"\""))
	} else {
		value.to_string()
	}
}

impl Report {
	fn to_csv(&self) -> String {
		let [a, b] = self.kind.columns();
		let mut out = format!("{a},{b}\n");
		for (key, value) in &self.rows {
			out.push_str(&csv_field(key));
			out.push(',');
			out.push_str(&csv_field(value));
			out.push('\n');
		}
		out
	}

	fn to_json(&self) -> Result<String, serde_json::Error> {
		let [a, b] = self.kind.columns();
		let rows: Vec<serde_json::Value> = self
			.rows
			.iter()
			.map(|(key, value)| {
				let mut row = serde_json::Map::new();
				row.insert(a.to_string(), key.clone().into());
				row.insert(b.to_string(), value.clone().into());
				serde_json::Value::Object(row)
			})
			.collect();
		serde_json::to_string_pretty(&serde_json::json!({
			"reportType": self.kind.as_str(),
			"generatedAt": self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
			"rows": rows,
		}))
	}

	fn file_name(&self, format: OutputFormat) -> String {
		format!(
			"report_{}_{}.{}",
			self.kind.as_str(),
			self.generated_at.format("%Y%m%d_%H%M%S"),
			format.extension()
		)
	}
}

/// Summarises the job tables and writes the result into `reports_dir`.
pub struct ReportExecutor {
	pool: SqlitePool,
	reports_dir: PathBuf,
	clock: Arc<dyn Clock>,
}

impl ReportExecutor {
	pub fn new(pool: SqlitePool, reports_dir: impl Into<PathBuf>) -> Self {
		Self {
			pool,
			reports_dir: reports_dir.into(),
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn reports_dir(&self) -> &Path {
		&self.reports_dir
	}

	async fn counts(&self, sql: &str) -> Result<Vec<(String, String)>, sqlx::Error> {
		let rows: Vec<(String, i64)> = sqlx::query_as(sql).fetch_all(&self.pool).await?;
		Ok(rows
			.into_iter()
			.map(|(key, count)| (key, count.to_string()))
			.collect())
	}

	async fn build(&self, kind: ReportKind) -> Result<Report, sqlx::Error> {
		let generated_at = self.clock.now();
		let rows = match kind {
			ReportKind::JobExecutionStats => {
				self.counts("SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status")
					.await?
			}
			ReportKind::OwnerActivity => {
				self.counts(
					"SELECT owner_id, COUNT(*) FROM jobs GROUP BY owner_id ORDER BY COUNT(*) DESC, owner_id",
				)
				.await?
			}
			ReportKind::SystemHealth => {
				let mut rows: Vec<(String, String)> = self
					.counts("SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status")
					.await?
					.into_iter()
					.map(|(status, count)| (format!("jobs_{}", status.to_ascii_lowercase()), count))
					.collect();
				let dead_letters: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letter_jobs")
					.fetch_one(&self.pool)
					.await?;
				rows.push(("dead_letter_count".to_string(), dead_letters.to_string()));
				rows.push((
					"generated_at".to_string(),
					generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
				));
				rows
			}
		};
		Ok(Report {
			kind,
			generated_at,
			rows,
		})
	}
}

#[async_trait]
impl JobExecutor for ReportExecutor {
	fn job_type(&self) -> JobType {
		JobType::ReportGeneration
	}

	#[instrument(skip(self, job), fields(job_id = %job.id))]
	async fn execute(&self, job: &Job) -> Result<(), JobFailure> {
		let payload: ReportPayload = parse_payload(job)?;
		let kind = ReportKind::parse(require(payload.report_type.as_deref(), "reportType")?)?;
		let format = OutputFormat::parse(payload.output_format.as_deref().unwrap_or("CSV"))?;

		let report = self
			.build(kind)
			.await
			.map_err(|e| JobFailure::unknown(format!("report query failed: {e}")))?;
		let contents = match format {
			OutputFormat::Csv => report.to_csv(),
			OutputFormat::Json => report
				.to_json()
				.map_err(|e| JobFailure::unknown(format!("cannot encode report: {e}")))?,
		};

		let path = self.reports_dir.join(report.file_name(format));
		tokio::fs::create_dir_all(&self.reports_dir)
			.await
			.map_err(|e| JobFailure::unknown(format!("cannot create reports directory: {e}")))?;
		tokio::fs::write(&path, contents)
			.await
			.map_err(|e| JobFailure::unknown(format!("cannot write report: {e}")))?;

		info!(report_type = kind.as_str(), path = %path.display(), "Report generated");
		Ok(())
	}
}
