// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use pulse_jobs_core::{Job, JobFailure, JobType};
use pulse_server_smtp::{is_valid_email, SmtpClient, SmtpError};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::executor::{parse_payload, require, JobExecutor};

/// Outbound mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
	async fn send(
		&self,
		to: &str,
		subject: &str,
		body_text: &str,
		body_html: Option<&str>,
	) -> Result<(), SmtpError>;
}

#[async_trait]
impl Mailer for SmtpClient {
	async fn send(
		&self,
		to: &str,
		subject: &str,
		body_text: &str,
		body_html: Option<&str>,
	) -> Result<(), SmtpError> {
		self.send_email(to, subject, body_text, body_html).await
	}
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
	to: Option<String>,
	subject: Option<String>,
	body: Option<String>,
	html: Option<String>,
}

/// Sends one email per run. Without a mailer every run fails as a config error.
pub struct EmailExecutor {
	mailer: Option<Arc<dyn Mailer>>,
}

impl EmailExecutor {
	pub fn new(mailer: Option<Arc<dyn Mailer>>) -> Self {
		Self { mailer }
	}
}

fn classify_smtp_error(e: SmtpError) -> JobFailure {
	let message = format!("failed to send email: {e}");
	match e {
		SmtpError::Auth(_) => JobFailure::auth(message),
		SmtpError::Timeout(_) => JobFailure::timeout(message),
		SmtpError::Transient(_) | SmtpError::Connection(_) => JobFailure::network(message),
		SmtpError::Permanent(_) | SmtpError::Address(_) | SmtpError::Send(_) => {
			JobFailure::bad_request(message)
		}
		SmtpError::Config(_) => JobFailure::invalid_config(message),
	}
}

#[async_trait]
impl JobExecutor for EmailExecutor {
	fn job_type(&self) -> JobType {
		JobType::Email
	}

	#[instrument(skip(self, job), fields(job_id = %job.id))]
	async fn execute(&self, job: &Job) -> Result<(), JobFailure> {
		let Some(mailer) = &self.mailer else {
			return Err(JobFailure::invalid_config("email service is not configured"));
		};

		let payload: EmailPayload = parse_payload(job)?;
		let to = require(payload.to.as_deref(), "to")?;
		let subject = require(payload.subject.as_deref(), "subject")?;
		let body = require(payload.body.as_deref(), "body")?;
		if !is_valid_email(to) {
			return Err(JobFailure::bad_request(format!("invalid recipient address: {to}")));
		}

		mailer
			.send(to, subject, body, payload.html.as_deref())
			.await
			.map_err(|e| {
				warn!(error = %e, "Email send failed");
				classify_smtp_error(e)
			})?;

		info!(to = %to, "Email sent");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_jobs_core::{FailureReason, OwnerId};
	use tokio::sync::Mutex;

	#[derive(Default)]
	struct RecordingMailer {
		sent: Mutex<Vec<(String, String, Option<String>)>>,
		fail_with: Option<fn() -> SmtpError>,
	}

	#[async_trait]
	impl Mailer for RecordingMailer {
		async fn send(
			&self,
			to: &str,
			subject: &str,
			_body_text: &str,
			body_html: Option<&str>,
		) -> Result<(), SmtpError> {
			if let Some(fail) = self.fail_with {
				return Err(fail());
			}
			self.sent.lock().await.push((
				to.to_string(),
				subject.to_string(),
				body_html.map(str::to_string),
			));
			Ok(())
		}
	}

	fn job(payload: serde_json::Value) -> Job {
		let mut job = pulse_server_db::testing::sample_job(OwnerId::new(), None);
		job.job_type = JobType::Email;
		job.payload = payload.to_string();
		job
	}

	fn welcome() -> Job {
		job(serde_json::json!({
			"to": "ada@example.com",
			"subject": "Welcome",
			"body": "Hello",
			"html": "<p>Hello</p>",
		}))
	}

	#[tokio::test]
	async fn test_sends_through_mailer() {
		let mailer = Arc::new(RecordingMailer::default());
		let executor = EmailExecutor::new(Some(mailer.clone()));

		executor.execute(&welcome()).await.unwrap();

		let sent = mailer.sent.lock().await;
		assert_eq!(
			sent.as_slice(),
			&[(
				"ada@example.com".to_string(),
				"Welcome".to_string(),
				Some("<p>Hello</p>".to_string())
			)]
		);
	}

	#[tokio::test]
	async fn test_unconfigured_is_invalid_config() {
		let err = EmailExecutor::new(None).execute(&welcome()).await.unwrap_err();
		assert_eq!(err.reason, FailureReason::InvalidConfig);
	}

	#[tokio::test]
	async fn test_payload_validation() {
		let executor = EmailExecutor::new(Some(Arc::new(RecordingMailer::default())));

		let missing = executor
			.execute(&job(serde_json::json!({"to": "ada@example.com", "body": "x"})))
			.await
			.unwrap_err();
		assert_eq!(missing.reason, FailureReason::InvalidConfig);

		let bad_address = executor
			.execute(&job(serde_json::json!({"to": "not-an-address", "subject": "s", "body": "b"})))
			.await
			.unwrap_err();
		assert_eq!(bad_address.reason, FailureReason::BadRequest);
	}

	#[tokio::test]
	async fn test_smtp_errors_are_classified() {
		let cases: [(fn() -> SmtpError, FailureReason); 5] = [
			(|| SmtpError::Auth("535".into()), FailureReason::AuthError),
			(|| SmtpError::Timeout("read".into()), FailureReason::Timeout),
			(|| SmtpError::Transient("451".into()), FailureReason::NetworkError),
			(|| SmtpError::Connection("refused".into()), FailureReason::NetworkError),
			(|| SmtpError::Permanent("550".into()), FailureReason::BadRequest),
		];

		for (fail, expected) in cases {
			let mailer = RecordingMailer {
				fail_with: Some(fail),
				..Default::default()
			};
			let executor = EmailExecutor::new(Some(Arc::new(mailer)));
			let err = executor.execute(&welcome()).await.unwrap_err();
			assert_eq!(err.reason, expected);
		}
	}
}
