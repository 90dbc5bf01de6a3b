// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use pulse_jobs_core::{Job, JobFailure, JobType};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::executor::{parse_payload, require, JobExecutor};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpPayload {
	url: Option<String>,
	method: Option<String>,
	#[serde(default)]
	headers: HashMap<String, String>,
	/// Strings are sent as-is, anything else as JSON.
	body: Option<Value>,
	timeout_seconds: Option<u64>,
}

/// Calls an HTTP endpoint and classifies the response status.
pub struct HttpCallExecutor {
	client: Client,
	default_timeout: Duration,
}

impl HttpCallExecutor {
	pub fn new(client: Client) -> Self {
		Self {
			client,
			default_timeout: DEFAULT_TIMEOUT,
		}
	}

	pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
		self.default_timeout = timeout;
		self
	}
}

impl Default for HttpCallExecutor {
	fn default() -> Self {
		Self::new(Client::new())
	}
}

/// Map a non-success response status to a failure. `None` for 2xx.
pub fn classify_status(status: StatusCode) -> Option<JobFailure> {
	let code = status.as_u16();
	let text = status.canonical_reason().unwrap_or("");
	if status.is_success() {
		None
	} else if status.is_server_error() {
		Some(JobFailure::remote_5xx(format!(
			"remote server error (HTTP {code}): {text}"
		)))
	} else if status == StatusCode::TOO_MANY_REQUESTS {
		Some(JobFailure::rate_limited("rate limited by remote server (HTTP 429)"))
	} else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
		Some(JobFailure::auth(format!(
			"authentication/authorization failed (HTTP {code})"
		)))
	} else if status.is_client_error() {
		Some(JobFailure::bad_request(format!("bad request (HTTP {code}): {text}")))
	} else {
		Some(JobFailure::unknown(format!("unexpected response status (HTTP {code})")))
	}
}

fn classify_transport_error(e: &reqwest::Error) -> JobFailure {
	if e.is_builder() {
		JobFailure::invalid_config(format!("cannot build request: {e}"))
	} else if e.is_timeout() {
		JobFailure::timeout(format!("request timed out: {e}"))
	} else if e.is_connect() || e.is_request() {
		JobFailure::network(format!("network error: {e}"))
	} else {
		JobFailure::unknown(format!("unexpected error: {e}"))
	}
}

#[async_trait]
impl JobExecutor for HttpCallExecutor {
	fn job_type(&self) -> JobType {
		JobType::HttpCall
	}

	#[instrument(skip(self, job), fields(job_id = %job.id))]
	async fn execute(&self, job: &Job) -> Result<(), JobFailure> {
		let payload: HttpPayload = parse_payload(job)?;

		let url = require(payload.url.as_deref(), "url")?;
		let url = Url::parse(url)
			.map_err(|e| JobFailure::invalid_config(format!("invalid URL '{url}': {e}")))?;
		let method = require(payload.method.as_deref(), "method")?;
		let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
			.map_err(|_| JobFailure::invalid_config(format!("invalid HTTP method: {method}")))?;
		let timeout = payload
			.timeout_seconds
			.map(Duration::from_secs)
			.unwrap_or(self.default_timeout);

		let mut request = self.client.request(method.clone(), url.clone()).timeout(timeout);
		for (name, value) in &payload.headers {
			request = request.header(name.as_str(), value.as_str());
		}
		request = match payload.body {
			Some(Value::String(text)) => request.body(text),
			Some(Value::Null) | None => request,
			Some(other) => request.json(&other),
		};

		let response = request.send().await.map_err(|e| {
			warn!(error = %e, "HTTP request failed");
			classify_transport_error(&e)
		})?;

		let status = response.status();
		if let Some(failure) = classify_status(status) {
			warn!(status = status.as_u16(), "HTTP call returned an error status");
			return Err(failure);
		}

		info!(%method, %url, status = status.as_u16(), "HTTP call succeeded");
		Ok(())
	}
}
