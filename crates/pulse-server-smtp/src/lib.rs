// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SMTP email client for Pulse.
//!
//! A thin async wrapper over [`lettre`] used by the email job executor. Send
//! failures are classified so the caller can tell authentication problems,
//! timeouts, transient server errors and permanent rejections apart.
//!
//! # Example
//!
//! ```no_run
//! use pulse_server_smtp::{SecretString, SmtpClient, SmtpConfig};
//!
//! # async fn example() -> Result<(), pulse_server_smtp::SmtpError> {
//! let config = SmtpConfig {
//!     host: "smtp.example.com".to_string(),
//!     port: 587,
//!     username: Some("user@example.com".to_string()),
//!     password: Some(SecretString::new("password".to_string())),
//!     from_address: "noreply@example.com".to_string(),
//!     from_name: "Pulse".to_string(),
//!     use_tls: true,
//!     timeout_secs: 30,
//! };
//!
//! let client = SmtpClient::new(config)?;
//! client
//!     .send_email("recipient@example.com", "Hello", "Hello World", None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use lettre::{
	message::{header::ContentType, Mailbox, MultiPart, SinglePart},
	transport::smtp::authentication::Credentials,
	AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use pulse_common_secret::SecretString;

/// Errors that can occur during SMTP operations.
#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
	/// Failed to reach or talk to the SMTP server.
	#[error("connection failed: {0}")]
	Connection(String),

	/// The server rejected the credentials.
	#[error("authentication failed: {0}")]
	Auth(String),

	/// The server did not answer in time.
	#[error("timed out: {0}")]
	Timeout(String),

	/// 4xx reply; the same message may succeed later.
	#[error("transient failure: {0}")]
	Transient(String),

	/// 5xx reply other than an authentication failure.
	#[error("rejected: {0}")]
	Permanent(String),

	/// The message could not be built.
	#[error("send failed: {0}")]
	Send(String),

	/// Invalid configuration (missing required fields, invalid values).
	#[error("invalid configuration: {0}")]
	Config(String),

	/// Invalid email address format.
	#[error("invalid email address: {0}")]
	Address(String),
}

/// Configuration for the SMTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
	/// SMTP server hostname (e.g., "smtp.gmail.com").
	pub host: String,

	/// SMTP server port. Common values: 25 (unencrypted), 465 (TLS), 587 (STARTTLS).
	pub port: u16,

	pub username: Option<String>,

	pub password: Option<SecretString>,

	pub from_address: String,

	pub from_name: String,

	/// Whether to use STARTTLS for the connection. Defaults to `true`.
	#[serde(default = "default_use_tls")]
	pub use_tls: bool,

	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
}

fn default_use_tls() -> bool {
	true
}

fn default_timeout_secs() -> u64 {
	30
}

/// Async SMTP client for sending emails.
///
/// The connection is made lazily on the first send.
pub struct SmtpClient {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	from_mailbox: Mailbox,
}

impl SmtpClient {
	/// Create a new SMTP client from the given configuration.
	///
	/// # Errors
	///
	/// Returns [`SmtpError::Address`] if the from address is invalid.
	/// Returns [`SmtpError::Connection`] if the transport cannot be built.
	#[tracing::instrument(
		name = "smtp_client_new",
		skip(config),
		fields(host = %config.host, port = %config.port, use_tls = %config.use_tls)
	)]
	pub fn new(config: SmtpConfig) -> Result<Self, SmtpError> {
		if config.host.trim().is_empty() {
			return Err(SmtpError::Config("host is required".into()));
		}

		let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
			.parse()
			.map_err(|e| SmtpError::Address(format!("{e}")))?;

		let builder = if config.use_tls {
			AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
				.map_err(|e| SmtpError::Connection(format!("{e}")))?
		} else {
			AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
		};

		let mut builder = builder
			.port(config.port)
			.timeout(Some(Duration::from_secs(config.timeout_secs)));

		if let (Some(username), Some(password)) = (config.username, config.password) {
			builder = builder.credentials(Credentials::new(username, password.expose().clone()));
		}

		let transport = builder.build();

		tracing::debug!("SMTP client initialized");

		Ok(Self {
			transport,
			from_mailbox,
		})
	}

	/// Check if the SMTP server is reachable and responding.
	#[tracing::instrument(name = "smtp_check_health", skip(self))]
	pub async fn check_health(&self) -> Result<(), SmtpError> {
		self.transport
			.test_connection()
			.await
			.map_err(|e| SmtpError::Connection(format!("{e}")))?;
		tracing::debug!("SMTP server is healthy");
		Ok(())
	}

	/// Send an email. With `body_html` the message is multipart/alternative,
	/// otherwise plain text only.
	///
	/// # Errors
	///
	/// Returns [`SmtpError::Address`] if the recipient address is invalid,
	/// otherwise the classified transport failure.
	#[tracing::instrument(
		name = "smtp_send_email",
		skip(self, body_text, body_html),
		fields(to = %to, subject = %subject)
	)]
	pub async fn send_email(
		&self,
		to: &str,
		subject: &str,
		body_text: &str,
		body_html: Option<&str>,
	) -> Result<(), SmtpError> {
		let to_mailbox: Mailbox = to.parse().map_err(|e| SmtpError::Address(format!("{e}")))?;

		let builder = Message::builder()
			.from(self.from_mailbox.clone())
			.to(to_mailbox)
			.subject(subject);

		let message = match body_html {
			Some(html) => builder.multipart(
				MultiPart::alternative()
					.singlepart(
						SinglePart::builder()
							.header(ContentType::TEXT_PLAIN)
							.body(body_text.to_string()),
					)
					.singlepart(
						SinglePart::builder()
							.header(ContentType::TEXT_HTML)
							.body(html.to_string()),
					),
			),
			None => builder
				.header(ContentType::TEXT_PLAIN)
				.body(body_text.to_string()),
		}
		.map_err(|e| SmtpError::Send(format!("failed to build message: {e}")))?;

		self.transport
			.send(message)
			.await
			.map_err(classify_transport_error)?;

		tracing::info!("email sent successfully");

		Ok(())
	}
}

/// Reply codes that mean the credentials were refused.
const AUTH_REPLY_CODES: [&str; 3] = ["530", "534", "535"];

fn classify_transport_error(e: lettre::transport::smtp::Error) -> SmtpError {
	let code = e.status().map(|c| c.to_string());
	classify(
		code.as_deref(),
		e.is_timeout(),
		e.is_transient(),
		e.is_permanent(),
		e.to_string(),
	)
}

fn classify(
	code: Option<&str>,
	timeout: bool,
	transient: bool,
	permanent: bool,
	message: String,
) -> SmtpError {
	if timeout {
		SmtpError::Timeout(message)
	} else if code.is_some_and(|c| AUTH_REPLY_CODES.contains(&c)) {
		SmtpError::Auth(message)
	} else if transient {
		SmtpError::Transient(message)
	} else if permanent {
		SmtpError::Permanent(message)
	} else {
		SmtpError::Connection(message)
	}
}

/// Whether `email` parses as a mailbox. Checks format only.
pub fn is_valid_email(email: &str) -> bool {
	email.parse::<Mailbox>().is_ok()
}
