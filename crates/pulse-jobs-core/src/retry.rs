// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry policy: which failures are retried and how long to back off.

use chrono::{DateTime, Duration, Utc};

use crate::failure::FailureReason;

/// Whether a failure with this reason may be retried.
pub fn is_retryable(reason: FailureReason) -> bool {
	match reason {
		FailureReason::NetworkError
		| FailureReason::Timeout
		| FailureReason::RateLimited
		| FailureReason::Remote5xx => true,
		FailureReason::BadRequest
		| FailureReason::AuthError
		| FailureReason::InvalidConfig
		| FailureReason::Unknown => false,
	}
}

/// Backoff before the attempt numbered `retry_count`: `2^retry_count` minutes.
///
/// Growth is not capped. Returns `None` once the delay no longer fits in a
/// [`Duration`].
pub fn backoff_delay(retry_count: u32) -> Option<Duration> {
	2i64.checked_pow(retry_count).and_then(Duration::try_minutes)
}

/// Instant at which a job that has failed `retry_count` times runs again.
///
/// Saturates at the latest representable instant instead of overflowing.
pub fn retry_at(now: DateTime<Utc>, retry_count: u32) -> DateTime<Utc> {
	backoff_delay(retry_count)
		.and_then(|delay| now.checked_add_signed(delay))
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Outcome of applying the retry policy to one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
	/// Schedule another attempt.
	Retry {
		retry_count: u32,
		next_run_time: DateTime<Utc>,
	},
	/// Stop and dead-letter the job.
	GiveUp { retry_count: u32, retryable: bool },
}

impl RetryDecision {
	/// Apply the policy to a job that has failed `retry_count` times before this attempt.
	pub fn decide(
		reason: FailureReason,
		retry_count: u32,
		max_retries: u32,
		now: DateTime<Utc>,
	) -> Self {
		let retryable = is_retryable(reason);
		let next_retry = retry_count.saturating_add(1);

		if retryable && next_retry < max_retries {
			RetryDecision::Retry {
				retry_count: next_retry,
				next_run_time: retry_at(now, next_retry),
			}
		} else {
			RetryDecision::GiveUp {
				retry_count: next_retry,
				retryable,
			}
		}
	}

	pub fn retry_count(&self) -> u32 {
		match self {
			RetryDecision::Retry { retry_count, .. } | RetryDecision::GiveUp { retry_count, .. } => {
				*retry_count
			}
		}
	}
}
