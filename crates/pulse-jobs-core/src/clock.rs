// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wall-clock abstraction.
//!
//! - [`SystemClock`]: reads `Utc::now()`
//! - [`ManualClock`]: holds an instant that only moves when told to (tests only)

use chrono::{DateTime, Utc};

/// Source of the current instant for lifecycle transitions.
pub trait Clock: Send + Sync + 'static {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

#[cfg(any(test, feature = "test-support"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-support"))]
mod manual {
	use super::Clock;
	use chrono::{DateTime, Duration, Utc};
	use std::sync::{Arc, Mutex};

	/// Clock fixed at a chosen instant. Clones share the same instant.
	#[derive(Debug, Clone)]
	pub struct ManualClock {
		current: Arc<Mutex<DateTime<Utc>>>,
	}

	impl ManualClock {
		pub fn new(start: DateTime<Utc>) -> Self {
			Self {
				current: Arc::new(Mutex::new(start)),
			}
		}

		pub fn set(&self, instant: DateTime<Utc>) {
			*self.lock() = instant;
		}

		pub fn advance(&self, by: Duration) {
			let mut current = self.lock();
			*current += by;
		}

		fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
			self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
		}
	}

	impl Default for ManualClock {
		fn default() -> Self {
			Self::new(Utc::now())
		}
	}

	impl Clock for ManualClock {
		fn now(&self) -> DateTime<Utc> {
			*self.lock()
		}
	}
}
