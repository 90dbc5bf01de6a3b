// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::engine::JobEngine;

/// Drives [`JobEngine::run_tick`] on a fixed interval until shut down.
///
/// Several pollers may share one database; the per-job lease keeps them
/// from running the same job twice.
pub struct JobPoller {
	engine: Arc<JobEngine>,
	interval: Duration,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobPoller {
	pub fn new(engine: Arc<JobEngine>, interval: Duration) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			engine,
			interval,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Spawn the ticker. The first tick fires immediately.
	#[instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;
		if !handles.is_empty() {
			warn!("Job poller already running");
			return;
		}

		let engine = Arc::clone(&self.engine);
		let mut shutdown_rx = self.shutdown_tx.subscribe();
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		let handle = tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						if let Err(e) = engine.run_tick().await {
							error!(error = %e, "Failed to query due jobs");
						}
					}
					_ = shutdown_rx.recv() => {
						info!("Shutting down job poller");
						break;
					}
				}
			}
		});

		handles.push(handle);
		info!("Job poller started");
	}

	/// Stop ticking and wait for an in-flight tick to finish.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job poller shut down");
	}

	pub async fn is_running(&self) -> bool {
		self.handles
			.lock()
			.await
			.iter()
			.any(|handle| !handle.is_finished())
	}
}
