// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pulse job scheduler binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulse_server::PulseServer;
use pulse_server_config::{LogFormat, LoggingConfig, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Pulse server - background job scheduler.
#[derive(Parser, Debug)]
#[command(name = "pulse-server", about = "Pulse job scheduler server", version)]
struct Args {
	/// Config file to read instead of /etc/pulse/server.toml
	#[arg(long, short, value_name = "PATH", env = "PULSE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
	/// Run the scheduler until interrupted (default)
	#[default]
	Run,
	/// Apply database migrations and exit
	Migrate,
	/// Show version and build information
	Version,
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
	let server = PulseServer::build(&config).await?;
	server.start().await;

	tracing::info!(
		poller_enabled = config.jobs.poller_enabled,
		poll_interval_secs = config.jobs.poll_interval_secs,
		max_concurrency = config.jobs.max_concurrency,
		"Pulse server started"
	);

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");
	server.shutdown().await;

	tracing::info!("Server shutdown complete");
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();
	let command = args.command.unwrap_or_default();

	if let Command::Version = command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => pulse_server_config::load_config_with_file(path)?,
		None => pulse_server_config::load_config()?,
	};

	init_tracing(&config.logging);

	tracing::info!(
		database = %config.database.url,
		smtp_configured = config.smtp.is_some(),
		"Configuration loaded"
	);

	match command {
		Command::Migrate => {
			let pool = pulse_server::connect(&config).await?;
			pool.close().await;
			tracing::info!("Migrations applied");
			Ok(())
		}
		Command::Run => run(config).await,
		Command::Version => Ok(()),
	}
}
