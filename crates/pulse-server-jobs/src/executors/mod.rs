// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The built-in executors, one per [`pulse_jobs_core::JobType`].

pub mod data_cleanup;
pub mod email;
pub mod http;
pub mod log;
pub mod report;
pub mod script;

pub use data_cleanup::DataCleanupExecutor;
pub use email::{EmailExecutor, Mailer};
pub use http::HttpCallExecutor;
pub use log::LogExecutor;
pub use report::ReportExecutor;
pub use script::ScriptExecutor;
