// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixed-width RFC 3339 text so that timestamp columns compare correctly as strings.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{DbError, Result};

/// Latest instant that still renders as a four-digit year.
fn latest_storable() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
		.single()
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub(crate) fn encode(ts: DateTime<Utc>) -> String {
	ts.min(latest_storable())
		.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode(column: &str, value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|ts| ts.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column} '{value}': {e}")))
}

pub(crate) fn decode_opt(column: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
	value.map(|v| decode(column, v)).transpose()
}
