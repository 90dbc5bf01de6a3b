// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron calculator: expression validation, next run computation and
//! generation of expressions for simple recurrence presets.

use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{JobsCoreError, Result};

/// Zone in which cron fields are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleTimezone {
	/// The system default zone.
	#[default]
	Local,
	/// An IANA zone such as `Europe/Berlin`.
	Named(Tz),
}

impl FromStr for ScheduleTimezone {
	type Err = JobsCoreError;

	fn from_str(s: &str) -> Result<Self> {
		let s = s.trim();
		if s.is_empty() || s.eq_ignore_ascii_case("local") {
			return Ok(ScheduleTimezone::Local);
		}
		s.parse::<Tz>()
			.map(ScheduleTimezone::Named)
			.map_err(|_| JobsCoreError::InvalidTimezone(s.to_string()))
	}
}

impl fmt::Display for ScheduleTimezone {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ScheduleTimezone::Local => f.write_str("local"),
			ScheduleTimezone::Named(tz) => write!(f, "{}", tz.name()),
		}
	}
}

/// Recurrence presets for interval-based schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
	Minutes,
	Hours,
	Days,
	Weeks,
	Months,
}

impl FromStr for Frequency {
	type Err = JobsCoreError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_uppercase().as_str() {
			"MINUTES" => Ok(Frequency::Minutes),
			"HOURS" => Ok(Frequency::Hours),
			"DAYS" => Ok(Frequency::Days),
			"WEEKS" => Ok(Frequency::Weeks),
			"MONTHS" => Ok(Frequency::Months),
			_ => Err(JobsCoreError::InvalidSchedule(format!(
				"unsupported frequency: {s}"
			))),
		}
	}
}

/// Standard 5-field Unix expressions get a leading `0` seconds field; the
/// `cron` crate wants seconds first.
fn to_cron_crate_format(expression: &str) -> String {
	let expression = expression.trim();
	if expression.split_whitespace().count() == 5 {
		format!("0 {expression}")
	} else {
		expression.to_string()
	}
}

fn parse_schedule(expression: &str) -> Result<Schedule> {
	if expression.trim().is_empty() {
		return Err(JobsCoreError::InvalidCronExpression {
			expression: expression.to_string(),
			reason: "expression cannot be empty".to_string(),
		});
	}

	Schedule::from_str(&to_cron_crate_format(expression)).map_err(|e| {
		JobsCoreError::InvalidCronExpression {
			expression: expression.to_string(),
			reason: e.to_string(),
		}
	})
}

/// Validate a cron expression without computing a run time.
pub fn validate_cron_expression(expression: &str) -> Result<()> {
	parse_schedule(expression).map(|_| ())
}

/// Next instant strictly after `from` matched by `expression`, evaluated in `timezone`.
pub fn next_run_time(
	expression: &str,
	from: DateTime<Utc>,
	timezone: &ScheduleTimezone,
) -> Result<DateTime<Utc>> {
	let schedule = parse_schedule(expression)?;

	let next = match timezone {
		ScheduleTimezone::Local => next_in_zone(&schedule, &Local, from),
		ScheduleTimezone::Named(tz) => next_in_zone(&schedule, tz, from),
	};

	next.ok_or_else(|| JobsCoreError::NoUpcomingRun(expression.to_string()))
}

fn next_in_zone<Z: TimeZone>(schedule: &Schedule, zone: &Z, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
	let local_from = from.with_timezone(zone);
	schedule
		.after(&local_from)
		.next()
		.map(|next| next.with_timezone(&Utc))
}

/// Derive a cron expression for a recurrence preset.
///
/// `interval` applies to minutes, hours and days. Weekly schedules fire on
/// Mondays at midnight and monthly schedules on the 1st at midnight.
pub fn generate_cron_expression(frequency: Frequency, interval: i64) -> Result<String> {
	if interval <= 0 {
		return Err(JobsCoreError::InvalidSchedule(format!(
			"interval must be a positive integer, got {interval}"
		)));
	}

	let expression = match frequency {
		Frequency::Minutes => format!("0 */{interval} * * * *"),
		Frequency::Hours => format!("0 0 */{interval} * * *"),
		Frequency::Days => format!("0 0 0 */{interval} * *"),
		Frequency::Weeks => "0 0 0 * * Mon".to_string(),
		Frequency::Months => "0 0 0 1 * *".to_string(),
	};

	validate_cron_expression(&expression)?;
	Ok(expression)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Datelike, Duration, Timelike, Weekday};
	use proptest::prelude::*;

	fn utc() -> ScheduleTimezone {
		ScheduleTimezone::Named(chrono_tz::UTC)
	}

	#[test]
	fn test_every_five_minutes_hits_next_boundary() {
		let from = Utc.with_ymd_and_hms(2026, 1, 19, 10, 32, 17).unwrap();
		let next = next_run_time("0 */5 * * * *", from, &utc()).unwrap();
		assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 19, 10, 35, 0).unwrap());
	}

	#[test]
	fn test_next_run_is_strictly_after_boundary_instant() {
		let from = Utc.with_ymd_and_hms(2026, 1, 19, 10, 35, 0).unwrap();
		let next = next_run_time("0 */5 * * * *", from, &utc()).unwrap();
		assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 19, 10, 40, 0).unwrap());
	}

	#[test]
	fn test_five_field_expression_is_accepted() {
		let from = Utc.with_ymd_and_hms(2026, 1, 19, 10, 30, 0).unwrap();
		let next = next_run_time("0 0 * * *", from, &utc()).unwrap();
		assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap());
	}

	#[test]
	fn test_named_timezone_shifts_result() {
		let from = Utc.with_ymd_and_hms(2026, 1, 19, 20, 0, 0).unwrap();
		let tz: ScheduleTimezone = "Australia/Sydney".parse().unwrap();
		let next = next_run_time("0 0 9 * * *", from, &tz).unwrap();
		// 09:00 AEDT (UTC+11) on Jan 20
		assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 19, 22, 0, 0).unwrap());
	}

	#[test]
	fn test_local_timezone_produces_future_instant() {
		let from = Utc::now();
		let next = next_run_time("0 * * * * *", from, &ScheduleTimezone::Local).unwrap();
		assert!(next > from);
		assert!(next - from <= Duration::minutes(1));
	}

	#[test]
	fn test_invalid_expressions_are_rejected() {
		assert!(validate_cron_expression("").is_err());
		assert!(validate_cron_expression("   ").is_err());
		assert!(validate_cron_expression("not a cron").is_err());
		assert!(validate_cron_expression("0 60 * * * *").is_err());
		assert!(validate_cron_expression("* * * *").is_err());
	}

	#[test]
	fn test_invalid_expression_error_is_descriptive() {
		let err = next_run_time("bogus", Utc::now(), &utc()).unwrap_err();
		assert!(err.to_string().contains("bogus"));
	}

	#[test]
	fn test_generate_presets() {
		assert_eq!(generate_cron_expression(Frequency::Minutes, 15).unwrap(), "0 */15 * * * *");
		assert_eq!(generate_cron_expression(Frequency::Hours, 2).unwrap(), "0 0 */2 * * *");
		assert_eq!(generate_cron_expression(Frequency::Days, 3).unwrap(), "0 0 0 */3 * *");
		assert_eq!(generate_cron_expression(Frequency::Weeks, 1).unwrap(), "0 0 0 * * Mon");
		assert_eq!(generate_cron_expression(Frequency::Months, 1).unwrap(), "0 0 0 1 * *");
	}

	#[test]
	fn test_generate_rejects_non_positive_interval() {
		assert!(generate_cron_expression(Frequency::Minutes, 0).is_err());
		assert!(generate_cron_expression(Frequency::Days, -4).is_err());
	}

	#[test]
	fn test_weekly_preset_lands_on_monday_midnight() {
		let expr = generate_cron_expression(Frequency::Weeks, 1).unwrap();
		// 2026-01-21 is a Wednesday
		let from = Utc.with_ymd_and_hms(2026, 1, 21, 8, 0, 0).unwrap();
		let next = next_run_time(&expr, from, &utc()).unwrap();
		assert_eq!(next.weekday(), Weekday::Mon);
		assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
		assert_eq!(next.day(), 26);
	}

	#[test]
	fn test_frequency_parse() {
		assert_eq!("minutes".parse::<Frequency>().unwrap(), Frequency::Minutes);
		assert_eq!("MONTHS".parse::<Frequency>().unwrap(), Frequency::Months);
		assert!("fortnights".parse::<Frequency>().is_err());
	}

	#[test]
	fn test_timezone_parse() {
		assert_eq!("".parse::<ScheduleTimezone>().unwrap(), ScheduleTimezone::Local);
		assert_eq!("local".parse::<ScheduleTimezone>().unwrap(), ScheduleTimezone::Local);
		assert!("Not/AZone".parse::<ScheduleTimezone>().is_err());
	}

	proptest! {
		/// Minute presets always fire strictly later, on a second-zero boundary
		/// whose minute is a multiple of the interval.
		#[test]
		fn prop_minute_preset_next_run(interval in 1i64..=30, offset_secs in 0i64..86_400) {
			let expr = generate_cron_expression(Frequency::Minutes, interval).unwrap();
			let from = Utc.with_ymd_and_hms(2026, 5, 4, 0, 0, 0).unwrap() + Duration::seconds(offset_secs);
			let next = next_run_time(&expr, from, &utc()).unwrap();
			prop_assert!(next > from);
			prop_assert_eq!(next.second(), 0);
			prop_assert_eq!(i64::from(next.minute()) % interval, 0);
		}
	}
}
