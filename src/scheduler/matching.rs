// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cron expression parsing and per-minute matching.
//!
//! Accepts standard 5-field Unix expressions (minute, hour, day-of-month,
//! month, day-of-week) and 6-field expressions with a leading seconds field.
//! 5-field expressions get a `0` seconds field prepended for the `cron` crate,
//! and their numeric day-of-week (0-7, Sunday = 0 or 7) is rewritten as day
//! names, because the `cron` crate numbers days 1-7 starting from Sunday.
//! 6-field expressions are passed through in the `cron` crate's own dialect.

use chrono::{DateTime, Duration, Timelike, Utc};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn normalize_cron_expr(cron_expr: &str) -> String {
    let fields: Vec<&str> = cron_expr.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, day_of_month, month, day_of_week] => {
            let day_of_week =
                unix_day_of_week(day_of_week).unwrap_or_else(|| day_of_week.to_string());
            format!("0 {minute} {hour} {day_of_month} {month} {day_of_week}")
        }
        _ => fields.join(" "),
    }
}

/// Expand a numeric Unix day-of-week field into a list of day names.
///
/// Returns `None` for anything that is not purely numeric (names, `L`, `#`)
/// so the `cron` crate can accept or reject it as written.
fn unix_day_of_week(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, step.parse::<usize>().ok().filter(|s| *s > 0)?),
            None => (item, 1),
        };
        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((start, end)) => (unix_day(start)?, unix_day(end)?),
            // `n/step` runs from n to the end of the week
            None if step > 1 => (unix_day(range)?, 6),
            None => {
                let day = unix_day(range)?;
                (day, day)
            }
        };
        if start > end {
            return None;
        }
        days.extend((start..=end).step_by(step).map(|day| day % 7));
    }

    let names: Vec<&str> = days.into_iter().map(|day| WEEKDAYS[day]).collect();
    Some(names.join(","))
}

fn unix_day(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|day| *day <= 7)
}

pub fn parse_cron(cron_expr: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize_cron_expr(cron_expr))
}

/// Truncate to the start of the minute.
pub fn floor_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// True when the schedule fires at any second within the minute containing `at`.
pub fn matches_minute(schedule: &Schedule, at: DateTime<Utc>) -> bool {
    let start = floor_to_minute(at);
    let end = start + Duration::minutes(1);
    schedule
        .after(&(start - Duration::seconds(1)))
        .next()
        .map(|next| next < end)
        .unwrap_or(false)
}
