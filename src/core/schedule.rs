//! Schedule expressions: rendering, validation, and description.
//!
//! Cron expressions use the six-field AWS form
//! `cron(minute hour day-of-month month day-of-week year)`. EventBridge
//! evaluates them in UTC; descriptions say so.

use super::error::{MusabiError, Result};
use super::types::{CronOptions, RateUnit, Schedule};

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEK_DAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Minute,
    Hour,
    Day,
    Month,
    WeekDay,
    Year,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
            Self::WeekDay => "week_day",
            Self::Year => "year",
        }
    }

    fn bounds(self) -> (u32, u32) {
        match self {
            Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::Day => (1, 31),
            Self::Month => (1, 12),
            Self::WeekDay => (1, 7),
            Self::Year => (1970, 2199),
        }
    }

    fn names(self) -> &'static [&'static str] {
        match self {
            Self::Month => &MONTHS,
            Self::WeekDay => &WEEK_DAYS,
            _ => &[],
        }
    }
}

/// Render a schedule as an expression string.
pub fn expression(schedule: &Schedule) -> Result<String> {
    match schedule {
        Schedule::Cron(opts) => cron_expression(opts),
        Schedule::Rate { value, unit } => rate_expression(*value, *unit),
        Schedule::Expression(expr) => {
            validate_expression(expr)?;
            Ok(expr.clone())
        }
    }
}

/// Render cron options, filling unset fields.
///
/// `week_day` defaults to `?`; when it is set, `day` defaults to `?` instead
/// of `*`.
pub fn cron_expression(opts: &CronOptions) -> Result<String> {
    if opts.day.is_some() && opts.week_day.is_some() {
        return Err(MusabiError::InvalidSchedule(
            "cannot set both 'day' and 'week_day'".to_string(),
        ));
    }
    let minute = opts.minute.as_deref().unwrap_or("*");
    let hour = opts.hour.as_deref().unwrap_or("*");
    let day = opts
        .day
        .as_deref()
        .unwrap_or(if opts.week_day.is_some() { "?" } else { "*" });
    let month = opts.month.as_deref().unwrap_or("*");
    let week_day = opts.week_day.as_deref().unwrap_or("?");
    let year = opts.year.as_deref().unwrap_or("*");

    let fields = [minute, hour, day, month, week_day, year];
    validate_cron_fields(&fields)?;
    Ok(format!("cron({})", fields.join(" ")))
}

/// Render `rate(N unit)`; the unit is singular for a value of one.
pub fn rate_expression(value: u32, unit: RateUnit) -> Result<String> {
    if value == 0 {
        return Err(MusabiError::InvalidSchedule(
            "rate value must be at least 1".to_string(),
        ));
    }
    let unit = match (unit, value == 1) {
        (RateUnit::Minutes, true) => "minute",
        (RateUnit::Minutes, false) => "minutes",
        (RateUnit::Hours, true) => "hour",
        (RateUnit::Hours, false) => "hours",
        (RateUnit::Days, true) => "day",
        (RateUnit::Days, false) => "days",
    };
    Ok(format!("rate({} {})", value, unit))
}

/// Validate a literal `cron(...)` or `rate(...)` expression.
pub fn validate_expression(expr: &str) -> Result<()> {
    if let Some(body) = expr.strip_prefix("cron(").and_then(|s| s.strip_suffix(')')) {
        let fields: Vec<&str> = body.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(MusabiError::InvalidSchedule(format!(
                "'{}' must have 6 fields, found {}",
                expr,
                fields.len()
            )));
        }
        return validate_cron_fields(&fields);
    }
    if let Some(body) = expr.strip_prefix("rate(").and_then(|s| s.strip_suffix(')')) {
        let mut parts = body.split_whitespace();
        let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(MusabiError::InvalidSchedule(format!(
                "'{}' must be rate(<value> <unit>)",
                expr
            )));
        };
        let value: u32 = value
            .parse()
            .map_err(|_| MusabiError::InvalidSchedule(format!("bad rate value in '{}'", expr)))?;
        let unit = match unit {
            "minute" | "minutes" => RateUnit::Minutes,
            "hour" | "hours" => RateUnit::Hours,
            "day" | "days" => RateUnit::Days,
            other => {
                return Err(MusabiError::InvalidSchedule(format!(
                    "unknown rate unit '{}'",
                    other
                )))
            }
        };
        let canonical = rate_expression(value, unit)?;
        if canonical != expr {
            return Err(MusabiError::InvalidSchedule(format!(
                "'{}' should be written '{}'",
                expr, canonical
            )));
        }
        return Ok(());
    }
    Err(MusabiError::InvalidSchedule(format!(
        "'{}' must start with cron( or rate(",
        expr
    )))
}

fn validate_cron_fields(fields: &[&str]) -> Result<()> {
    let kinds = [
        Field::Minute,
        Field::Hour,
        Field::Day,
        Field::Month,
        Field::WeekDay,
        Field::Year,
    ];
    for (value, kind) in fields.iter().zip(kinds) {
        validate_field(value, kind)?;
    }
    // Exactly one of day-of-month / day-of-week must be '?'
    let (day, week_day) = (fields[2], fields[4]);
    if (day == "?") == (week_day == "?") {
        return Err(MusabiError::InvalidSchedule(format!(
            "exactly one of day ('{}') and week_day ('{}') must be '?'",
            day, week_day
        )));
    }
    Ok(())
}

fn validate_field(value: &str, kind: Field) -> Result<()> {
    let bad = |why: &str| {
        Err(MusabiError::InvalidSchedule(format!(
            "{} field '{}': {}",
            kind.name(),
            value,
            why
        )))
    };

    if value.is_empty() {
        return bad("empty");
    }
    if value == "?" {
        return match kind {
            Field::Day | Field::WeekDay => Ok(()),
            _ => bad("'?' is only allowed for day and week_day"),
        };
    }

    for item in value.split(',') {
        if item == "*" {
            continue;
        }
        match kind {
            Field::Day if item == "L" || item == "LW" => continue,
            Field::Day if item.ends_with('W') => {
                if parse_value(&item[..item.len() - 1], kind).is_none() {
                    return bad("invalid weekday-nearest day");
                }
                continue;
            }
            Field::WeekDay if item == "L" => continue,
            Field::WeekDay if item.ends_with('L') => {
                if parse_value(&item[..item.len() - 1], kind).is_none() {
                    return bad("invalid last-weekday");
                }
                continue;
            }
            Field::WeekDay if item.contains('#') => {
                let (day, nth) = item.split_once('#').unwrap_or_default();
                let nth_ok = matches!(nth.parse::<u32>(), Ok(1..=5));
                if parse_value(day, kind).is_none() || !nth_ok {
                    return bad("invalid nth weekday");
                }
                continue;
            }
            _ => {}
        }

        let (range, step) = match item.split_once('/') {
            Some((r, s)) => (r, Some(s)),
            None => (item, None),
        };
        if let Some(step) = step {
            match step.parse::<u32>() {
                Ok(n) if n >= 1 => {}
                _ => return bad("step must be a positive integer"),
            }
        }
        if range == "*" {
            continue;
        }
        match range.split_once('-') {
            Some((lo, hi)) => {
                let (Some(lo), Some(hi)) = (parse_value(lo, kind), parse_value(hi, kind)) else {
                    return bad("range bound out of bounds");
                };
                if kind != Field::WeekDay && lo > hi {
                    return bad("range start after end");
                }
            }
            None => {
                if parse_value(range, kind).is_none() {
                    let (lo, hi) = kind.bounds();
                    return bad(&format!("expected {}-{}", lo, hi));
                }
            }
        }
    }
    Ok(())
}

fn parse_value(raw: &str, kind: Field) -> Option<u32> {
    let upper = raw.to_ascii_uppercase();
    if let Some(pos) = kind.names().iter().position(|n| *n == upper) {
        return u32::try_from(pos + 1).ok();
    }
    let n: u32 = raw.parse().ok()?;
    let (lo, hi) = kind.bounds();
    (lo..=hi).contains(&n).then_some(n)
}

/// Human description of a schedule, e.g. "every day at 03:00 UTC".
pub fn describe(schedule: &Schedule) -> Result<String> {
    let expr = expression(schedule)?;
    if let Some(body) = expr.strip_prefix("cron(").and_then(|s| s.strip_suffix(')')) {
        let f: Vec<&str> = body.split_whitespace().collect();
        if let [minute, hour, "*", "*", "?", "*"] = f.as_slice() {
            if let (Ok(m), Ok(h)) = (minute.parse::<u32>(), hour.parse::<u32>()) {
                return Ok(format!("every day at {:02}:{:02} UTC", h, m));
            }
        }
        return Ok(format!("{} (UTC)", expr));
    }
    if let Some(body) = expr.strip_prefix("rate(").and_then(|s| s.strip_suffix(')')) {
        return Ok(format!("every {}", body));
    }
    Ok(expr)
}
