//! Civil-time helpers.
//!
//! All user-facing time arithmetic (relative due dates, reminder phrases,
//! estimated-time checks) happens in India Standard Time, a fixed UTC+05:30
//! offset with no daylight saving. Timestamps are stored in UTC.

use std::sync::LazyLock;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike,
    Utc,
};
use regex::Regex;

use crate::domain::ValidationError;

/// Offset of India Standard Time from UTC, in seconds.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Display format used in user-facing messages (`DD/MM/YYYY hh:mm AM/PM`).
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %I:%M %p";

/// Default hour for bare "today" / "tomorrow" due dates.
const DEFAULT_DUE_HOUR: u32 = 18;
/// Hour used for "evening" / "tonight".
const EVENING_HOUR: u32 = 20;
/// Hour used for "morning" phrases and "tomorrow" reminders.
const MORNING_HOUR: u32 = 9;

static EXPLICIT_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").ok());

static RELATIVE_OFFSET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bin\s+(\d+)?\s*(minute|min|hour|hr|day)s?\b").ok());

/// The fixed IST offset.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Convert a UTC instant to IST wall-clock time.
pub fn to_ist(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.with_timezone(&ist())
}

/// Format a UTC instant as IST for user-facing text.
pub fn format_ist(at: DateTime<Utc>) -> String {
    to_ist(at).format(DISPLAY_FORMAT).to_string()
}

/// Interpret a naive date-time as IST wall-clock time.
pub fn from_ist_naive(naive: NaiveDateTime) -> DateTime<Utc> {
    // A fixed offset has exactly one mapping for every local time.
    match ist().from_local_datetime(&naive).single() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    }
}

/// The UTC instant of `hour:minute` IST on the given IST calendar date.
pub fn at_ist(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(from_ist_naive(date.and_time(time)))
}

/// Parse an absolute ISO-8601 timestamp.
///
/// Values with an offset (`Z`, `+05:30`) are honoured; naive values are
/// taken as IST. A bare date means 18:00 IST on that day.
pub fn parse_iso(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(at.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(from_ist_naive(naive));
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| at_ist(date, DEFAULT_DUE_HOUR, 0))
}

/// Resolve a due-date expression against `now`.
///
/// Accepts ISO-8601 (see [`parse_iso`]) or a relative phrase:
///
/// | phrase | resolves to (IST) |
/// |---|---|
/// | `today` | today 18:00 |
/// | `tomorrow` | tomorrow 18:00 |
/// | `evening`, `tonight` | today 20:00 |
/// | `morning` | 09:00, tomorrow when it is already past noon |
/// | `tomorrow morning` | tomorrow 09:00 |
///
/// An explicit clock time in the phrase (`tomorrow 18:00`, `today at 5pm`)
/// overrides the default hour.
pub fn parse_due_date(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    if let Some(at) = parse_iso(input) {
        return Ok(at);
    }
    let lower = input.trim().to_lowercase();
    let today = to_ist(now).date_naive();
    let tomorrow = today + Duration::days(1);
    let after_noon = to_ist(now).hour() >= 12;

    let mentions_morning = lower.contains("morning");
    let mentions_evening = lower.contains("evening") || lower.contains("tonight");

    let (date, default_hour) = if lower.contains("tomorrow") {
        let hour = if mentions_morning {
            MORNING_HOUR
        } else if mentions_evening {
            EVENING_HOUR
        } else {
            DEFAULT_DUE_HOUR
        };
        (tomorrow, hour)
    } else if lower.contains("today") {
        let hour = if mentions_evening {
            EVENING_HOUR
        } else if mentions_morning {
            MORNING_HOUR
        } else {
            DEFAULT_DUE_HOUR
        };
        (today, hour)
    } else if mentions_evening {
        (today, EVENING_HOUR)
    } else if mentions_morning {
        (if after_noon { tomorrow } else { today }, MORNING_HOUR)
    } else {
        return Err(ValidationError::InvalidDateTime(input.trim().to_owned()));
    };

    let (hour, minute) = explicit_time(&lower).unwrap_or((default_hour, 0));
    at_ist(date, hour, minute).ok_or_else(|| ValidationError::InvalidDateTime(input.trim().to_owned()))
}

/// Resolve a reminder fire-time expression against `now`.
///
/// `None` or blank means one hour from now. Supports `in N minutes|hours|days`
/// (a missing count means 1), `tomorrow` (09:00 IST unless a clock time is
/// given), ISO-8601 and the due-date phrases of [`parse_due_date`].
/// Unrecognised input and offsets too large to represent fall back to one
/// hour from now.
pub fn parse_reminder_time(input: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let default = now + Duration::hours(1);
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    let lower = raw.to_lowercase();

    if let Some(caps) = RELATIVE_OFFSET.as_ref().and_then(|re| re.captures(&lower)) {
        let count: Option<i64> = match caps.get(1) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(1),
        };
        let offset = count.and_then(|count| match caps.get(2).map(|m| m.as_str()) {
            Some("minute") | Some("min") => Duration::try_minutes(count),
            Some("day") => Duration::try_days(count),
            _ => Duration::try_hours(count),
        });
        if let Some(at) = offset.and_then(|offset| now.checked_add_signed(offset)) {
            return at;
        }
        tracing::warn!(input = raw, "reminder offset out of range, defaulting to one hour from now");
        return default;
    }

    if lower.contains("tomorrow") {
        let tomorrow = to_ist(now).date_naive() + Duration::days(1);
        let (hour, minute) = explicit_time(&lower).unwrap_or((MORNING_HOUR, 0));
        if let Some(at) = at_ist(tomorrow, hour, minute) {
            return at;
        }
    }

    if let Ok(at) = parse_due_date(raw, now) {
        return at;
    }

    tracing::warn!(input = raw, "unrecognised reminder time, defaulting to one hour from now");
    default
}

/// Extract a clock time such as `18:00`, `5pm` or `9:30 am`.
///
/// A bare number without a colon or meridiem is not treated as a time.
fn explicit_time(lower: &str) -> Option<(u32, u32)> {
    let re = EXPLICIT_TIME.as_ref()?;
    re.captures_iter(lower).find_map(|caps| {
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute_str = caps.get(2).map(|m| m.as_str());
        let meridiem = caps.get(3).map(|m| m.as_str());
        if minute_str.is_none() && meridiem.is_none() {
            return None;
        }
        let minute: u32 = minute_str.map_or(Some(0), |m| m.parse().ok())?;
        let hour = match meridiem {
            Some("am") if hour == 12 => 0,
            Some("am") => hour,
            Some("pm") if hour == 12 => 12,
            Some("pm") => hour + 12,
            _ => hour,
        };
        (hour < 24 && minute < 60).then_some((hour, minute))
    })
}
