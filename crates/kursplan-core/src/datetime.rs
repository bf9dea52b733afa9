use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;

const TIMEZONE_ENV_VAR: &str = "KURSPLAN_TIMEZONE";
const DEFAULT_SITE_TIMEZONE: &str = "Europe/Berlin";

/// Weekday letters as shown in the rendered timeline, indexed from Sunday.
const WEEKDAY_SHORT: [&str; 7] = ["So", "Mo", "Di", "Mi", "Do", "Fr", "Sa"];

/// Resolve the site timezone: `KURSPLAN_TIMEZONE` wins over the configured
/// value, which wins over the built-in default. An unparseable source falls
/// through to the next one.
pub fn resolve_timezone(configured: Option<&str>) -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
        && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
        return tz;
    }

    if let Some(raw) = configured
        && let Some(tz) = parse_timezone(raw, "config")
    {
        return tz;
    }

    parse_timezone(DEFAULT_SITE_TIMEZONE, "DEFAULT_SITE_TIMEZONE").unwrap_or_else(|| {
        tracing::error!("failed to parse fallback timezone; using UTC");
        chrono_tz::UTC
    })
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured site timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(source, timezone = %trimmed, error = %err, "failed to parse timezone id");
            None
        }
    }
}

/// The single conversion boundary from a wall-clock instant to a calendar
/// date. Everything downstream works on plain `NaiveDate`s.
#[must_use]
pub fn today_in_zone(now: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    now.with_timezone(tz).date_naive()
}

/// Strict `YYYY-MM-DD` parsing. Components must be zero-padded and in range;
/// anything else is rejected.
#[must_use]
pub fn parse_ymd(raw: &str) -> Option<NaiveDate> {
    let re = Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})$").ok()?;
    let caps = re.captures(raw.trim())?;

    let year: i32 = caps.name("year")?.as_str().parse().ok()?;
    let month: u32 = caps.name("month")?.as_str().parse().ok()?;
    let day: u32 = caps.name("day")?.as_str().parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Canonical zero-padded day key. Sorts lexically in chronological order.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[must_use]
pub fn add_days(date: NaiveDate, n: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(n)).unwrap_or(date)
}

/// Advance by `n` calendar months, keeping the day-of-month but clamping to
/// the target month's last day. The clamped result is the anchor for any
/// further stepping: a series started on the 31st drifts down for good once
/// it crosses a short month.
#[must_use]
pub fn add_months_keep_day(date: NaiveDate, n: u32) -> NaiveDate {
    date.checked_add_months(Months::new(n)).unwrap_or(date)
}

/// Display form of a day key: weekday prefix plus `dd.mm.yyyy`. A key that
/// does not parse is shown unchanged.
#[must_use]
pub fn day_label(key: &str) -> String {
    let Some(date) = parse_ymd(key) else {
        return key.to_string();
    };
    let weekday = WEEKDAY_SHORT[date.weekday().num_days_from_sunday() as usize];
    format!("{weekday} {}", date.format("%d.%m.%Y"))
}
