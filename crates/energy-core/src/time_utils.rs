use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{EnergyError, Result};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Converts source epochs into local wall-clock timestamps.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    tz: Tz,
}

impl TimezoneHandler {
    /// Handler for an already-parsed timezone.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Handler for UTC, mostly useful in tests and for UTC-indexed data.
    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    /// Resolve a timezone setting.
    ///
    /// `"auto"` (or an empty string) selects the system timezone, falling back
    /// to UTC with a warning when the system reports a name `chrono-tz` does
    /// not know. Any other value must be a valid IANA identifier.
    pub fn resolve(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            let system = get_system_timezone();
            let tz = system.parse::<Tz>().unwrap_or_else(|_| {
                warn!(
                    "TimezoneHandler: unrecognised system timezone \"{}\", falling back to UTC",
                    system
                );
                Tz::UTC
            });
            return Ok(Self { tz });
        }

        trimmed
            .parse::<Tz>()
            .map(|tz| Self { tz })
            .map_err(|_| EnergyError::InvalidTimezone(trimmed.to_string()))
    }

    /// Convert a Unix epoch (seconds) into local wall-clock time.
    ///
    /// Returns `None` when the epoch is outside chrono's representable range.
    pub fn epoch_to_local(&self, epoch: i64) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(epoch, 0).map(|utc| utc.with_timezone(&self.tz).naive_local())
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

// ── Query bounds ──────────────────────────────────────────────────────────────

/// Parse a query bound such as `"2022-01-01"` or `"2022-01-01T06:00:00"`.
///
/// A bare date means midnight at the start of that day.
pub fn parse_bound(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return Err(EnergyError::InvalidDate(s.to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    const FMTS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FMTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive);
        }
    }

    Err(EnergyError::InvalidDate(s.to_string()))
}

// ── Calendar truncation ───────────────────────────────────────────────────────

/// Midnight at the start of `ts`'s day.
pub fn floor_to_day(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(NaiveTime::MIN)
}

/// Monday 00:00 of `ts`'s ISO week, or `None` when that Monday falls before
/// the earliest representable date.
pub fn checked_floor_to_week(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    let offset = i64::from(ts.date().weekday().num_days_from_monday());
    ts.date()
        .checked_sub_signed(Duration::days(offset))
        .map(|monday| monday.and_time(NaiveTime::MIN))
}

/// Monday 00:00 of `ts`'s ISO week.
///
/// Saturates at [`NaiveDateTime::MIN`]; the normalizer never emits a
/// timestamp for which [`checked_floor_to_week`] fails.
pub fn floor_to_week(ts: NaiveDateTime) -> NaiveDateTime {
    checked_floor_to_week(ts).unwrap_or(NaiveDateTime::MIN)
}

/// 00:00 on the first day of `ts`'s month.
pub fn floor_to_month(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date()
        .with_day(1)
        .unwrap_or(ts.date())
        .and_time(NaiveTime::MIN)
}

/// Number of days in the given Gregorian month (28–31).
///
/// Out-of-range months return 0.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map(|n| (n - first).num_days() as u32).unwrap_or(31)
}
