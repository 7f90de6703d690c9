//! Trading-day oracle, session windows and local-time rendering.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::{CoreError, SnapshotWindow, StoreError, UtcDateTime, ValidationError};

/// Time zone the exchange session is defined in.
pub const DEFAULT_EXCHANGE_TZ: Tz = chrono_tz::Australia::Sydney;

/// Time zone `asOfLocal` is rendered in.
pub const DEFAULT_DISPLAY_TZ: Tz = chrono_tz::Australia::Perth;

const MID_SESSION_MINUTES: (u32, u32) = (12 * 60 + 45, 13 * 60 + 15);
const CLOSE_MINUTES: (u32, u32) = (16 * 60 + 10, 16 * 60 + 40);

pub fn parse_time_zone(name: &str) -> Result<Tz, ValidationError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimeZone {
            value: name.to_owned(),
        })
}

fn to_chrono(instant: UtcDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.unix_timestamp(), 0).unwrap_or_default()
}

/// Calendar date of `instant` in `tz`.
pub fn local_date(instant: UtcDateTime, tz: Tz) -> NaiveDate {
    to_chrono(instant).with_timezone(&tz).date_naive()
}

/// `YYYY-MM-DD HH:MM:SS <abbr>` in `tz`, e.g. `2024-01-02 14:00:00 AWST`.
pub fn format_local(instant: UtcDateTime, tz: Tz) -> String {
    to_chrono(instant)
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

/// Session window `instant` falls in, judged on the exchange's wall clock.
///
/// Both windows are inclusive at minute resolution.
pub fn classify_window(instant: UtcDateTime, exchange_tz: Tz) -> SnapshotWindow {
    let local = to_chrono(instant).with_timezone(&exchange_tz);
    let minute_of_day = local.hour() * 60 + local.minute();
    let within = |(start, end): (u32, u32)| (start..=end).contains(&minute_of_day);

    if within(MID_SESSION_MINUTES) {
        SnapshotWindow::MidSession
    } else if within(CLOSE_MINUTES) {
        SnapshotWindow::Close
    } else {
        SnapshotWindow::Manual
    }
}

/// Trading-day oracle.
pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;
}

/// Monday–Friday calendar with an optional holiday list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one `YYYY-MM-DD` per line; blank lines and `#` comments are skipped.
    pub fn parse_holidays(text: &str) -> Result<Self, ValidationError> {
        let holidays = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                NaiveDate::parse_from_str(line, "%Y-%m-%d").map_err(|_| {
                    ValidationError::InvalidMarketDate {
                        value: line.to_owned(),
                    }
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self { holidays })
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let calendar = Self::parse_holidays(&text)?;
        tracing::debug!("loaded {} holidays from {}", calendar.holidays.len(), path.display());
        Ok(calendar)
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}
