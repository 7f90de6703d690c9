use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::ValidationError;

const MARKET_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// RFC3339 timestamp guaranteed to be UTC, kept at whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self(now - Duration::nanoseconds(i64::from(now.nanosecond())))
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::TimestampNotUtc {
                value: seconds.to_string(),
            })
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .expect("UtcDateTime must be RFC3339 formattable")
    }

    /// Compact form used in history file names, e.g. `20240101T093000Z`.
    pub fn compact_stamp(self) -> String {
        self.format_rfc3339().replace([':', '-'], "")
    }

    /// Whole seconds elapsed between `earlier` and `self` (negative if `earlier` is later).
    pub fn seconds_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).whole_seconds()
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Exchange-local trading date of a close, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarketDate(Date);

impl MarketDate {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Date::parse(input.trim(), MARKET_DATE_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidMarketDate {
                value: input.to_owned(),
            })
    }

    /// Date of a unix timestamp as seen from an exchange `gmt_offset_seconds` away from UTC.
    pub fn from_unix_with_offset(
        seconds: i64,
        gmt_offset_seconds: i64,
    ) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds.saturating_add(gmt_offset_seconds))
            .map(|local| Self(local.date()))
            .map_err(|_| ValidationError::InvalidMarketDate {
                value: seconds.to_string(),
            })
    }

    pub fn into_inner(self) -> Date {
        self.0
    }

    pub fn format(self) -> String {
        self.0
            .format(MARKET_DATE_FORMAT)
            .expect("MarketDate must be formattable")
    }
}

impl Display for MarketDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

impl Serialize for MarketDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for MarketDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn now_has_whole_second_precision() {
        let now = UtcDateTime::now();
        assert_eq!(now.into_inner().nanosecond(), 0);
        assert!(now.format_rfc3339().ends_with('Z'));
    }

    #[test]
    fn compact_stamp_strips_separators() {
        let ts = UtcDateTime::parse("2024-03-05T06:07:08Z").expect("must parse");
        assert_eq!(ts.compact_stamp(), "20240305T060708Z");
    }

    #[test]
    fn market_date_uses_exchange_offset() {
        // 2024-01-01T20:00:00Z is already 2 January in Sydney (UTC+11).
        let date = MarketDate::from_unix_with_offset(1_704_139_200, 39_600).expect("valid");
        assert_eq!(date.format(), "2024-01-02");
    }

    #[test]
    fn rejects_malformed_market_date() {
        let err = MarketDate::parse("01/02/2024").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidMarketDate { .. }));
    }
}
