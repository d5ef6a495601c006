//! Conversion between snapshot timestamps and chain epochs.
//!
//! Epochs count fixed 30-second windows from the chain's genesis instant.
//! Converting a timestamp to an epoch floors into its window; converting an
//! epoch back yields the canonical timestamp at the start of that window, so
//! only `epoch -> timestamp -> epoch` is an exact round trip.
//!
//! ```
//! use snapshot_dl::epoch::{to_epoch, to_timestamp};
//!
//! let epoch = to_epoch("2022-02-28_08-00-00").unwrap();
//! assert_eq!(epoch.get(), 1590960);
//! assert_eq!(to_timestamp(epoch).unwrap().to_string(), "2022-02-28_08-00-00");
//! ```

use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Textual layout of snapshot timestamps (`YYYY-MM-DD_HH-MM-SS`)
pub const TIMESTAMP_LAYOUT: &str = "%Y-%m-%d_%H-%M-%S";

/// Unix time of epoch 0
pub const GENESIS_UNIX: i64 = 1_598_306_400;

/// Seconds per epoch
pub const EPOCH_UNIT_SECS: i64 = 30;

/// A chain epoch number
///
/// Values below zero come out of [`to_epoch`] for pre-genesis timestamps and
/// are not valid artifact coordinates; see [`Epoch::is_valid`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(pub i64);

impl Epoch {
    /// Create a new Epoch
    pub fn new(epoch: i64) -> Self {
        Self(epoch)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }

    /// True for epochs at or after genesis
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    /// Canonical timestamp at the start of this epoch's window
    pub fn timestamp(self) -> Result<Timestamp> {
        to_timestamp(self)
    }
}

impl From<i64> for Epoch {
    fn from(epoch: i64) -> Self {
        Self(epoch)
    }
}

impl From<Epoch> for i64 {
    fn from(epoch: Epoch) -> Self {
        epoch.0
    }
}

impl PartialEq<i64> for Epoch {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Epoch {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// A UTC instant with second precision, rendered as `YYYY-MM-DD_HH-MM-SS`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Parse a timestamp in the fixed layout.
    ///
    /// The text must be exactly `YYYY-MM-DD_HH-MM-SS`: zero-padded fields,
    /// no sign, no surrounding whitespace and no leap second.
    pub fn parse(text: &str) -> Result<Self> {
        check_layout(text)
            .map_err(str::to_string)
            .and_then(|()| {
                NaiveDateTime::parse_from_str(text, TIMESTAMP_LAYOUT).map_err(|e| e.to_string())
            })
            .map(|naive| Self(naive.and_utc()))
            .map_err(|reason| {
                tracing::warn!(input = %text, error = %reason, "could not parse date");
                Error::DateParse {
                    input: text.to_string(),
                    reason,
                }
            })
    }

    /// Build a timestamp from unix seconds.
    pub fn from_unix(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }

    /// Seconds since the unix epoch
    pub fn unix(&self) -> i64 {
        self.0.timestamp()
    }

    /// Underlying chrono value
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Epoch window this timestamp falls in (may be negative before genesis)
    pub fn epoch(&self) -> Epoch {
        Epoch((self.unix() - GENESIS_UNIX).div_euclid(EPOCH_UNIT_SECS))
    }

    /// The same instant shifted forward by `hours` hours.
    ///
    /// Fails with [`Error::TimestampOutOfRange`] if the result cannot be
    /// written in the four-digit-year layout.
    pub fn plus_hours(&self, hours: i64) -> Result<Self> {
        TimeDelta::try_hours(hours)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .filter(fits_layout)
            .map(Self)
            .ok_or_else(|| Error::TimestampOutOfRange {
                timestamp: self.to_string(),
                hours,
            })
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        // Sub-second precision is not representable in the layout
        Self::from_unix(dt.timestamp()).unwrap_or(Self(dt))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_LAYOUT))
    }
}

impl std::str::FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Byte offsets of the separators in `YYYY-MM-DD_HH-MM-SS`
const SEPARATORS: [(usize, u8); 5] = [(4, b'-'), (7, b'-'), (10, b'_'), (13, b'-'), (16, b'-')];

/// Reject anything chrono would accept but the layout does not allow.
fn check_layout(text: &str) -> std::result::Result<(), &'static str> {
    let bytes = text.as_bytes();
    if bytes.len() != 19 {
        return Err("expected 19 characters in YYYY-MM-DD_HH-MM-SS form");
    }
    for (i, &b) in bytes.iter().enumerate() {
        match SEPARATORS.iter().find(|(pos, _)| *pos == i) {
            Some(&(_, sep)) if b != sep => return Err("misplaced separator"),
            None if !b.is_ascii_digit() => return Err("expected a digit"),
            _ => {}
        }
    }
    if bytes[17] >= b'6' {
        return Err("seconds must be below 60");
    }
    Ok(())
}

/// True if `dt` renders as a four-digit year
fn fits_layout(dt: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&dt.year())
}

/// Convert timestamp text to its epoch.
///
/// Fails with [`Error::DateParse`] when the text does not match
/// [`TIMESTAMP_LAYOUT`]. Timestamps before genesis produce a negative epoch.
pub fn to_epoch(text: &str) -> Result<Epoch> {
    tracing::debug!(date = %text, "getting epoch for date");
    Ok(Timestamp::parse(text)?.epoch())
}

/// Convert an epoch to the canonical timestamp starting its window.
///
/// Fails with [`Error::InvalidEpoch`] for negative epochs.
pub fn to_timestamp(epoch: Epoch) -> Result<Timestamp> {
    tracing::debug!(epoch = epoch.0, "getting date for epoch");

    if !epoch.is_valid() {
        return Err(Error::InvalidEpoch { epoch: epoch.0 });
    }

    epoch
        .0
        .checked_mul(EPOCH_UNIT_SECS)
        .and_then(|offset| offset.checked_add(GENESIS_UNIX))
        .and_then(Timestamp::from_unix)
        .filter(|ts| fits_layout(&ts.0))
        .ok_or(Error::InvalidEpoch { epoch: epoch.0 })
}

/// Convert a list of dates to epochs, stopping at the first unparsable one.
pub fn to_epochs<S: AsRef<str>>(dates: &[S]) -> Result<Vec<Epoch>> {
    dates.iter().map(|d| to_epoch(d.as_ref())).collect()
}

/// String-level form of [`to_epoch`].
pub fn date_to_epoch(date: &str) -> Result<i64> {
    to_epoch(date).map(|e| e.0)
}

/// String-level form of [`to_timestamp`].
pub fn epoch_to_date_string(epoch: i64) -> Result<String> {
    to_timestamp(Epoch(epoch)).map(|t| t.to_string())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_to_epoch() {
        assert_eq!(date_to_epoch("2022-02-28_08-00-00").unwrap(), 1590960);
    }

    #[test]
    fn test_epoch_to_date() {
        assert_eq!(
            epoch_to_date_string(1590960).unwrap(),
            "2022-02-28_08-00-00"
        );
    }

    #[test]
    fn test_date_to_epoch_with_empty_string() {
        let err = to_epoch("").unwrap_err();
        assert!(matches!(err, Error::DateParse { ref input, .. } if input.is_empty()));
    }

    #[test]
    fn test_date_to_epoch_with_invalid_layout() {
        for bad in [
            "02-28-2022_09-00-00",
            "2022-02-28 08:00:00",
            "2022-02-28_08-00",
            "2022-02-28_08-00-00Z",
            "2022-13-01_00-00-00",
            "2022-2-28_8-0-0",
            "2022-02-28_08-00-60",
            "+262142-12-31_23-59-59",
            " 2022-02-28_08-00-00",
            "2022-02-28_08-00-00 ",
            "2022/02/28_08-00-00",
            "2022-02-28T08-00-00",
            "2022-02-2a_08-00-00",
        ] {
            assert!(
                matches!(to_epoch(bad), Err(Error::DateParse { .. })),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_epoch_to_date_with_minus_one() {
        let err = to_timestamp(Epoch(-1)).unwrap_err();
        assert!(matches!(err, Error::InvalidEpoch { epoch: -1 }));
    }

    #[test]
    fn genesis_is_epoch_zero() {
        let ts = to_timestamp(Epoch(0)).unwrap();
        assert_eq!(ts.unix(), GENESIS_UNIX);
        assert_eq!(ts.to_string(), "2020-08-24_22-00-00");
        assert_eq!(to_epoch("2020-08-24_22-00-00").unwrap().get(), 0);
    }

    #[test]
    fn timestamps_within_a_window_share_an_epoch() {
        let start = to_epoch("2022-02-28_08-00-00").unwrap();
        let later = to_epoch("2022-02-28_08-00-29").unwrap();
        let next = to_epoch("2022-02-28_08-00-30").unwrap();
        assert_eq!(start, later);
        assert_eq!(next.get(), start.get() + 1);
    }

    #[test]
    fn pre_genesis_epochs_floor_downwards() {
        // One second before genesis is the last second of window -1, not window 0
        let e = to_epoch("2020-08-24_21-59-59").unwrap();
        assert_eq!(e.get(), -1);
        assert!(!e.is_valid());
    }

    #[test]
    fn round_trip_for_valid_epochs() {
        let samples = [0i64, 1, 2, 119, 120, 2880, 1_590_960, 3_000_000, 123_456_789];
        for e in samples {
            let ts = to_timestamp(Epoch(e)).unwrap();
            assert_eq!(to_epoch(&ts.to_string()).unwrap().get(), e, "epoch {e}");
        }
    }

    #[test]
    fn conversion_is_deterministic() {
        let a = to_epoch("2023-06-01_12-34-56").unwrap();
        let b = to_epoch("2023-06-01_12-34-56").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn plus_hours_advances_exactly() {
        let ts = Timestamp::parse("2022-02-28_23-30-00").unwrap();
        let next = ts.plus_hours(1).unwrap();
        assert_eq!(next.to_string(), "2022-03-01_00-30-00");
        assert_eq!(ts.plus_hours(3).unwrap().unix() - ts.unix(), 3 * 3600);
        // An hour is 120 epochs
        assert_eq!(next.epoch().get() - ts.epoch().get(), 120);
    }

    #[test]
    fn plus_hours_past_year_9999_is_out_of_range() {
        let ts = Timestamp::parse("9999-12-31_23-30-00").unwrap();
        let err = ts.plus_hours(1).unwrap_err();
        assert!(matches!(
            err,
            Error::TimestampOutOfRange { ref timestamp, hours: 1 } if timestamp == "9999-12-31_23-30-00"
        ));
        assert!(ts.plus_hours(i64::MAX).is_err());
    }

    #[test]
    fn latest_layout_timestamp_parses() {
        let ts = Timestamp::parse("9999-12-31_23-59-59").unwrap();
        assert_eq!(ts.to_string(), "9999-12-31_23-59-59");
        assert_eq!(to_timestamp(ts.epoch()).unwrap().to_string(), "9999-12-31_23-59-30");
    }

    #[test]
    fn epoch_beyond_layout_is_invalid() {
        let err = to_timestamp(Epoch(i64::MAX / EPOCH_UNIT_SECS - GENESIS_UNIX)).unwrap_err();
        assert!(matches!(err, Error::InvalidEpoch { .. }));
        // Representable by chrono, but past year 9999
        assert!(to_timestamp(Epoch(10_000_000_000)).is_err());
    }

    #[test]
    fn batch_conversion_stops_at_first_error() {
        let ok = to_epochs(&["2022-02-28_08-00-00", "2022-02-28_09-00-00"]).unwrap();
        assert_eq!(ok, vec![Epoch(1590960), Epoch(1591080)]);

        assert!(to_epochs(&["2022-02-28_08-00-00", "garbage"]).is_err());
    }

    #[test]
    fn timestamp_serializes_in_layout() {
        let ts = Timestamp::parse("2022-02-28_08-00-00").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2022-02-28_08-00-00\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn epoch_parses_from_text() {
        assert_eq!(" 1590960 ".parse::<Epoch>().unwrap(), Epoch(1590960));
        assert!("abc".parse::<Epoch>().is_err());
    }
}
