//! Wire time representation shared by remote payloads and local records.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A point in time as exchanged with the remote parsing service.
///
/// `utc` is milliseconds since the unix epoch, `offset` is the local UTC offset
/// in milliseconds at that instant. `tzid` is kept when the source named a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportTime {
    pub utc: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tzid: Option<String>,
}

impl TransportTime {
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        TransportTime {
            utc: dt.timestamp_millis(),
            offset: 0,
            tzid: None,
        }
    }

    /// Floating times carry no zone; they are pinned to UTC.
    pub fn from_floating(dt: NaiveDateTime) -> Self {
        TransportTime::from_utc(dt.and_utc())
    }

    /// All-day dates start at midnight UTC.
    pub fn from_date(date: NaiveDate) -> Self {
        TransportTime::from_utc(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
    }

    /// Resolve a wall-clock time in `tzid`. Unknown zones fall back to floating.
    pub fn from_zoned(datetime: NaiveDateTime, tzid: &str) -> Self {
        let Ok(tz) = tzid.parse::<chrono_tz::Tz>() else {
            return TransportTime::from_floating(datetime);
        };

        match tz.from_local_datetime(&datetime).earliest() {
            Some(local) => TransportTime {
                utc: local.timestamp_millis(),
                offset: i64::from(local.offset().fix().local_minus_utc()) * 1000,
                tzid: Some(tzid.to_string()),
            },
            None => TransportTime::from_floating(datetime),
        }
    }

    /// Shift by a number of seconds, keeping offset and zone. Saturates at the
    /// ends of the millisecond range.
    pub fn shifted_by_secs(&self, secs: i64) -> Self {
        TransportTime {
            utc: self.utc.saturating_add(secs.saturating_mul(1000)),
            offset: self.offset,
            tzid: self.tzid.clone(),
        }
    }

    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.utc)
    }

    /// Milliseconds between two times.
    pub fn millis_until(&self, later: &TransportTime) -> Duration {
        Duration::try_milliseconds(later.utc.saturating_sub(self.utc)).unwrap_or(Duration::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_utc_has_zero_offset() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap();
        let time = TransportTime::from_utc(dt);
        assert_eq!(time.utc, dt.timestamp_millis());
        assert_eq!(time.offset, 0);
        assert_eq!(time.to_utc(), Some(dt));
    }

    #[test]
    fn test_from_zoned_resolves_offset() {
        let naive = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let time = TransportTime::from_zoned(naive, "America/New_York");

        let expected = Utc.with_ymd_and_hms(2025, 1, 15, 15, 0, 0).unwrap();
        assert_eq!(time.utc, expected.timestamp_millis());
        assert_eq!(time.offset, -5 * 3600 * 1000);
        assert_eq!(time.tzid.as_deref(), Some("America/New_York"));
    }

    #[test]
    fn test_unknown_zone_falls_back_to_floating() {
        let naive = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let time = TransportTime::from_zoned(naive, "Not/AZone");
        assert_eq!(time, TransportTime::from_floating(naive));
    }

    #[test]
    fn test_shift_keeps_zone() {
        let time = TransportTime {
            utc: 10_000,
            offset: 3_600_000,
            tzid: Some("Europe/Paris".into()),
        };
        let shifted = time.shifted_by_secs(-5);
        assert_eq!(shifted.utc, 5_000);
        assert_eq!(shifted.offset, 3_600_000);
        assert_eq!(shifted.tzid, time.tzid);
    }

    #[test]
    fn test_shift_saturates_on_extreme_values() {
        let late = TransportTime {
            utc: i64::MAX - 10,
            offset: 0,
            tzid: None,
        };
        assert_eq!(late.shifted_by_secs(i64::MAX).utc, i64::MAX);
        assert_eq!(late.shifted_by_secs(i64::MIN).utc, i64::MIN + i64::MAX - 10);

        let early = TransportTime {
            utc: i64::MIN,
            offset: 0,
            tzid: None,
        };
        assert_eq!(early.shifted_by_secs(-1).utc, i64::MIN);
        assert_eq!(early.millis_until(&late), Duration::MAX);
    }
}
