use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::model::ActiveTask;

/// Backend timestamps come both as RFC 3339 and as naive ISO strings (UTC).
pub fn parse_api_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::with_kind(
        crate::error::ErrorKind::Decode,
        format!("unrecognized timestamp '{raw}'"),
    ))
}

pub fn deserialize_api_timestamp<'de, D>(de: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    parse_api_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub fn deserialize_optional_api_timestamp<'de, D>(
    de: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(de)? {
        Some(raw) if !raw.trim().is_empty() => parse_api_timestamp(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// When the backend will release the lock on its own. `None` when
/// `autoUnlockSeconds` puts the deadline outside the representable range.
pub fn unlock_deadline(task: &ActiveTask) -> Option<DateTime<Utc>> {
    Duration::try_seconds(task.auto_unlock_seconds)
        .and_then(|offset| task.last_updated.checked_add_signed(offset))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Remaining(Duration),
    Expired,
    Unknown,
}

impl Countdown {
    pub fn at(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(deadline) = deadline else {
            return Countdown::Unknown;
        };
        let left = deadline.signed_duration_since(now);
        if left <= Duration::zero() {
            Countdown::Expired
        } else {
            Countdown::Remaining(left)
        }
    }

    /// Minute resolution, matching a display refreshed once a minute.
    pub fn label(&self) -> String {
        match self {
            Countdown::Expired => "expired".into(),
            Countdown::Unknown => "unknown".into(),
            Countdown::Remaining(left) => {
                let mins = (left.num_seconds() + 59) / 60;
                let days = mins / (24 * 60);
                let hours = (mins % (24 * 60)) / 60;
                let minutes = mins % 60;
                if days > 0 {
                    format!("{days}d {hours}h {minutes}m left")
                } else if hours > 0 {
                    format!("{hours}h {minutes}m left")
                } else {
                    format!("{minutes}m left")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(last_updated: DateTime<Utc>, secs: i64) -> ActiveTask {
        ActiveTask {
            task_id: 1,
            last_updated,
            auto_unlock_seconds: secs,
        }
    }

    #[test]
    fn deadline_is_last_update_plus_offset() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let d = unlock_deadline(&task(t0, 7200));
        assert_eq!(d, Some(Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()));
    }

    #[test]
    fn out_of_range_unlock_offset_has_no_deadline() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        for secs in [9_000_000_000_000_000, i64::MAX, i64::MIN, 400_000 * 365 * 86_400] {
            assert_eq!(unlock_deadline(&task(t0, secs)), None, "offset {secs}");
        }
        let c = Countdown::at(unlock_deadline(&task(t0, i64::MAX)), t0);
        assert_eq!(c, Countdown::Unknown);
        assert_eq!(c.label(), "unknown");
    }

    #[test]
    fn countdown_labels() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let deadline = t0 + Duration::seconds(2 * 3600 + 5 * 60);
        assert_eq!(Countdown::at(Some(deadline), t0).label(), "2h 5m left");
        assert_eq!(
            Countdown::at(Some(deadline), t0 + Duration::seconds(2 * 3600 + 4 * 60 + 30)).label(),
            "1m left"
        );
        assert_eq!(Countdown::at(Some(deadline), deadline).label(), "expired");
    }

    #[test]
    fn parses_naive_and_rfc3339_timestamps() {
        let a = parse_api_timestamp("2019-10-02T08:45:00.553060").unwrap();
        let b = parse_api_timestamp("2019-10-02T08:45:00.553060Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_api_timestamp("yesterday").is_err());
    }
}
