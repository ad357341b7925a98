//! Time conversion helpers

use chrono::{DateTime, Utc};

/// Convert unix nanoseconds (as sent by OTLP) to a chrono DateTime
pub fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos as i64)
}

/// Truncate a timestamp down to a multiple of `secs` seconds
pub fn truncate_to_secs(dt: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    let ts = dt.timestamp();
    let truncated = ts - ts.rem_euclid(secs);
    DateTime::from_timestamp(truncated, 0).unwrap_or(dt)
}

/// Convert chrono DateTime to time OffsetDateTime (for ClickHouse rows)
pub fn chrono_to_time(dt: DateTime<Utc>) -> time::OffsetDateTime {
    time::OffsetDateTime::from_unix_timestamp_nanos(dt.timestamp_nanos_opt().unwrap_or(0) as i128)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_minute() {
        let dt = DateTime::from_timestamp(1_700_000_059, 123).unwrap();
        let truncated = truncate_to_secs(dt, 60);
        assert_eq!(truncated.timestamp() % 60, 0);
        assert!(truncated <= dt);
        assert!(dt.timestamp() - truncated.timestamp() < 60);
    }

    #[test]
    fn test_truncate_to_fifteen_seconds() {
        let dt = DateTime::from_timestamp(1_700_000_017, 0).unwrap();
        let truncated = truncate_to_secs(dt, 15);
        assert_eq!(truncated.timestamp(), 1_700_000_010);
    }

    #[test]
    fn test_truncate_already_aligned() {
        let dt = DateTime::from_timestamp(1_700_000_040, 0).unwrap();
        assert_eq!(truncate_to_secs(dt, 60).timestamp(), 1_700_000_040);
    }

    #[test]
    fn test_nanos_round_trip() {
        let dt = nanos_to_datetime(1_704_067_200_000_000_000);
        assert_eq!(dt.timestamp(), 1_704_067_200);
    }
}
