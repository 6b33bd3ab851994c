//! Epoch-second timestamps as stored in the database.

use chrono::{DateTime, Utc};

/// Converts epoch seconds to an absolute UTC timestamp.
///
/// Zero means "unset" and maps to `None`, never to 1970-01-01.
pub fn utc_from_unix(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_unset() {
        assert_eq!(utc_from_unix(0), None);
    }

    #[test]
    fn test_known_instant() {
        let t = utc_from_unix(1_000_000_000).unwrap();
        assert_eq!(t.to_rfc3339(), "2001-09-09T01:46:40+00:00");
    }

    #[test]
    fn test_negative_is_before_epoch() {
        let t = utc_from_unix(-86_400).unwrap();
        assert_eq!(t.to_rfc3339(), "1969-12-31T00:00:00+00:00");
    }
}
