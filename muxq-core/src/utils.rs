//! Utility functions for time parsing and formatting.
//!
//! These helpers are shared by the progress parser and by job and log naming.

/// Parses an ffmpeg elapsed-time token of the form `HH:MM:SS.fraction` into
/// whole seconds. The fractional part is required and discarded.
///
/// Returns `None` for anything else, including ffmpeg's `N/A` and negative
/// timestamps.
#[must_use]
pub fn parse_ffmpeg_time(time: &str) -> Option<u64> {
    let mut parts = time.split(':');
    let hours = parse_digits(parts.next()?)?;
    let minutes = parse_digits(parts.next()?)?;
    let rest = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (secs, fraction) = rest.split_once('.')?;
    let secs = parse_digits(secs)?;
    parse_digits(fraction)?;

    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(secs)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
#[must_use]
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffmpeg_time() {
        assert_eq!(parse_ffmpeg_time("00:00:10.00"), Some(10));
        assert_eq!(parse_ffmpeg_time("01:30:45.99"), Some(5445));
        assert_eq!(parse_ffmpeg_time("00:05:30.5"), Some(330));
        assert_eq!(parse_ffmpeg_time("123:00:00.00"), Some(442_800));
    }

    #[test]
    fn test_parse_ffmpeg_time_rejects_malformed() {
        assert_eq!(parse_ffmpeg_time("N/A"), None);
        assert_eq!(parse_ffmpeg_time("00:00:10"), None);
        assert_eq!(parse_ffmpeg_time("-00:00:00.02"), None);
        assert_eq!(parse_ffmpeg_time("00:00:10."), None);
        assert_eq!(parse_ffmpeg_time("00:10.00"), None);
        assert_eq!(parse_ffmpeg_time("00:00:00:10.00"), None);
        assert_eq!(parse_ffmpeg_time(""), None);
        // Too large to represent in seconds
        assert_eq!(parse_ffmpeg_time("9999999999999999:00:00.00"), None);
        assert_eq!(parse_ffmpeg_time("00:00:99999999999999999999.00"), None);
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 15);
        assert!(ts.chars().enumerate().all(|(i, c)| if i == 8 { c == '_' } else { c.is_ascii_digit() }));
    }
}
