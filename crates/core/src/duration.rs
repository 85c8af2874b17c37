//! Parsing for the small duration grammar used by time expressions and
//! `button_delay`: `HH:MM`, `HH:MM:SS`, or a bare number of minutes, with an
//! optional leading `-` to negate the whole thing.

use chrono::Duration;

use crate::error::ConfigError;

pub fn parse(text: &str) -> Result<Duration, ConfigError> {
    let text = text.trim();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let parts: Vec<&str> = rest.split(':').collect();
    let magnitude = match parts.as_slice() {
        [minutes] => {
            let minutes: i64 = minutes
                .parse()
                .map_err(|_| ConfigError::BadDuration(text.to_string()))?;
            Duration::minutes(minutes)
        }
        [hours, minutes] => {
            let hours: i64 = hours
                .parse()
                .map_err(|_| ConfigError::BadDuration(text.to_string()))?;
            let minutes: i64 = minutes
                .parse()
                .map_err(|_| ConfigError::BadDuration(text.to_string()))?;
            Duration::hours(hours) + Duration::minutes(minutes)
        }
        [hours, minutes, seconds] => {
            let hours: i64 = hours
                .parse()
                .map_err(|_| ConfigError::BadDuration(text.to_string()))?;
            let minutes: i64 = minutes
                .parse()
                .map_err(|_| ConfigError::BadDuration(text.to_string()))?;
            let seconds: i64 = seconds
                .parse()
                .map_err(|_| ConfigError::BadDuration(text.to_string()))?;
            Duration::hours(hours) + Duration::minutes(minutes) + Duration::seconds(seconds)
        }
        _ => return Err(ConfigError::BadDuration(text.to_string())),
    };

    Ok(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hh_mm() {
        assert_eq!(parse("01:30").unwrap(), Duration::hours(1) + Duration::minutes(30));
    }

    #[test]
    fn parses_bare_minutes() {
        assert_eq!(parse("45").unwrap(), Duration::minutes(45));
    }

    #[test]
    fn parses_negative_offset() {
        assert_eq!(parse("-01:00").unwrap(), Duration::hours(-1));
    }

    #[test]
    fn parses_hh_mm_ss() {
        assert_eq!(
            parse("00:30:15").unwrap(),
            Duration::minutes(30) + Duration::seconds(15)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not-a-duration").is_err());
    }
}
