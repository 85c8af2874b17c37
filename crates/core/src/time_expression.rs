//! Parsing and resolution of schedule endpoints.
//!
//! A [`TimeExpression`] is either an offset from local midnight
//! (`"02:00"`), or an offset from a named solar event (`"sunrise-01:00"`).
//! Parsing is pure text handling; resolving against a concrete date and
//! location is deferred to [`TimeExpression::resolve`].

use chrono::{DateTime, NaiveDate, Utc};

use crate::duration;
use crate::error::ConfigError;
use crate::solar::{self, Location};

#[derive(Debug, Clone, PartialEq)]
pub enum TimeExpression {
    /// Offset from local midnight.
    Absolute(chrono::Duration),
    /// Offset from a named solar event (`"sunrise"`, `"sunset"`, ...).
    Relative {
        reference: String,
        offset: chrono::Duration,
    },
}

impl TimeExpression {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let trimmed = text.trim();

        if let Some(idx) = trimmed.find(['+', '-']) {
            if idx > 0 {
                let reference = &trimmed[..idx];
                let sep = trimmed.as_bytes()[idx] as char;
                let duration_text = &trimmed[idx + 1..];
                if reference.chars().next().is_some_and(|c| c.is_alphabetic()) {
                    let magnitude = duration::parse(duration_text)?;
                    let offset = if sep == '-' { -magnitude } else { magnitude };
                    return Ok(TimeExpression::Relative {
                        reference: reference.to_string(),
                        offset,
                    });
                }
            }
        }

        match duration::parse(trimmed) {
            Ok(offset) => Ok(TimeExpression::Absolute(offset)),
            Err(_) if trimmed.chars().all(|c| c.is_alphabetic()) && !trimmed.is_empty() => {
                Ok(TimeExpression::Relative {
                    reference: trimmed.to_string(),
                    offset: chrono::Duration::zero(),
                })
            }
            Err(_) => Err(ConfigError::BadTimeExpression(text.to_string())),
        }
    }

    /// True if resolving this expression requires a location.
    pub fn needs_location(&self) -> bool {
        matches!(self, TimeExpression::Relative { .. })
    }

    pub fn resolve(
        &self,
        date: NaiveDate,
        midnight_utc: DateTime<Utc>,
        location: Option<Location>,
    ) -> Result<DateTime<Utc>, ConfigError> {
        match self {
            TimeExpression::Absolute(offset) => Ok(midnight_utc + *offset),
            TimeExpression::Relative { reference, offset } => {
                let location = location.ok_or_else(|| {
                    ConfigError::MissingLocation(format!("{reference}{offset:+}"))
                })?;
                let events = solar::events(location, date);
                let base = *events
                    .get(reference.as_str())
                    .ok_or_else(|| ConfigError::UnknownReference(reference.clone()))?;
                Ok(base + *offset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn parses_absolute() {
        assert_eq!(
            TimeExpression::parse("02:00").unwrap(),
            TimeExpression::Absolute(Duration::hours(2))
        );
    }

    #[test]
    fn parses_relative_with_minus() {
        assert_eq!(
            TimeExpression::parse("sunrise-01:00").unwrap(),
            TimeExpression::Relative {
                reference: "sunrise".to_string(),
                offset: Duration::hours(-1),
            }
        );
    }

    #[test]
    fn parses_relative_with_plus() {
        assert_eq!(
            TimeExpression::parse("sunset+00:30").unwrap(),
            TimeExpression::Relative {
                reference: "sunset".to_string(),
                offset: Duration::minutes(30),
            }
        );
    }

    #[test]
    fn parses_bare_reference() {
        assert_eq!(
            TimeExpression::parse("sunrise").unwrap(),
            TimeExpression::Relative {
                reference: "sunrise".to_string(),
                offset: Duration::zero(),
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(TimeExpression::parse("not a time").is_err());
    }

    #[test]
    fn relative_without_location_fails_at_resolve() {
        let expr = TimeExpression::parse("sunrise-01:00").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let midnight = DateTime::from_timestamp(0, 0).unwrap();
        assert!(expr.resolve(date, midnight, None).is_err());
    }
}
