//! CF-convention time units.

use chrono::NaiveDate;

use crate::error::IoError;

/// Parsed `"<unit> since <reference date>"` time units string.
///
/// The original string is kept verbatim because the archival engine expects
/// the exact units of the source time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    raw: String,
    unit: String,
    reference: NaiveDate,
}

impl TimeUnits {
    /// Parse CF time units such as `"days since 0001-01-01 00:00:00"`.
    ///
    /// Only the date portion of the reference is interpreted; any time of day
    /// is kept in the raw string.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidTime`] when the string is not of the form
    /// `<unit> since <YYYY-MM-DD...>`.
    pub fn parse(units: &str) -> Result<Self, IoError> {
        let parts: Vec<&str> = units.trim().splitn(3, ' ').collect();
        if parts.len() < 3 || parts[1] != "since" {
            return Err(IoError::InvalidTime {
                reason: format!("unexpected time units format: '{units}'"),
            });
        }

        let date_part = parts[2].split(['T', ' ']).next().unwrap_or(parts[2]);
        let reference = parse_reference_date(date_part).ok_or_else(|| IoError::InvalidTime {
            reason: format!("failed to parse reference date '{date_part}'"),
        })?;

        Ok(Self {
            raw: units.trim().to_string(),
            unit: parts[0].to_string(),
            reference,
        })
    }

    /// Units string exactly as found in the file.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The unit word (`days`, `hours`, ...).
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The reference date.
    pub fn reference(&self) -> NaiveDate {
        self.reference
    }
}

/// E3SM may write the year without zero padding (`"days since 1-01-01"`).
fn parse_reference_date(s: &str) -> Option<NaiveDate> {
    let mut fields = s.splitn(3, '-');
    let year: i32 = fields.next()?.parse().ok()?;
    let month: u32 = fields.next()?.parse().ok()?;
    let day: u32 = fields.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_only_reference() {
        let t = TimeUnits::parse("days since 1850-01-01").unwrap();
        assert_eq!(t.unit(), "days");
        assert_eq!(t.reference(), NaiveDate::from_ymd_opt(1850, 1, 1).unwrap());
        assert_eq!(t.as_str(), "days since 1850-01-01");
    }

    #[test]
    fn parses_reference_with_time_of_day() {
        let t = TimeUnits::parse("days since 0001-01-01 00:00:00").unwrap();
        assert_eq!(t.reference(), NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
        assert_eq!(t.as_str(), "days since 0001-01-01 00:00:00");
    }

    #[test]
    fn parses_unpadded_year() {
        let t = TimeUnits::parse("hours since 1-01-01").unwrap();
        assert_eq!(t.unit(), "hours");
        assert_eq!(t.reference(), NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
    }

    #[test]
    fn rejects_missing_since() {
        let err = TimeUnits::parse("days 1850-01-01").unwrap_err();
        assert!(matches!(err, IoError::InvalidTime { .. }));
    }

    #[test]
    fn rejects_bad_date() {
        assert!(TimeUnits::parse("days since 1850-13-01").is_err());
        assert!(TimeUnits::parse("days since yesterday").is_err());
    }
}
