//! Decimal parsing shared by every user-entered numeric field.
//!
//! One convention is used everywhere: `.` is the decimal point and `,` is a
//! thousands separator. Surrounding whitespace, a leading `+` and a trailing
//! `%` are tolerated so that values copied from a quote display parse back.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberParseError {
    #[error("value is blank")]
    Blank,
    #[error("'{0}' is not a decimal number")]
    Invalid(String),
    #[error("'{0}' is not a finite number")]
    NotFinite(String),
}

pub fn parse_decimal(raw: &str) -> Result<f64, NumberParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NumberParseError::Blank);
    }

    let body = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    let body = body.strip_prefix('+').unwrap_or(body);
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();

    let value: f64 = cleaned
        .parse()
        .map_err(|_| NumberParseError::Invalid(raw.to_string()))?;
    if !value.is_finite() {
        return Err(NumberParseError::NotFinite(raw.to_string()));
    }
    Ok(value)
}

/// Parses an optional field, collapsing absence and parse failures to `None`.
pub fn parse_field(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| parse_decimal(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_grouped_numbers() {
        assert_eq!(parse_decimal("150").unwrap(), 150.0);
        assert_eq!(parse_decimal(" 1,234.50 ").unwrap(), 1234.5);
        assert_eq!(parse_decimal("-0.75").unwrap(), -0.75);
        assert_eq!(parse_decimal("+2.5%").unwrap(), 2.5);
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse_decimal("   "), Err(NumberParseError::Blank));
        assert!(matches!(
            parse_decimal("12abc"),
            Err(NumberParseError::Invalid(_))
        ));
        assert!(matches!(
            parse_decimal("inf"),
            Err(NumberParseError::NotFinite(_))
        ));
        assert!(parse_field(None).is_none());
        assert!(parse_field(Some("n/a")).is_none());
    }
}
