//! Numeric and text encodings the carrier API expects.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Keep only ASCII digits (CPF/CNPJ, CEP, phone numbers).
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Kilograms to an integer gram string, truncating fractions of a gram.
pub fn grams(weight_kg: Decimal) -> String {
    (weight_kg * Decimal::from(1000))
        .trunc()
        .to_i64()
        .unwrap_or(0)
        .to_string()
}

/// Gram value reported by the carrier back to kilograms.
pub fn kilograms(grams: Decimal) -> Decimal {
    (grams / Decimal::from(1000)).normalize()
}

/// Two decimals, `.` separator, regardless of locale.
pub fn money(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Parse a carrier amount that may use a comma as decimal separator.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    Decimal::from_str(&normalized).ok()
}

/// Split a Brazilian phone into area code and subscriber number.
///
/// The subscriber part is capped at nine digits.
pub fn split_phone(phone: &str) -> (String, String) {
    let digits = digits_only(phone);
    if digits.len() < 2 {
        return (String::new(), digits);
    }
    let (area, rest) = digits.split_at(2);
    let number: String = rest.chars().take(9).collect();
    (area.to_string(), number)
}

/// Parse the timestamp shapes the carrier returns.
///
/// Values without an offset are taken as UTC.
pub fn parse_carrier_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(naive.and_utc());
        }
    }
    for pattern in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, pattern) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("123.456.789-09"), "12345678909");
        assert_eq!(digits_only("12.345.678/0001-95"), "12345678000195");
        assert_eq!(digits_only("72910-000"), "72910000");
    }

    #[test]
    fn test_grams_truncates() {
        assert_eq!(grams(Decimal::new(3, 1)), "300");
        assert_eq!(grams(Decimal::new(1, 0)), "1000");
        assert_eq!(grams(Decimal::new(12345, 4)), "1234");
    }

    #[test]
    fn test_kilograms() {
        assert_eq!(kilograms(Decimal::from(300)), Decimal::new(3, 1));
        assert_eq!(kilograms(Decimal::from(1500)).to_string(), "1.5");
    }

    #[test]
    fn test_money_two_decimals() {
        assert_eq!(money(Decimal::from(150)), "150.00");
        assert_eq!(money(Decimal::new(125, 1)), "12.50");
        assert_eq!(money(Decimal::new(10005, 3)), "10.01");
        assert_eq!(money(Decimal::new(-75, 1)), "-7.50");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("25,50"), Some(Decimal::new(2550, 2)));
        assert_eq!(parse_amount("1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("25.50"), Some(Decimal::new(2550, 2)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_split_phone() {
        assert_eq!(
            split_phone("(61) 99876-5432"),
            ("61".to_string(), "998765432".to_string())
        );
        assert_eq!(
            split_phone("61 3333-4444"),
            ("61".to_string(), "33334444".to_string())
        );
        assert_eq!(
            split_phone("+55 (61) 99876-5432"),
            ("55".to_string(), "619987654".to_string())
        );
        assert_eq!(split_phone("9"), (String::new(), "9".to_string()));
        assert_eq!(split_phone(""), (String::new(), String::new()));
    }

    #[test]
    fn test_parse_carrier_datetime_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
            .and_utc();

        assert_eq!(parse_carrier_datetime("2024-03-15T14:30:00"), Some(expected));
        assert_eq!(parse_carrier_datetime("2024-03-15T14:30:00Z"), Some(expected));
        assert_eq!(parse_carrier_datetime("15/03/2024 14:30:00"), Some(expected));
        assert!(parse_carrier_datetime("2024-03-15").is_some());
        assert!(parse_carrier_datetime("yesterday").is_none());
    }
}
