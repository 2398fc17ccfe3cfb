//! Value parsers for money and headcount
//!
//! Pure and deterministic. Errors are values: callers substitute a default
//! instead of propagating a [`ParseError`].
//!
//! Revenue is normalized to USD billions. Recognized unit markers
//! (case-insensitive):
//!
//! | marker                 | factor to USD billions |
//! |------------------------|------------------------|
//! | trillion, tn           | x 1000                 |
//! | billion, bn, b         | x 1                    |
//! | million, mn, m         | / 1000                 |
//! | thousand, k            | / 1 000 000            |
//! | crore, cr              | x 0.12                 |
//! | lakh, lac              | x 0.0012               |
//!
//! The first number carrying a recognized unit wins, so labels and hedges
//! before it ("Revenue: approx. 5 billion") are ignored. Text with no unit
//! marker anywhere is read as raw USD when its first number is at least
//! [`RAW_USD_THRESHOLD`], otherwise as already being in USD billions. Ranges
//! such as `$1B-$10B` yield their leading value. Currency symbols and codes
//! are stripped without conversion.
//!
//! A [`RawValue::Number`] for revenue is already in USD billions: providers
//! that receive numbers in another unit convert them before handing them on.

use crate::types::RawValue;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Unit-less values at or above this are raw USD amounts
pub const RAW_USD_THRESHOLD: f64 = 1_000_000.0;

const CRORE_TO_USD_BILLIONS: f64 = 0.12;
const LAKH_TO_USD_BILLIONS: f64 = 0.0012;

/// Currency symbols and codes stripped before parsing
static CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:us\$|\$|₹|€|£|¥|\b(?:usd|inr|eur|gbp|jpy|cny|aud|cad|sgd|chf)\b|\brs\.?(?:\s|$))")
        .expect("static currency regex")
});

/// A number followed by an optional unit word
static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9][0-9,]*(?:\.[0-9]+)?)\s*([a-z]+)?").expect("static amount regex")
});

/// Parse failure for a money or headcount string
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty value")]
    Empty,

    #[error("no number in '{0}'")]
    NoNumber(String),

    #[error("unrecognized unit '{unit}' in '{input}'")]
    UnrecognizedUnit { unit: String, input: String },

    #[error("'{0}' is not a whole non-negative number")]
    NotInteger(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),
}

/// Parse a revenue string into USD billions
///
/// ```
/// use crqm_wizard::parsers::parse_revenue;
/// assert_eq!(parse_revenue("1.2 Billion").unwrap(), 1.2);
/// assert_eq!(parse_revenue("450 million").unwrap(), 0.45);
/// assert!(parse_revenue("lots").is_err());
/// ```
pub fn parse_revenue(text: &str) -> Result<f64, ParseError> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(ParseError::Empty);
    }

    let stripped = CURRENCY.replace_all(&lowered, " ");

    let mut unitless = None;
    let mut unknown_unit = None;
    for captures in AMOUNT.captures_iter(&stripped) {
        let Some(number) = captures
            .get(1)
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        else {
            continue;
        };

        match captures.get(2).map(|m| m.as_str()) {
            None => {
                unitless.get_or_insert(number);
            }
            Some(unit) => match to_usd_billions(number, unit) {
                Some(value) => return check_finite(value),
                None => {
                    unknown_unit.get_or_insert_with(|| unit.to_string());
                }
            },
        }
    }

    match (unitless, unknown_unit) {
        (Some(number), _) => revenue_from_number(number),
        (None, Some(unit)) => Err(ParseError::UnrecognizedUnit {
            unit,
            input: text.trim().to_string(),
        }),
        (None, None) => Err(ParseError::NoNumber(text.trim().to_string())),
    }
}

/// Apply a unit word; `None` when the unit is not recognized
fn to_usd_billions(number: f64, unit: &str) -> Option<f64> {
    match unit {
        "trillion" | "trillions" | "tn" => Some(number * 1000.0),
        "billion" | "billions" | "bn" | "b" => Some(number),
        "million" | "millions" | "mn" | "m" | "mm" => Some(number / 1000.0),
        "thousand" | "k" => Some(number / 1_000_000.0),
        "crore" | "crores" | "cr" => Some(number * CRORE_TO_USD_BILLIONS),
        "lakh" | "lakhs" | "lac" | "lacs" => Some(number * LAKH_TO_USD_BILLIONS),
        _ => None,
    }
}

/// Normalize a unit-less revenue figure read from text to USD billions
pub fn revenue_from_number(number: f64) -> Result<f64, ParseError> {
    if !number.is_finite() || number < 0.0 {
        return Err(ParseError::OutOfRange(number.to_string()));
    }
    if number >= RAW_USD_THRESHOLD {
        Ok(number / 1_000_000_000.0)
    } else {
        Ok(number)
    }
}

/// Parse a headcount string: separators stripped, remainder must be digits
pub fn parse_employee_count(text: &str) -> Result<u64, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | '\'' | ' ' | '\u{a0}'))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::NotInteger(trimmed.to_string()));
    }

    digits
        .parse::<u64>()
        .map_err(|_| ParseError::OutOfRange(trimmed.to_string()))
}

/// Headcount from a numeric provider value
pub fn employees_from_number(number: f64) -> Result<u64, ParseError> {
    if !number.is_finite() || number < 0.0 || number.fract() != 0.0 {
        return Err(ParseError::NotInteger(number.to_string()));
    }
    if number > u64::MAX as f64 {
        return Err(ParseError::OutOfRange(number.to_string()));
    }
    Ok(number as u64)
}

/// Revenue in USD billions from any raw provider value
pub fn revenue_from_raw(value: &RawValue) -> Result<f64, ParseError> {
    match value {
        RawValue::Text(s) => parse_revenue(s),
        RawValue::Number(n) if n.is_finite() && *n >= 0.0 => Ok(*n),
        RawValue::Number(n) => Err(ParseError::OutOfRange(n.to_string())),
    }
}

/// Headcount from any raw provider value
pub fn employees_from_raw(value: &RawValue) -> Result<u64, ParseError> {
    match value {
        RawValue::Text(s) => parse_employee_count(s),
        RawValue::Number(n) => employees_from_number(*n),
    }
}

fn check_finite(value: f64) -> Result<f64, ParseError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParseError::OutOfRange(value.to_string()))
    }
}
