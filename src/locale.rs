// 🗓️ Locale Value Parsers
// The bank writes dates as DD.MM.YYYY and amounts as 1.234,56

use crate::error::ParseError;
use crate::money::Money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMAT: &str = "%d.%m.%Y";

/// Parse a `DD.MM.YYYY` date. Empty input is an error, never a default.
pub fn parse_date(input: &str) -> Result<NaiveDate, ParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ParseError::EmptyDate);
    }

    // chrono accepts "5.1.24"; the export always pads to DD.MM.YYYY
    let widths: Vec<usize> = s.split('.').map(str::len).collect();
    if widths != [2, 2, 4] || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(ParseError::InvalidDate(s.to_string()));
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| ParseError::InvalidDate(s.to_string()))
}

/// Parse an amount using "." as thousands separator and "," as decimal mark.
///
/// `"1.234,56"` → 1234.56, `"-45,00"` → -45.00. The value is parsed exactly
/// and rounded to cents.
pub fn parse_amount(input: &str) -> Result<Money, ParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ParseError::EmptyAmount);
    }

    let canonical = s.replace('.', "").replace(',', ".");
    let value = Decimal::from_str(&canonical).map_err(|_| ParseError::InvalidAmount(s.to_string()))?;

    Money::from_decimal(value).ok_or_else(|| ParseError::AmountOutOfRange(s.to_string()))
}
