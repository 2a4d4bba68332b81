//! Integer literal parsing for profile cells and shell arguments.
//!
//! Accepts `0x`/`0o`/`0b` prefixes, an optional sign and `_` digit separators.
//! Plain decimals may not carry leading zeros, so `010` is rejected rather than
//! silently read as ten or eight.

use crate::error::{Error, Result};

/// Parse an integer literal, inferring the base from its prefix.
///
/// # Errors
///
/// Returns [`Error::InvalidNumber`] if the text is not a valid literal or does
/// not fit in an `i64`.
pub fn parse_number(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    let invalid = || Error::InvalidNumber(trimmed.to_string());

    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, digits) = split_radix(unsigned);
    let digits = strip_separators(digits, radix == 10).ok_or_else(invalid)?;
    if !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    if radix == 10 && digits.len() > 1 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0')
    {
        return Err(invalid());
    }

    let magnitude = u64::from_str_radix(&digits, radix).map_err(|_| invalid())?;
    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or_else(invalid)
    } else {
        i64::try_from(magnitude).map_err(|_| invalid())
    }
}

fn split_radix(text: &str) -> (u32, &str) {
    let lower = text.get(..2).map(str::to_ascii_lowercase);
    match lower.as_deref() {
        Some("0x") => (16, &text[2..]),
        Some("0o") => (8, &text[2..]),
        Some("0b") => (2, &text[2..]),
        _ => (10, text),
    }
}

/// Remove `_` separators. After a base prefix a leading `_` is allowed
/// (`0x_ff`); otherwise underscores must sit between digits.
fn strip_separators(digits: &str, decimal: bool) -> Option<String> {
    let body = if decimal {
        digits
    } else {
        digits.strip_prefix('_').unwrap_or(digits)
    };
    if body.is_empty() || body.starts_with('_') || body.ends_with('_') || body.contains("__") {
        return None;
    }
    Some(body.replace('_', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_number("0").unwrap(), 0);
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert_eq!(parse_number("  12 ").unwrap(), 12);
    }

    #[test]
    fn test_parse_prefixed() {
        assert_eq!(parse_number("0x1F").unwrap(), 31);
        assert_eq!(parse_number("0X1f").unwrap(), 31);
        assert_eq!(parse_number("0o17").unwrap(), 15);
        assert_eq!(parse_number("0b101").unwrap(), 5);
    }

    #[test]
    fn test_parse_signed() {
        assert_eq!(parse_number("-16").unwrap(), -16);
        assert_eq!(parse_number("-0x10").unwrap(), -16);
        assert_eq!(parse_number("+8").unwrap(), 8);
    }

    #[test]
    fn test_parse_separators() {
        assert_eq!(parse_number("1_000").unwrap(), 1000);
        assert_eq!(parse_number("0x_ff").unwrap(), 255);
        assert!(parse_number("1__0").is_err());
        assert!(parse_number("_1").is_err());
        assert!(parse_number("1_").is_err());
    }

    #[test]
    fn test_leading_zero_decimal_rejected() {
        assert!(parse_number("010").is_err());
        assert_eq!(parse_number("000").unwrap(), 0);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_number("").is_err());
        assert!(parse_number("0x").is_err());
        assert!(parse_number("abc").is_err());
        assert!(parse_number("0xGG").is_err());
        assert!(parse_number("-").is_err());
        assert!(parse_number("0x+5").is_err());
        assert!(parse_number("--5").is_err());
    }

    #[test]
    fn test_parse_overflow() {
        assert!(parse_number("0xFFFFFFFFFFFFFFFF").is_err());
        assert_eq!(parse_number("-0x8000000000000000").unwrap(), i64::MIN);
    }

    #[test]
    fn test_invalid_number_message() {
        let err = parse_number("bogus").unwrap_err();
        assert_eq!(err.to_string(), "invalid number: bogus");
    }
}
