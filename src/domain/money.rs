use thiserror::Error;

/// Amounts are integer minor units (satang, cents, ...). 1 major unit = 100 minor units,
/// so 50.00 = 5000.
pub type MinorUnits = i64;

const MINOR_PER_MAJOR: i64 = 100;

/// Format minor units as a decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
/// Also takes the wider sums used for ledger-wide totals.
pub fn format_minor(amount: impl Into<i128>) -> String {
    let amount: i128 = amount.into();
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let major = abs / MINOR_PER_MAJOR as u128;
    let minor = abs % MINOR_PER_MAJOR as u128;
    format!("{sign}{major}.{minor:02}")
}

/// Parse a decimal string ("50", "50.5", "50.00") into minor units.
/// More than two fractional digits are rejected rather than truncated.
pub fn parse_minor(input: &str) -> Result<MinorUnits, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (major_str, minor_str) = digits.split_once('.').unwrap_or((digits, ""));
    if major_str.is_empty() && minor_str.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }
    if !major_str.chars().all(|c| c.is_ascii_digit())
        || !minor_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseAmountError::InvalidFormat);
    }
    if minor_str.len() > 2 {
        return Err(ParseAmountError::TooPrecise);
    }

    let major: i64 = if major_str.is_empty() {
        0
    } else {
        major_str.parse().map_err(|_| ParseAmountError::Overflow)?
    };
    let minor: i64 = match minor_str.len() {
        0 => 0,
        // "12.5" means 50 minor units
        1 => minor_str.parse::<i64>().map_err(|_| ParseAmountError::InvalidFormat)? * 10,
        _ => minor_str.parse().map_err(|_| ParseAmountError::InvalidFormat)?,
    };

    let amount = major
        .checked_mul(MINOR_PER_MAJOR)
        .and_then(|m| m.checked_add(minor))
        .ok_or(ParseAmountError::Overflow)?;

    Ok(if negative { -amount } else { amount })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid money format")]
    InvalidFormat,
    #[error("at most two decimal places are allowed")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}
