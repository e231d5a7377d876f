//! Human-readable fixed-point numbers for alerts.

use alloy::primitives::{I256, U256};

use crate::u256_math::pow10;

/// Render `amount / 10^decimals` with `shown` fraction digits, rounding half
/// up and grouping thousands, e.g. `1234567890000000000000` → `1,234.57`.
pub fn format_units(amount: U256, decimals: u8, shown: u8) -> String {
    let scaled = if decimals >= shown {
        let divisor = pow10(decimals - shown);
        let quotient = amount / divisor;
        let remainder = amount % divisor;
        if !divisor.is_zero() && remainder >= divisor - remainder {
            quotient + U256::from(1u64)
        } else {
            quotient
        }
    } else {
        amount.saturating_mul(pow10(shown - decimals))
    };

    let unit = pow10(shown);
    let whole = group_thousands(&(scaled / unit).to_string());
    if shown == 0 {
        return whole;
    }
    let fraction = (scaled % unit).to_string();
    format!("{whole}.{fraction:0>width$}", width = shown as usize)
}

/// [`format_units`] for signed values.
pub fn format_signed(amount: I256, decimals: u8, shown: u8) -> String {
    let formatted = format_units(amount.unsigned_abs(), decimals, shown);
    if amount.is_negative() && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{formatted}")
    } else {
        formatted
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
