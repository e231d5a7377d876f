//! Fixed-point helpers for on-chain quantities.

use alloy::primitives::{I256, U256};

/// 1e18, the scale of health ratios and USD values
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// 1e6, the scale of USDC-denominated amounts
pub const ONE6: U256 = U256::from_limbs([1_000_000u64, 0, 0, 0]);

pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// A position is liquidatable when its health ratio is known and below 1e18.
/// A zero ratio means the helper could not price it.
#[inline]
pub fn is_at_risk(life: U256) -> bool {
    !life.is_zero() && life < WAD
}

/// `a * b / c`, saturating on overflow and zero on division by zero.
pub fn mul_div(a: U256, b: U256, c: U256) -> U256 {
    if c.is_zero() {
        return U256::ZERO;
    }
    a.checked_mul(b).map(|p| p / c).unwrap_or(U256::MAX)
}

/// Convert to signed, saturating at `I256::MAX`.
pub fn to_signed(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

/// `|value|` as unsigned plus whether it was negative.
pub fn split_sign(value: I256) -> (bool, U256) {
    (value.is_negative(), value.unsigned_abs())
}
