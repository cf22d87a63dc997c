//! Amount normalization between token native precision and the canonical
//! 18-decimal unit used at the client boundary.
//!
//! Scaling down truncates. On-chain amount matching relies on the exact
//! truncated values, so no rounding is ever applied.

use alloy::primitives::U256;
use fastnum::{
    UD256,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};
use itertools::Itertools;

use crate::error::DexError;

/// Number of decimals of canonical amounts.
pub const CANONICAL_DECIMALS: u8 = 18;

/// `10^decimals`, `None` if it does not fit into [`U256`].
fn scale(decimals: u8) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(decimals))
}

/// Rescales `amount` from `from_decimals` to `to_decimals`.
///
/// Scaling up is lossless (saturating at [`U256::MAX`]), scaling down
/// truncates the low-order digits.
pub fn convert(amount: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    if to_decimals > from_decimals {
        scale(to_decimals - from_decimals)
            .map(|factor| amount.saturating_mul(factor))
            .unwrap_or(if amount.is_zero() { U256::ZERO } else { U256::MAX })
    } else if to_decimals < from_decimals {
        scale(from_decimals - to_decimals)
            .map(|factor| amount / factor)
            .unwrap_or(U256::ZERO)
    } else {
        amount
    }
}

/// Token native amount to canonical amount.
pub fn to_canonical(raw: U256, token_decimals: u8) -> U256 {
    convert(raw, token_decimals, CANONICAL_DECIMALS)
}

/// Canonical amount to token native amount, truncating digits the token
/// can not represent.
pub fn to_raw(canonical: U256, token_decimals: u8) -> U256 {
    convert(canonical, CANONICAL_DECIMALS, token_decimals)
}

/// Renders canonical amount with thousands grouping and exactly 18 fractional digits,
/// e.g. `1,234.500000000000000000`.
pub fn format_canonical(amount: U256) -> String {
    let digits = format!(
        "{:0>width$}",
        amount.to_string(),
        width = CANONICAL_DECIMALS as usize + 1
    );
    let (int_part, frac_part) = digits.split_at(digits.len() - CANONICAL_DECIMALS as usize);
    let grouped = int_part
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .join(",");
    format!("{grouped}.{frac_part}")
}

/// Parses human-readable decimal amount (`"1.5"`) into canonical amount.
/// Digits beyond the 18th fractional one are truncated, amounts not fitting
/// into [`U256`] are rejected.
pub fn parse_canonical(value: &str) -> Result<U256, DexError> {
    let decimal = UD256::from_str(
        value.trim(),
        Context::default().with_rounding_mode(RoundingMode::Floor),
    )
    .map_err(|e| DexError::InvalidAmount(format!("{value}: {e}")))?;
    if decimal.is_op_inexact() {
        return Err(DexError::InvalidAmount(format!("{value}: too many digits")));
    }
    Converter::canonical()
        .to_unsigned(decimal)
        .ok_or_else(|| DexError::InvalidAmount(format!("{value}: out of range")))
}

/// Decimal to fixed-point converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Converter {
    decimals: u8,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self { decimals }
    }

    /// Converter of canonical 18-decimal amounts.
    pub fn canonical() -> Self {
        Self::new(CANONICAL_DECIMALS)
    }

    /// Fixed-point representation of the decimal, `None` if it does not fit into [`U256`].
    /// Digits beyond the converter precision are truncated.
    pub fn to_unsigned<const N: usize>(&self, value: UnsignedDecimal<N>) -> Option<U256> {
        let digits = U256::try_from_le_slice(value.digits().to_radix_le(256).as_slice())?;
        if digits.is_zero() {
            return Some(U256::ZERO);
        }
        let shift = self.decimals as i32 - value.fractional_digits_count() as i32;
        if shift >= 0 {
            digits.checked_mul(scale(u8::try_from(shift).ok()?)?)
        } else {
            Some(
                u8::try_from(-shift)
                    .ok()
                    .and_then(scale)
                    .map_or(U256::ZERO, |factor| digits / factor),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use fastnum::udec256;

    use super::*;

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_convert_same_precision() {
        assert_eq!(convert(u(1234567), 6, 6), u(1234567));
        assert_eq!(convert(U256::ZERO, 18, 18), U256::ZERO);
    }

    #[test]
    fn test_convert_scale_up_and_down() {
        assert_eq!(convert(u(1_500_000), 6, 18), u(1_500_000_000_000_000_000));
        assert_eq!(convert(u(1_500_000_000_000_000_000), 18, 6), u(1_500_000));
        // Truncates, never rounds
        assert_eq!(convert(u(1_999_999_999_999), 18, 6), u(1));
        assert_eq!(convert(u(999_999_999_999), 18, 6), U256::ZERO);
    }

    #[test]
    fn test_convert_out_of_range_factor() {
        assert_eq!(convert(u(1), 0, 200), U256::MAX);
        assert_eq!(convert(U256::ZERO, 0, 200), U256::ZERO);
        assert_eq!(convert(U256::MAX, 200, 0), U256::ZERO);
    }

    #[test]
    fn test_raw_canonical_round_trip() {
        for decimals in [0u8, 6, 8, 18] {
            for raw in [0u128, 1, 7, 1_000_000, 123_456_789_012] {
                assert_eq!(to_raw(to_canonical(u(raw), decimals), decimals), u(raw));
            }
        }
    }

    #[test]
    fn test_canonical_raw_truncation() {
        // 1.123456789 with 6 decimals keeps only 1.123456
        let canonical = u(1_123_456_789_000_000_000);
        let raw = to_raw(canonical, 6);
        assert_eq!(raw, u(1_123_456));
        assert_eq!(to_canonical(raw, 6), u(1_123_456_000_000_000_000));
        assert_ne!(to_canonical(raw, 6), canonical);
    }

    #[test]
    fn test_format_canonical() {
        assert_eq!(format_canonical(U256::ZERO), "0.000000000000000000");
        assert_eq!(format_canonical(u(1)), "0.000000000000000001");
        assert_eq!(
            format_canonical(u(1_234_500_000_000_000_000_000)),
            "1,234.500000000000000000"
        );
        assert_eq!(
            format_canonical(u(1_000_000_000_000_000_000_000_000)),
            "1,000,000.000000000000000000"
        );
        assert_eq!(
            format_canonical(u(999_000_000_000_000_000_000)),
            "999.000000000000000000"
        );
    }

    #[test]
    fn test_parse_canonical() {
        assert_eq!(parse_canonical("1.5").unwrap(), u(1_500_000_000_000_000_000));
        assert_eq!(parse_canonical("42").unwrap(), u(42_000_000_000_000_000_000));
        assert_eq!(parse_canonical("0.000000000000000001").unwrap(), u(1));
        assert_eq!(
            parse_canonical("1.0000000000000000019").unwrap(),
            u(1_000_000_000_000_000_001)
        );
        assert!(matches!(
            parse_canonical("abc"),
            Err(DexError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_parse_canonical_out_of_range() {
        assert_eq!(
            parse_canonical("1e59").unwrap(),
            U256::from(10u8).pow(U256::from(77))
        );
        assert!(matches!(
            parse_canonical("1e60"),
            Err(DexError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_canonical(&"1".repeat(70)),
            Err(DexError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_numeric_converter_to_unsigned() {
        assert_eq!(
            Converter::new(6).to_unsigned(udec256!(1234.56789)),
            Some(U256::from(1234567890))
        );
        assert_eq!(
            Converter::new(12).to_unsigned(udec256!(0.00123456789)),
            Some(U256::from(1234567890))
        );
        assert_eq!(
            Converter::new(2).to_unsigned(udec256!(1.239)),
            Some(U256::from(123))
        );
        assert_eq!(Converter::new(0).to_unsigned(udec256!(5e9)), Some(U256::from(5_000_000_000u64)));
    }
}
