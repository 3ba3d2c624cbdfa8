//! Minor-unit money conversion.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts cross the wire as decimals and are stored as integer minor units
//! (cents), converted here through `rust_decimal::Decimal`.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// Number of fractional digits represented by one minor unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Errors converting between decimal amounts and minor units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The amount has more fractional digits than a minor unit can hold.
    #[error("Amount {0} has more than 2 decimal places")]
    TooPrecise(Decimal),

    /// The amount does not fit in a signed 64-bit count of minor units.
    #[error("Amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// Converts a decimal amount (e.g. `100.50`) into minor units (`10050`).
///
/// The sign is preserved; callers decide whether a sign is acceptable.
///
/// # Errors
///
/// Returns `MoneyError::TooPrecise` for sub-cent amounts and
/// `MoneyError::OutOfRange` when the result overflows `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    let scaled = amount
        .checked_mul(Decimal::from(10_i64.pow(MINOR_UNIT_SCALE)))
        .ok_or(MoneyError::OutOfRange(amount))?;

    if !scaled.fract().is_zero() {
        return Err(MoneyError::TooPrecise(amount));
    }

    scaled.to_i64().ok_or(MoneyError::OutOfRange(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(100.00), 10_000)]
    #[case(dec!(150), 15_000)]
    #[case(dec!(0.01), 1)]
    #[case(dec!(50.5), 5_050)]
    #[case(dec!(-23.45), -2_345)]
    #[case(dec!(0), 0)]
    fn test_to_minor_units(#[case] amount: Decimal, #[case] expected: i64) {
        assert_eq!(to_minor_units(amount), Ok(expected));
    }

    #[test]
    fn test_sub_cent_amount_is_rejected() {
        assert_eq!(
            to_minor_units(dec!(10.001)),
            Err(MoneyError::TooPrecise(dec!(10.001)))
        );
    }

    #[test]
    fn test_out_of_range_amount_is_rejected() {
        let huge = Decimal::from(i64::MAX);
        assert_eq!(to_minor_units(huge), Err(MoneyError::OutOfRange(huge)));
    }
}
