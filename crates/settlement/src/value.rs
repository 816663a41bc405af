//! Present/future value conversion
//!
//! Pure fixed-point arithmetic, no state. All divisions truncate toward
//! zero; the resulting dust (at most one unit per conversion) is never
//! redistributed to either party.

use common::{UnitPrice, PRICE_SCALE};

use crate::error::SettlementError;
use crate::Result;

/// Convert a present-value amount into the future value due at maturity.
///
/// `fv = floor(amount * PRICE_SCALE / unit_price)`
pub fn present_to_future(amount: u64, unit_price: UnitPrice) -> Result<u64> {
    let fv = (amount as u128) * (PRICE_SCALE as u128) / (unit_price.as_u64() as u128);
    u64::try_from(fv)
        .map_err(|_| SettlementError::AmountOverflow(format!("{amount} pv at {unit_price}")))
}

/// Convert a future value back into its present-value equivalent.
///
/// `pv = floor(future_value * unit_price / PRICE_SCALE)`
pub fn future_to_present(future_value: u64, unit_price: UnitPrice) -> Result<u64> {
    let pv = (future_value as u128) * (unit_price.as_u64() as u128) / (PRICE_SCALE as u128);
    u64::try_from(pv)
        .map_err(|_| SettlementError::AmountOverflow(format!("{future_value} fv at {unit_price}")))
}

/// Signed variant of [`future_to_present`] for netted positions.
///
/// Truncates toward zero for both signs.
pub fn future_to_present_signed(future_value: i64, unit_price: UnitPrice) -> Result<i64> {
    let pv = (future_value as i128) * (unit_price.as_u64() as i128) / (PRICE_SCALE as i128);
    i64::try_from(pv)
        .map_err(|_| SettlementError::AmountOverflow(format!("{future_value} fv at {unit_price}")))
}

/// Validate a raw unit price coming from an external caller.
///
/// `0` is the market-order sentinel at the order-entry layer and must
/// never reach conversion arithmetic.
pub fn checked_unit_price(raw: u64) -> Result<UnitPrice> {
    UnitPrice::try_new(raw).ok_or(SettlementError::PriceOutOfRange(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(raw: u64) -> UnitPrice {
        UnitPrice::try_new(raw).unwrap()
    }

    #[test]
    fn test_present_to_future_at_discount() {
        // 100000 pv at 8000 -> 125000 fv
        assert_eq!(present_to_future(100_000, price(8_000)).unwrap(), 125_000);
    }

    #[test]
    fn test_present_to_future_at_par() {
        assert_eq!(present_to_future(100_000, UnitPrice::PAR).unwrap(), 100_000);
    }

    #[test]
    fn test_future_to_present() {
        assert_eq!(future_to_present(125_000, price(8_000)).unwrap(), 100_000);
    }

    #[test]
    fn test_truncation_rounds_toward_zero() {
        // 100 * 10000 / 9999 = 100.01 -> 100
        assert_eq!(present_to_future(100, price(9_999)).unwrap(), 100);
        // 999 * 9999 / 10000 = 998.9 -> 998
        assert_eq!(future_to_present(999, price(9_999)).unwrap(), 998);
    }

    #[test]
    fn test_round_trip_loses_at_most_one_unit() {
        for raw in [1u64, 2, 99, 5_000, 8_000, 9_999, 10_000] {
            let p = price(raw);
            for amount in [0u64, 1, 7, 100, 99_999, 100_000, 123_456_789] {
                let fv = present_to_future(amount, p).unwrap();
                let back = future_to_present(fv, p).unwrap();
                assert!(back <= amount, "round trip grew: {amount} @ {raw}");
                assert!(amount - back <= 1, "round trip lost too much: {amount} @ {raw}");
            }
        }
    }

    #[test]
    fn test_overflow_is_rejected() {
        // u64::MAX pv at price 1 would need 10000 * u64::MAX fv
        assert!(matches!(
            present_to_future(u64::MAX, price(1)),
            Err(SettlementError::AmountOverflow(_))
        ));
        // converting back down never overflows
        assert!(future_to_present(u64::MAX, price(1)).is_ok());
    }

    #[test]
    fn test_checked_unit_price() {
        assert!(checked_unit_price(0).is_err());
        assert!(checked_unit_price(10_001).is_err());
        assert_eq!(checked_unit_price(8_000).unwrap().as_u64(), 8_000);
    }

    #[test]
    fn test_signed_conversion_truncates_toward_zero() {
        assert_eq!(future_to_present_signed(125_000, price(8_000)).unwrap(), 100_000);
        assert_eq!(future_to_present_signed(-125_000, price(8_000)).unwrap(), -100_000);
        // -999 * 9999 / 10000 = -998.9 -> -998 (toward zero)
        assert_eq!(future_to_present_signed(-999, price(9_999)).unwrap(), -998);
    }
}
