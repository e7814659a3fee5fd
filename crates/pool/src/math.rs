//! Fixed-point arithmetic at 1e18 scale.
//!
//! All quantities are `u128`. Products are widened to 256 bits before the
//! division so `amount * SCALE` cannot overflow for any representable amount;
//! the quotient is narrowed back with an explicit overflow check.

use primitive_types::U256;

use crate::error::{PoolError, PoolResult};

/// Underlying-asset units, claim units and exchange rates all share this type.
pub type Amount = u128;

/// 1.0 in fixed point.
pub const SCALE: Amount = 1_000_000_000_000_000_000;

/// `a * b / denominator`, truncating toward zero.
pub fn mul_div(a: Amount, b: Amount, denominator: Amount) -> PoolResult<Amount> {
    if denominator == 0 {
        return Err(PoolError::Overflow);
    }
    let product = U256::from(a) * U256::from(b);
    narrow(product / U256::from(denominator))
}

/// Convert underlying units to claim units: `amount * SCALE / rate`.
pub fn to_claim_units(amount: Amount, rate: Amount) -> PoolResult<Amount> {
    mul_div(amount, SCALE, rate)
}

/// Convert claim units to underlying units: `claim_units * rate / SCALE`.
pub fn to_underlying(claim_units: Amount, rate: Amount) -> PoolResult<Amount> {
    mul_div(claim_units, rate, SCALE)
}

pub fn checked_add(a: Amount, b: Amount) -> PoolResult<Amount> {
    a.checked_add(b).ok_or(PoolError::Overflow)
}

fn narrow(value: U256) -> PoolResult<Amount> {
    if value > U256::from(Amount::MAX) {
        return Err(PoolError::Overflow);
    }
    Ok(value.low_u128())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_truncates() {
        assert_eq!(mul_div(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div(2, 1, 3).unwrap(), 0);
    }

    #[test]
    fn wide_intermediate_does_not_overflow() {
        // 1e30 * 1e18 does not fit in u128, but the quotient does.
        let amount: Amount = 1_000_000_000_000 * SCALE;
        assert_eq!(to_claim_units(amount, SCALE).unwrap(), amount);
        assert_eq!(mul_div(Amount::MAX, SCALE, SCALE).unwrap(), Amount::MAX);
    }

    #[test]
    fn oversized_quotient_is_an_overflow() {
        assert_eq!(mul_div(Amount::MAX, 2, 1), Err(PoolError::Overflow));
    }

    #[test]
    fn zero_denominator_is_rejected() {
        assert_eq!(mul_div(1, 1, 0), Err(PoolError::Overflow));
    }

    #[test]
    fn conversions_at_par() {
        assert_eq!(to_claim_units(100, SCALE).unwrap(), 100);
        assert_eq!(to_underlying(100, SCALE).unwrap(), 100);
    }

    #[test]
    fn conversions_round_in_favour_of_the_pool() {
        // Rate 1.5: 10 underlying buys 6.66.. -> 6 claim units,
        // and 7 claim units redeem for 10.5 -> 10 underlying.
        let rate = SCALE + SCALE / 2;
        assert_eq!(to_claim_units(10, rate).unwrap(), 6);
        assert_eq!(to_underlying(7, rate).unwrap(), 10);
    }

    #[test]
    fn checked_ops_report_overflow() {
        assert_eq!(checked_add(Amount::MAX, 1), Err(PoolError::Overflow));
        assert_eq!(checked_add(1, 2).unwrap(), 3);
    }
}
