//! Platform fee split arithmetic.

use serde::Serialize;

use super::errors::SettlementError;

/// How a buyer's payment divides between the platform and the seller.
///
/// Invariant: `platform_fee_sats + seller_payout_sats == total_sats`.
/// The fee is floor division; the integer remainder goes to the seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSplit {
    pub total_sats: u64,
    pub fee_bps: u32,
    pub platform_fee_sats: u64,
    pub seller_payout_sats: u64,
}

/// Computes the platform/seller split for a purchase.
///
/// # Errors
///
/// Rejects non-positive totals and fees outside `[0%, 100%)`.
pub fn calculate_split(total_sats: u64, fee_bps: u32) -> Result<FeeSplit, SettlementError> {
    if total_sats == 0 {
        return Err(SettlementError::InvalidAmount(
            "total must be positive".to_string(),
        ));
    }
    if fee_bps >= 10_000 {
        return Err(SettlementError::InvalidFee(fee_bps));
    }

    // Widened so totals near the full 2.1e15-sat supply cannot overflow
    // the fee product; fee_bps < 10_000 keeps the quotient within u64.
    let platform_fee_sats = (u128::from(total_sats) * u128::from(fee_bps) / 10_000) as u64;
    Ok(FeeSplit {
        total_sats,
        fee_bps,
        platform_fee_sats,
        seller_payout_sats: total_sats - platform_fee_sats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn five_percent_of_100k_is_5000() {
        let split = calculate_split(100_000, 500).unwrap();
        assert_eq!(split.platform_fee_sats, 5_000);
        assert_eq!(split.seller_payout_sats, 95_000);
    }

    #[test]
    fn remainder_goes_to_seller() {
        // 5% of 99 sats floors to 4; the seller gets the odd sat.
        let split = calculate_split(99, 500).unwrap();
        assert_eq!(split.platform_fee_sats, 4);
        assert_eq!(split.seller_payout_sats, 95);
    }

    #[test]
    fn zero_fee_pays_seller_everything() {
        let split = calculate_split(1_000, 0).unwrap();
        assert_eq!(split.platform_fee_sats, 0);
        assert_eq!(split.seller_payout_sats, 1_000);
    }

    #[test]
    fn zero_total_is_rejected() {
        assert!(matches!(
            calculate_split(0, 500),
            Err(SettlementError::InvalidAmount(_))
        ));
    }

    #[test]
    fn total_supply_at_max_fee_does_not_overflow() {
        // All 21M BTC in sats at 99.99%.
        let total = 2_100_000_000_000_000;
        let split = calculate_split(total, 9_999).unwrap();
        assert_eq!(split.platform_fee_sats + split.seller_payout_sats, total);
        assert_eq!(split.platform_fee_sats, 2_099_790_000_000_000);
    }

    #[test]
    fn full_fee_is_rejected() {
        assert!(matches!(
            calculate_split(1_000, 10_000),
            Err(SettlementError::InvalidFee(10_000))
        ));
    }

    proptest! {
        #[test]
        fn split_always_sums_to_total(
            total in 1u64..=2_100_000_000_000_000,
            fee_bps in 0u32..10_000,
        ) {
            let split = calculate_split(total, fee_bps).unwrap();
            prop_assert_eq!(
                split.platform_fee_sats + split.seller_payout_sats,
                total
            );
            prop_assert!(split.platform_fee_sats <= total);
        }
    }
}
