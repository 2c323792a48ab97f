//! Property-based tests for the protocol math.
//!
//! These tests verify invariants hold under random inputs.

use collar_core::tick_math::{bps_to_tick, price_to_tick, tick_to_bps, tick_to_price};
use collar_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;

// Strategies for generating test data
fn scale_factor_strategy() -> impl Strategy<Value = u32> {
    prop::sample::select(vec![1u32, 2, 4, 5, 8, 10, 16, 20, 25, 40, 50, 100, 125, 200, 250, 500, 1000, 2500, 5000, 10_000])
}

fn unit_price_strategy() -> impl Strategy<Value = Decimal> {
    (1u64..1_000_000_000_000u64).prop_map(Decimal::from)
}

// dust-sized amounts up to a million 18-decimal tokens
fn amount_strategy() -> impl Strategy<Value = Amount> {
    prop_oneof![0u128..1_000_000u128, 0u128..1_000_000_000_000_000_000_000_000u128]
        .prop_map(|v| Amount::new(Decimal::from_i128_with_scale(v as i128, 0)))
}

fn ltv_strategy() -> impl Strategy<Value = Bps> {
    (1u32..=10_000u32).prop_map(Bps)
}

fn strikes_strategy() -> impl Strategy<Value = CollarStrikes> {
    (1i64..10_000i64, 1i64..=10_000i64, 1i64..10_000i64).prop_map(|(initial, ltv, above)| {
        let initial = Decimal::new(initial, 2);
        CollarStrikes {
            put: initial * Decimal::new(ltv, 4),
            initial,
            call: initial + Decimal::new(above, 2),
        }
    })
}

proptest! {
    /// bps that are multiples of the scale factor survive the tick round trip
    #[test]
    fn bps_tick_round_trip(
        f in scale_factor_strategy(),
        k in 0u32..20_000u32,
    ) {
        let bps = k * f;
        let tick = bps_to_tick(bps, f).unwrap();
        prop_assert_eq!(tick_to_bps(tick, f).unwrap(), bps);
    }

    /// 100% in ticks always prices at the unit price
    #[test]
    fn full_unit_tick_prices_at_unit(
        f in scale_factor_strategy(),
        unit in unit_price_strategy(),
    ) {
        let tick = bps_to_tick(10_000, f).unwrap();
        prop_assert_eq!(tick_to_price(tick, f, unit).unwrap(), unit);
    }

    /// price_to_tick inverts tick_to_price
    #[test]
    fn price_tick_round_trip(
        f in scale_factor_strategy(),
        unit in unit_price_strategy(),
        tick in 0u32..1_000_000u32,
    ) {
        let price = tick_to_price(tick, f, unit).unwrap();
        prop_assert_eq!(price_to_tick(price, f, unit).unwrap(), tick);
    }

    /// Higher ticks never price lower
    #[test]
    fn tick_price_is_monotonic(
        f in scale_factor_strategy(),
        unit in unit_price_strategy(),
        tick in 0u32..1_000_000u32,
    ) {
        let low = tick_to_price(tick, f, unit).unwrap();
        let high = tick_to_price(tick + 1, f, unit).unwrap();
        prop_assert!(high > low);
    }

    /// The LTV split never creates or loses cash
    #[test]
    fn split_preserves_cash(
        cash in amount_strategy(),
        ltv in ltv_strategy(),
    ) {
        let split = split_cash(cash, ltv).unwrap();
        prop_assert_eq!(split.unlocked.checked_add(split.locked), Some(cash));
        prop_assert!(split.unlocked <= cash);
        prop_assert_eq!(split.unlocked.value(), split.unlocked.value().trunc());
    }

    /// Borrower payout of a slice stays within [0, 2 * amount] and is whole
    #[test]
    fn payout_is_bounded(
        amount in amount_strategy(),
        strikes in strikes_strategy(),
        price in 1i64..100_000i64,
    ) {
        let payout = borrower_slice_payout(amount, strikes, Decimal::new(price, 2)).unwrap();
        prop_assert!(payout <= amount.checked_add(amount).unwrap());
        prop_assert_eq!(payout.value(), payout.value().trunc());
    }

    /// A higher final price never pays the borrower less
    #[test]
    fn payout_is_monotonic(
        amount in amount_strategy(),
        strikes in strikes_strategy(),
        price in 1i64..100_000i64,
        bump in 1i64..1_000i64,
    ) {
        let low = borrower_slice_payout(amount, strikes, Decimal::new(price, 2)).unwrap();
        let high = borrower_slice_payout(amount, strikes, Decimal::new(price + bump, 2)).unwrap();
        prop_assert!(high >= low);
    }
}
