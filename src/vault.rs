//! Vault records and collar payoff math.
//!
//! A vault splits the borrower's swap proceeds into an unlocked part (LTV of
//! the cash, claimable right away) and a locked part that sits at risk until
//! expiry. Each `(tick, amount)` slice pairs `amount` of the borrower's locked
//! cash with `amount` of provider liquidity at `tick`.

use crate::types::{AccountId, Amount, AssetId, Bps, PoolId, Price, Timestamp, VaultId, BPS_DENOMINATOR};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Vault lifecycle. Created `Active`; `Settled` and `RolledOver` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultState {
    Active,
    Settled,
    RolledOver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpecifiers {
    pub collateral_asset: AssetId,
    pub collateral_amount: Amount,
    pub cash_asset: AssetId,
    /// Slippage floor for the collateral to cash swap.
    pub min_cash_amount: Amount,
    /// Passed through to the exchange router untouched.
    pub swap_data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollarOpts {
    pub expiry: Timestamp,
    pub ltv: Bps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityOpts {
    pub pool_id: PoolId,
    pub ticks: Vec<u32>,
    pub amounts: Vec<Amount>,
}

/// Parameters for the replacement vault opened by a roll. The pool is the
/// rolled vault's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOpts {
    pub collar: CollarOpts,
    pub ticks: Vec<u32>,
    pub amounts: Vec<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub borrower: AccountId,
    pub collateral_asset: AssetId,
    pub collateral_amount: Amount,
    pub cash_asset: AssetId,
    pub cash_amount: Amount,
    pub opened_at: Timestamp,
    pub expiry: Timestamp,
    pub ltv: Bps,
    /// Cash per collateral unit the collar is struck around.
    pub initial_price: Price,
    pub unlocked_cash_balance: Amount,
    pub locked_cash_balance: Amount,
    pub pool_id: PoolId,
    pub ticks: Vec<u32>,
    pub amounts: Vec<Amount>,
    pub state: VaultState,
    pub final_price: Option<Price>,
    pub rolled_from: Option<VaultId>,
    pub rolled_into: Option<VaultId>,
}

impl Vault {
    pub fn is_active(&self) -> bool {
        self.state == VaultState::Active
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expiry
    }

    /// Price at which the borrower's locked cash is fully lost.
    pub fn put_price(&self) -> Decimal {
        self.initial_price.value() * self.ltv.as_fraction()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashSplit {
    pub unlocked: Amount,
    pub locked: Amount,
}

/// `unlocked = cash * ltv / 10000`, `locked = cash - unlocked`.
/// None only if an LTV above 100% pushes the unlocked part past the maximum amount.
pub fn split_cash(cash: Amount, ltv: Bps) -> Option<CashSplit> {
    let unlocked = cash.mul_div(Decimal::from(ltv.value()), Decimal::from(BPS_DENOMINATOR))?;
    Some(CashSplit {
        unlocked,
        locked: cash.saturating_sub(unlocked),
    })
}

/// Strikes of one collar slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollarStrikes {
    pub put: Decimal,
    pub initial: Decimal,
    pub call: Decimal,
}

/// What the borrower receives for one slice of `amount` at `final_price`.
/// Ranges from 0 (at or below the put) to `2 * amount` (at or above the call).
/// None when `2 * amount` does not fit.
pub fn borrower_slice_payout(amount: Amount, strikes: CollarStrikes, final_price: Decimal) -> Option<Amount> {
    let CollarStrikes { put, initial, call } = strikes;
    if final_price <= put {
        Some(Amount::zero())
    } else if final_price < initial {
        amount.mul_div(final_price - put, initial - put)
    } else if final_price < call {
        amount.checked_add(amount.mul_div(final_price - initial, call - initial)?)
    } else {
        amount.checked_add(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn strikes() -> CollarStrikes {
        CollarStrikes {
            put: dec!(0.9),
            initial: dec!(1),
            call: dec!(1.1),
        }
    }

    #[test]
    fn split_at_ninety_percent() {
        let split = split_cash(Amount::from(1000), Bps(9000)).unwrap();
        assert_eq!(split.unlocked, Amount::from(900));
        assert_eq!(split.locked, Amount::from(100));
    }

    #[test]
    fn split_truncates_unlocked() {
        let split = split_cash(Amount::from(999), Bps(3333)).unwrap();
        // 999 * 0.3333 = 332.9667
        assert_eq!(split.unlocked, Amount::from(332));
        assert_eq!(split.locked, Amount::from(667));
        assert_eq!(split.unlocked.checked_add(split.locked).unwrap(), Amount::from(999));
    }

    #[test]
    fn full_ltv_locks_nothing() {
        let split = split_cash(Amount::from(1000), Bps(10_000)).unwrap();
        assert!(split.locked.is_zero());
    }

    #[test]
    fn payout_below_put_is_zero() {
        assert!(borrower_slice_payout(Amount::from(100), strikes(), dec!(0.5)).unwrap().is_zero());
        assert!(borrower_slice_payout(Amount::from(100), strikes(), dec!(0.9)).unwrap().is_zero());
    }

    #[test]
    fn payout_between_put_and_initial() {
        let payout = borrower_slice_payout(Amount::from(100), strikes(), dec!(0.95)).unwrap();
        assert_eq!(payout, Amount::from(50));
    }

    #[test]
    fn payout_flat_at_initial() {
        assert_eq!(borrower_slice_payout(Amount::from(100), strikes(), dec!(1)).unwrap(), Amount::from(100));
    }

    #[test]
    fn payout_between_initial_and_call() {
        let payout = borrower_slice_payout(Amount::from(100), strikes(), dec!(1.05)).unwrap();
        assert_eq!(payout, Amount::from(150));
    }

    #[test]
    fn payout_capped_at_call() {
        assert_eq!(borrower_slice_payout(Amount::from(100), strikes(), dec!(1.1)).unwrap(), Amount::from(200));
        assert_eq!(borrower_slice_payout(Amount::from(100), strikes(), dec!(5)).unwrap(), Amount::from(200));
    }

    #[test]
    fn token_scale_slice_payouts() {
        // 1e24 base units, a million 18-decimal tokens
        let amount = Amount::new(Decimal::from_i128_with_scale(1_000_000_000_000_000_000_000_000, 0));
        let half = Amount::new(Decimal::from_i128_with_scale(500_000_000_000_000_000_000_000, 0));

        assert_eq!(borrower_slice_payout(amount, strikes(), dec!(0.95)).unwrap(), half);
        let above = borrower_slice_payout(amount, strikes(), dec!(1.05)).unwrap();
        assert_eq!(above, amount.checked_add(half).unwrap());
        let capped = borrower_slice_payout(amount, strikes(), dec!(2)).unwrap();
        assert_eq!(capped, amount.checked_add(amount).unwrap());

        let split = split_cash(amount, Bps(9000)).unwrap();
        assert_eq!(split.locked, Amount::new(Decimal::from_i128_with_scale(100_000_000_000_000_000_000_000, 0)));
    }

    #[test]
    fn payout_that_cannot_fit_is_none() {
        let amount = Amount::new(Decimal::MAX);
        assert_eq!(borrower_slice_payout(amount, strikes(), dec!(5)), None);
    }
}
