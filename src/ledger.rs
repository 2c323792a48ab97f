// 2.0 ledger.rs: MOCKED token balances. just balance changes, no real token contracts.
// every holder (borrower, pool, manager, adapter, router) keeps its balances here.

use std::collections::HashMap;

use crate::types::{AccountId, Amount, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient balance of {asset} for {holder}: requested {requested}, available {available}")]
    InsufficientBalance {
        asset: AssetId,
        holder: AccountId,
        requested: Amount,
        available: Amount,
    },

    #[error("Cannot transfer to the zero address")]
    ZeroRecipient,

    #[error("Supply of {0} would overflow")]
    Overflow(AssetId),
}

/// Opaque snapshot of every balance, taken before a multi-step operation.
#[derive(Debug, Clone)]
pub struct LedgerCheckpoint {
    balances: HashMap<(AssetId, AccountId), Amount>,
    total_supply: HashMap<AssetId, Amount>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    balances: HashMap<(AssetId, AccountId), Amount>,
    total_supply: HashMap<AssetId, Amount>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, asset: AssetId, holder: AccountId) -> Amount {
        self.balances
            .get(&(asset, holder))
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    pub fn total_supply(&self, asset: AssetId) -> Amount {
        self.total_supply.get(&asset).copied().unwrap_or_else(Amount::zero)
    }

    pub fn mint(&mut self, asset: AssetId, to: AccountId, amount: Amount) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroRecipient);
        }
        // every balance is bounded by the supply, so this is the only check needed
        let supply = self
            .total_supply(asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(asset))?;
        let balance = self.balance_of(asset, to).saturating_add(amount);
        self.total_supply.insert(asset, supply);
        self.balances.insert((asset, to), balance);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroRecipient);
        }
        let available = self.balance_of(asset, from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                asset,
                holder: from,
                requested: amount,
                available,
            })?;

        if remaining.is_zero() {
            self.balances.remove(&(asset, from));
        } else {
            self.balances.insert((asset, from), remaining);
        }
        let balance = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(asset))?;
        self.balances.insert((asset, to), balance);

        tracing::trace!(%asset, %from, %to, %amount, "token transfer");
        Ok(())
    }

    pub fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            balances: self.balances.clone(),
            total_supply: self.total_supply.clone(),
        }
    }

    pub fn revert_to(&mut self, checkpoint: LedgerCheckpoint) {
        self.balances = checkpoint.balances;
        self.total_supply = checkpoint.total_supply;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: AssetId = AssetId(1);
    const ALICE: AccountId = AccountId(10);
    const BOB: AccountId = AccountId(11);

    #[test]
    fn mint_and_transfer() {
        let mut ledger = TokenLedger::new();
        ledger.mint(USDC, ALICE, Amount::from(1000)).unwrap();
        ledger.transfer(USDC, ALICE, BOB, Amount::from(400)).unwrap();

        assert_eq!(ledger.balance_of(USDC, ALICE), Amount::from(600));
        assert_eq!(ledger.balance_of(USDC, BOB), Amount::from(400));
        assert_eq!(ledger.total_supply(USDC), Amount::from(1000));
    }

    #[test]
    fn transfer_more_than_balance_fails() {
        let mut ledger = TokenLedger::new();
        ledger.mint(USDC, ALICE, Amount::from(10)).unwrap();

        let result = ledger.transfer(USDC, ALICE, BOB, Amount::from(11));
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(ledger.balance_of(USDC, ALICE), Amount::from(10));
    }

    #[test]
    fn zero_recipient_rejected() {
        let mut ledger = TokenLedger::new();
        assert_eq!(
            ledger.mint(USDC, AccountId::ZERO, Amount::from(1)),
            Err(LedgerError::ZeroRecipient)
        );
    }

    #[test]
    fn mint_past_max_supply_fails() {
        let mut ledger = TokenLedger::new();
        ledger.mint(USDC, ALICE, Amount::new(rust_decimal::Decimal::MAX)).unwrap();

        assert_eq!(ledger.mint(USDC, BOB, Amount::from(1)), Err(LedgerError::Overflow(USDC)));
        assert!(ledger.balance_of(USDC, BOB).is_zero());
        assert_eq!(ledger.total_supply(USDC), Amount::new(rust_decimal::Decimal::MAX));
    }

    #[test]
    fn revert_restores_balances() {
        let mut ledger = TokenLedger::new();
        ledger.mint(USDC, ALICE, Amount::from(100)).unwrap();
        let checkpoint = ledger.checkpoint();

        ledger.transfer(USDC, ALICE, BOB, Amount::from(100)).unwrap();
        ledger.revert_to(checkpoint);

        assert_eq!(ledger.balance_of(USDC, ALICE), Amount::from(100));
        assert!(ledger.balance_of(USDC, BOB).is_zero());
    }
}
