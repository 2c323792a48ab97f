//! Vault settlement and rolls.

use super::core::VaultManager;
use super::results::{ManagerError, RollResult, SettlementResult};
use super::vaults::NewVault;
use crate::events::{EventPayload, VaultRolledEvent, VaultSettledEvent};
use crate::pool::TickSettlement;
use crate::types::{AccountId, Amount, Price, VaultId};
use crate::vault::{borrower_slice_payout, CollarStrikes, RollOpts, VaultState};

impl VaultManager {
    /// Settle an expired vault at the TWAP ending at its expiry. Anyone may
    /// call this once the vault has expired.
    pub fn settle_vault(&mut self, vault_id: VaultId) -> Result<SettlementResult, ManagerError> {
        let pool_id = self.vaults.get(&vault_id).map(|v| v.pool_id);
        let result = self.transact(pool_id, Some(vault_id), |m| m.settle_vault_inner(vault_id));
        if let Err(e) = &result {
            tracing::warn!(vault = vault_id.0, error = %e, "settlement rejected");
        }
        result
    }

    fn settle_vault_inner(&mut self, vault_id: VaultId) -> Result<SettlementResult, ManagerError> {
        let vault = self
            .vaults
            .get(&vault_id)
            .ok_or(ManagerError::VaultNotFound(vault_id))?;
        if !vault.is_active() {
            return Err(ManagerError::InvalidState {
                vault_id,
                state: vault.state,
            });
        }
        let now = self.current_time;
        if !vault.is_expired(now) {
            return Err(ManagerError::NotExpired {
                expiry: vault.expiry,
                now,
            });
        }

        // the pair was supported at open; a later delisting must not strand the lock
        let final_price = self.registry.settlement_price(
            vault.collateral_asset,
            vault.cash_asset,
            vault.expiry,
            self.config.twap_window_secs,
        )?;
        let settlement = self.settle_locked(vault_id, final_price)?;
        if let Some(vault) = self.vaults.get_mut(&vault_id) {
            vault.state = VaultState::Settled;
        }
        Ok(settlement)
    }

    /// Close an active vault early at the current TWAP and reopen the
    /// borrower's whole cash position in the same pool under new terms.
    pub fn roll_vault(
        &mut self,
        caller: AccountId,
        vault_id: VaultId,
        opts: RollOpts,
    ) -> Result<RollResult, ManagerError> {
        // the replacement vault locks in the same pool
        let pool_id = self.vaults.get(&vault_id).map(|v| v.pool_id);
        let result = self.transact(pool_id, Some(vault_id), |m| m.roll_vault_inner(caller, vault_id, &opts));
        if let Err(e) = &result {
            tracing::warn!(vault = vault_id.0, %caller, error = %e, "roll rejected");
        }
        result
    }

    fn roll_vault_inner(
        &mut self,
        caller: AccountId,
        vault_id: VaultId,
        opts: &RollOpts,
    ) -> Result<RollResult, ManagerError> {
        let vault = self
            .vaults
            .get(&vault_id)
            .ok_or(ManagerError::VaultNotFound(vault_id))?;
        if vault.borrower != caller {
            return Err(ManagerError::Unauthorized(caller));
        }
        if !vault.is_active() {
            return Err(ManagerError::InvalidState {
                vault_id,
                state: vault.state,
            });
        }
        let now = self.current_time;
        if now > vault.expiry {
            return Err(ManagerError::Expired {
                expiry: vault.expiry,
                now,
            });
        }
        let collateral_asset = vault.collateral_asset;
        let collateral_amount = vault.collateral_amount;
        let cash_asset = vault.cash_asset;
        let pool_id = vault.pool_id;

        // a roll opens a new vault, so the pair must still be supported
        self.validate_collar(opts.collar)?;
        let roll_price = self.registry.get_historical_price(
            collateral_asset,
            cash_asset,
            now,
            self.config.twap_window_secs,
        )?;
        let settlement = self.settle_locked(vault_id, roll_price)?;

        // the borrower's whole cash position moves into the new vault
        let carried_cash = match self.vaults.get_mut(&vault_id) {
            Some(vault) => std::mem::replace(&mut vault.unlocked_cash_balance, Amount::zero()),
            None => return Err(ManagerError::VaultNotFound(vault_id)),
        };

        let new_vault_id = self.create_vault(NewVault {
            borrower: caller,
            collateral_asset,
            collateral_amount,
            cash_asset,
            cash_amount: carried_cash,
            initial_price: roll_price,
            collar: opts.collar,
            pool_id,
            ticks: &opts.ticks,
            amounts: &opts.amounts,
            rolled_from: Some(vault_id),
        })?;

        if let Some(vault) = self.vaults.get_mut(&vault_id) {
            vault.state = VaultState::RolledOver;
            vault.rolled_into = Some(new_vault_id);
        }

        tracing::debug!(old = vault_id.0, new = new_vault_id.0, %roll_price, %carried_cash, "vault rolled");
        self.emit_event(EventPayload::VaultRolled(VaultRolledEvent {
            old_vault_id: vault_id,
            new_vault_id,
            roll_price,
            carried_cash,
        }));
        Ok(RollResult {
            settlement,
            new_vault_id,
            carried_cash,
        })
    }

    // Apply the collar payoff at `final_price` to every slice, move the net
    // cash between manager and pool and credit the borrower's share to the
    // vault's unlocked balance. Leaves the state change to the caller.
    fn settle_locked(&mut self, vault_id: VaultId, final_price: Price) -> Result<SettlementResult, ManagerError> {
        let vault = self
            .vaults
            .get(&vault_id)
            .ok_or(ManagerError::VaultNotFound(vault_id))?
            .clone();
        let pool = self
            .pools
            .get_mut(&vault.pool_id)
            .ok_or(ManagerError::PoolNotFound(vault.pool_id))?;

        let initial = vault.initial_price.value();
        let put = vault.put_price();
        let mut settlements = Vec::with_capacity(vault.ticks.len());
        let mut borrower_payout = Amount::zero();

        for (tick, amount) in vault.ticks.iter().zip(&vault.amounts) {
            let strikes = CollarStrikes {
                put,
                initial,
                call: pool.tick_to_price(*tick, initial)?,
            };
            let payout = borrower_slice_payout(*amount, strikes, final_price.value())
                .ok_or(ManagerError::Overflow(vault_id))?;
            let (provider_gain, provider_loss) = if payout <= *amount {
                (amount.saturating_sub(payout), Amount::zero())
            } else {
                (Amount::zero(), payout.saturating_sub(*amount))
            };
            settlements.push(TickSettlement {
                tick: *tick,
                release: *amount,
                provider_gain,
                provider_loss,
            });
            borrower_payout = borrower_payout
                .checked_add(payout)
                .ok_or(ManagerError::Overflow(vault_id))?;
        }

        pool.settle_ticks(self.address, &mut self.ledger, &settlements)?;

        // the pot is the borrower's locked cash plus the same amount of provider liquidity
        let pot = vault
            .locked_cash_balance
            .checked_add(vault.locked_cash_balance)
            .ok_or(ManagerError::Overflow(vault_id))?;
        let provider_payout = pot.saturating_sub(borrower_payout);
        // the manager's ledger balance covers unlocked + payout, so this is bounded by supply
        let unlocked = vault.unlocked_cash_balance.saturating_add(borrower_payout);
        if let Some(vault) = self.vaults.get_mut(&vault_id) {
            vault.unlocked_cash_balance = unlocked;
            vault.locked_cash_balance = Amount::zero();
            vault.final_price = Some(final_price);
        }

        tracing::debug!(vault = vault_id.0, %final_price, %borrower_payout, %provider_payout, "vault settled");
        self.emit_event(EventPayload::VaultSettled(VaultSettledEvent {
            vault_id,
            final_price,
            borrower_payout,
            provider_payout,
        }));
        Ok(SettlementResult {
            vault_id,
            final_price,
            borrower_payout,
            provider_payout,
        })
    }
}
