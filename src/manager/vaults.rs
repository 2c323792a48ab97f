//! Vault opening, cash withdrawal and vault reads.

use super::core::VaultManager;
use super::results::ManagerError;
use crate::events::{CashWithdrawnEvent, EventPayload, VaultOpenedEvent};
use crate::types::{AccountId, Amount, AssetId, PoolId, Price, VaultId};
use crate::vault::{split_cash, AssetSpecifiers, CollarOpts, LiquidityOpts, Vault, VaultState};

/// Everything a new vault record needs once the cash is in the manager's hands.
pub(super) struct NewVault<'a> {
    pub borrower: AccountId,
    pub collateral_asset: AssetId,
    pub collateral_amount: Amount,
    pub cash_asset: AssetId,
    pub cash_amount: Amount,
    pub initial_price: Price,
    pub collar: CollarOpts,
    pub pool_id: PoolId,
    pub ticks: &'a [u32],
    pub amounts: &'a [Amount],
    pub rolled_from: Option<VaultId>,
}

impl VaultManager {
    /// Open a vault: pull collateral from `caller`, swap it to cash, split the
    /// cash by LTV and lock provider liquidity against the locked part.
    /// All or nothing.
    pub fn open_vault(
        &mut self,
        caller: AccountId,
        assets: AssetSpecifiers,
        collar: CollarOpts,
        liquidity: LiquidityOpts,
    ) -> Result<VaultId, ManagerError> {
        let result = self.transact(Some(liquidity.pool_id), None, |m| {
            m.open_vault_inner(caller, &assets, collar, &liquidity)
        });
        if let Err(e) = &result {
            tracing::warn!(%caller, pool = liquidity.pool_id.0, error = %e, "open vault rejected");
        }
        result
    }

    fn open_vault_inner(
        &mut self,
        caller: AccountId,
        assets: &AssetSpecifiers,
        collar: CollarOpts,
        liquidity: &LiquidityOpts,
    ) -> Result<VaultId, ManagerError> {
        // 1. validate against the registry
        if !self.registry.is_supported_collateral_asset(assets.collateral_asset) {
            return Err(ManagerError::InvalidParameter(format!(
                "unsupported collateral asset {}",
                assets.collateral_asset
            )));
        }
        if !self.registry.is_supported_cash_asset(assets.cash_asset) {
            return Err(ManagerError::InvalidParameter(format!(
                "unsupported cash asset {}",
                assets.cash_asset
            )));
        }
        if assets.collateral_amount.is_zero() {
            return Err(ManagerError::InvalidParameter("collateral amount is zero".into()));
        }
        self.validate_collar(collar)?;
        self.validate_counterparties(liquidity.pool_id, assets.cash_asset)?;

        // 2. pull collateral
        self.ledger
            .transfer(assets.collateral_asset, caller, self.address, assets.collateral_amount)?;

        // 3. swap it to cash; the adapter enforces the floor and the balance delta
        let cash_amount = self.adapter.swap(
            &mut self.ledger,
            self.address,
            assets.collateral_asset,
            assets.cash_asset,
            assets.collateral_amount,
            assets.min_cash_amount,
            &assets.swap_data,
        )?;

        let initial_price = cash_amount
            .value()
            .checked_div(assets.collateral_amount.value())
            .and_then(Price::new)
            .ok_or_else(|| ManagerError::InvalidParameter("swap returned no cash".into()))?;

        // 4-7. split, verify, lock, persist
        self.create_vault(NewVault {
            borrower: caller,
            collateral_asset: assets.collateral_asset,
            collateral_amount: assets.collateral_amount,
            cash_asset: assets.cash_asset,
            cash_amount,
            initial_price,
            collar,
            pool_id: liquidity.pool_id,
            ticks: &liquidity.ticks,
            amounts: &liquidity.amounts,
            rolled_from: None,
        })
    }

    /// Expiry must be a registered duration away from now and the LTV a
    /// registered tier.
    pub(super) fn validate_collar(&self, collar: CollarOpts) -> Result<(), ManagerError> {
        let duration = collar
            .expiry
            .seconds_since(self.current_time)
            .filter(|d| self.registry.is_valid_collar_duration(*d))
            .ok_or_else(|| {
                ManagerError::InvalidParameter(format!("expiry {} is not a supported duration away", collar.expiry))
            })?;
        if !self.registry.is_valid_ltv(collar.ltv) {
            return Err(ManagerError::InvalidParameter(format!("unsupported ltv {:?}", collar.ltv)));
        }
        tracing::trace!(duration, ltv = collar.ltv.value(), "collar validated");
        Ok(())
    }

    // the manager must be an authorized taker and the pool an authorized provider
    fn validate_counterparties(&self, pool_id: PoolId, cash_asset: AssetId) -> Result<(), ManagerError> {
        let pool = self.pools.get(&pool_id).ok_or(ManagerError::PoolNotFound(pool_id))?;
        if pool.asset() != cash_asset {
            return Err(ManagerError::InvalidParameter(format!(
                "pool {:?} settles in {}, not {}",
                pool_id,
                pool.asset(),
                cash_asset
            )));
        }
        if !self.registry.is_authorized_taker(self.address) {
            return Err(ManagerError::Unauthorized(self.address));
        }
        if !self.registry.is_authorized_provider(pool.address()) {
            return Err(ManagerError::Unauthorized(pool.address()));
        }
        Ok(())
    }

    /// Split the cash, check the requested lock matches the locked part
    /// exactly, lock it in the pool and store the vault.
    pub(super) fn create_vault(&mut self, new: NewVault<'_>) -> Result<VaultId, ManagerError> {
        let vault_id = VaultId(self.vault_count + 1);
        let split = split_cash(new.cash_amount, new.collar.ltv).ok_or(ManagerError::Overflow(vault_id))?;

        let requested: Amount = new.amounts.iter().sum();
        if requested != split.locked {
            return Err(ManagerError::LiquidityMismatch {
                expected: split.locked,
                provided: requested,
            });
        }

        let pool = self
            .pools
            .get_mut(&new.pool_id)
            .ok_or(ManagerError::PoolNotFound(new.pool_id))?;
        for tick in new.ticks {
            let call = pool.tick_to_price(*tick, new.initial_price.value())?;
            if call <= new.initial_price.value() {
                return Err(ManagerError::InvalidParameter(format!(
                    "tick {} does not strike above the initial price",
                    tick
                )));
            }
        }
        pool.lock(self.address, new.ticks, new.amounts)?;

        let vault = Vault {
            id: vault_id,
            borrower: new.borrower,
            collateral_asset: new.collateral_asset,
            collateral_amount: new.collateral_amount,
            cash_asset: new.cash_asset,
            cash_amount: new.cash_amount,
            opened_at: self.current_time,
            expiry: new.collar.expiry,
            ltv: new.collar.ltv,
            initial_price: new.initial_price,
            unlocked_cash_balance: split.unlocked,
            locked_cash_balance: split.locked,
            pool_id: new.pool_id,
            ticks: new.ticks.to_vec(),
            amounts: new.amounts.to_vec(),
            state: VaultState::Active,
            final_price: None,
            rolled_from: new.rolled_from,
            rolled_into: None,
        };
        self.vaults.insert(vault_id, vault);
        self.vault_count += 1;

        tracing::debug!(
            vault = vault_id.0,
            borrower = %new.borrower,
            cash = %new.cash_amount,
            unlocked = %split.unlocked,
            locked = %split.locked,
            "vault opened"
        );
        self.emit_event(EventPayload::VaultOpened(VaultOpenedEvent {
            vault_id,
            borrower: new.borrower,
            pool_id: new.pool_id,
            collateral_amount: new.collateral_amount,
            cash_amount: new.cash_amount,
            unlocked_cash: split.unlocked,
            locked_cash: split.locked,
            expiry: new.collar.expiry,
        }));
        Ok(vault_id)
    }

    /// Pay `amount` of the vault's unlocked cash to its borrower.
    pub fn withdraw_cash(&mut self, caller: AccountId, vault_id: VaultId, amount: Amount) -> Result<(), ManagerError> {
        let vault = self
            .vaults
            .get(&vault_id)
            .ok_or(ManagerError::VaultNotFound(vault_id))?;
        if vault.borrower != caller {
            tracing::warn!(vault = vault_id.0, %caller, "cash withdrawal rejected");
            return Err(ManagerError::Unauthorized(caller));
        }
        let available = vault.unlocked_cash_balance;
        let remaining = available
            .checked_sub(amount)
            .ok_or(ManagerError::InsufficientBalance {
                requested: amount,
                available,
            })?;
        let cash_asset = vault.cash_asset;

        self.ledger.transfer(cash_asset, self.address, caller, amount)?;
        if let Some(vault) = self.vaults.get_mut(&vault_id) {
            vault.unlocked_cash_balance = remaining;
        }

        tracing::debug!(vault = vault_id.0, borrower = %caller, %amount, "cash withdrawn");
        self.emit_event(EventPayload::CashWithdrawn(CashWithdrawnEvent {
            vault_id,
            borrower: caller,
            amount,
        }));
        Ok(())
    }

    pub fn get_vault(&self, vault_id: VaultId) -> Option<&Vault> {
        self.vaults.get(&vault_id)
    }

    pub fn vault_count(&self) -> u64 {
        self.vault_count
    }

    pub fn vaults_of(&self, borrower: AccountId) -> Vec<&Vault> {
        self.vaults.values().filter(|v| v.borrower == borrower).collect()
    }
}
