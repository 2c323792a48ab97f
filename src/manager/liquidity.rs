//! Provider deposits and withdrawals, routed to the owned pools.

use super::core::VaultManager;
use super::results::ManagerError;
use crate::types::{AccountId, Amount, PoolId};

impl VaultManager {
    /// Deposit into `pool_id` on behalf of `provider`, paid by `payer`.
    /// Returns the total pulled from `payer`.
    pub fn deposit_to_ticks(
        &mut self,
        pool_id: PoolId,
        payer: AccountId,
        provider: AccountId,
        amounts: &[Amount],
        ticks: &[u32],
    ) -> Result<Amount, ManagerError> {
        let pool = self
            .pools
            .get_mut(&pool_id)
            .ok_or(ManagerError::PoolNotFound(pool_id))?;
        Ok(pool.deposit_to_ticks(&mut self.ledger, payer, provider, amounts, ticks)?)
    }

    pub fn withdraw_liquidity(
        &mut self,
        pool_id: PoolId,
        provider: AccountId,
        tick: u32,
        amount: Amount,
    ) -> Result<(), ManagerError> {
        let pool = self
            .pools
            .get_mut(&pool_id)
            .ok_or(ManagerError::PoolNotFound(pool_id))?;
        Ok(pool.withdraw(&mut self.ledger, provider, tick, amount)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::{ManagerConfig, ManagerError, VaultManager};
    use crate::pool::{LiquidityPool, PoolConfig, PoolError};
    use crate::registry::Registry;
    use crate::swap::{FixedRateRouter, SwapAdapter};
    use crate::types::{AccountId, Amount, AssetId, PoolId};

    const MANAGER: AccountId = AccountId(0x100);
    const POOL: AccountId = AccountId(0x200);
    const PROVIDER: AccountId = AccountId(0x300);
    const CASH: AssetId = AssetId(1);

    fn manager() -> VaultManager {
        let router = FixedRateRouter::new(AccountId(0x400), AccountId(0x401));
        let adapter = SwapAdapter::new(AccountId(0x500), Box::new(router), 3000).unwrap();
        let mut manager =
            VaultManager::new(MANAGER, ManagerConfig::default(), Registry::new(AccountId(1)), adapter).unwrap();
        let pool = LiquidityPool::new(PoolId(1), POOL, CASH, MANAGER, PoolConfig::default()).unwrap();
        manager.add_pool(pool).unwrap();
        manager.ledger_mut().mint(CASH, PROVIDER, Amount::from(1000)).unwrap();
        manager
    }

    #[test]
    fn deposit_and_withdraw_through_manager() {
        let mut m = manager();
        let total = m
            .deposit_to_ticks(PoolId(1), PROVIDER, PROVIDER, &[Amount::from(300), Amount::from(200)], &[11_000, 12_000])
            .unwrap();
        assert_eq!(total, Amount::from(500));
        assert_eq!(m.ledger().balance_of(CASH, POOL), Amount::from(500));

        m.withdraw_liquidity(PoolId(1), PROVIDER, 11_000, Amount::from(100)).unwrap();
        let pool = m.pool(PoolId(1)).unwrap();
        assert_eq!(pool.provider_balance(PROVIDER, 11_000), Amount::from(200));
        assert_eq!(m.ledger().balance_of(CASH, PROVIDER), Amount::from(600));
    }

    #[test]
    fn unknown_pool_is_rejected() {
        let mut m = manager();
        let err = m
            .deposit_to_ticks(PoolId(9), PROVIDER, PROVIDER, &[Amount::from(1)], &[11_000])
            .unwrap_err();
        assert_eq!(err, ManagerError::PoolNotFound(PoolId(9)));
    }

    #[test]
    fn length_mismatch_surfaces_from_pool() {
        let mut m = manager();
        let err = m
            .deposit_to_ticks(PoolId(1), PROVIDER, PROVIDER, &[Amount::from(1)], &[11_000, 12_000])
            .unwrap_err();
        assert_eq!(
            err,
            ManagerError::Pool(PoolError::LengthMismatch { ticks: 2, amounts: 1 })
        );
    }

    #[test]
    fn pool_with_foreign_manager_is_rejected() {
        let mut m = manager();
        let pool = LiquidityPool::new(PoolId(2), AccountId(0x201), CASH, AccountId(0x999), PoolConfig::default())
            .unwrap();
        assert!(matches!(m.add_pool(pool), Err(ManagerError::InvalidParameter(_))));
    }
}
