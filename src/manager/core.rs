// 6.0 manager/core.rs: vault manager. owns the registry, the token ledger,
// the swap adapter, every pool it locks against and all vault records.

use super::config::ManagerConfig;
use super::results::ManagerError;
use crate::events::{EventLog, EventPayload};
use crate::ledger::TokenLedger;
use crate::pool::LiquidityPool;
use crate::registry::Registry;
use crate::swap::SwapAdapter;
use crate::types::{AccountId, PoolId, Timestamp, VaultId};
use crate::vault::Vault;
use std::collections::BTreeMap;

/** 6.1: manager struct. all vault state lives here */
#[derive(Debug)]
pub struct VaultManager {
    pub(super) address: AccountId,
    pub(super) config: ManagerConfig,
    pub(super) registry: Registry,
    pub(super) ledger: TokenLedger,
    pub(super) adapter: SwapAdapter,
    pub(super) pools: BTreeMap<PoolId, LiquidityPool>,
    pub(super) vaults: BTreeMap<VaultId, Vault>,
    pub(super) vault_count: u64,
    pub(super) current_time: Timestamp,
    pub(super) events: EventLog,
}

impl VaultManager {
    pub fn new(
        address: AccountId,
        config: ManagerConfig,
        registry: Registry,
        adapter: SwapAdapter,
    ) -> Result<Self, ManagerError> {
        if address.is_zero() {
            return Err(ManagerError::InvalidParameter("zero manager address".into()));
        }
        let events = EventLog::with_capacity(config.max_events);
        Ok(Self {
            address,
            config,
            registry,
            ledger: TokenLedger::new(),
            adapter,
            pools: BTreeMap::new(),
            vaults: BTreeMap::new(),
            vault_count: 0,
            current_time: Timestamp::from_secs(0),
            events,
        })
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.current_time = self.current_time.plus(secs);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry mutations stay owner-gated by the registry itself.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TokenLedger {
        &mut self.ledger
    }

    pub fn adapter(&self) -> &SwapAdapter {
        &self.adapter
    }

    /// Take ownership of a pool. The pool must name this manager as its
    /// locking capability.
    pub fn add_pool(&mut self, pool: LiquidityPool) -> Result<PoolId, ManagerError> {
        if pool.manager() != self.address {
            return Err(ManagerError::InvalidParameter(format!(
                "pool {:?} is managed by {}",
                pool.id(),
                pool.manager()
            )));
        }
        let pool_id = pool.id();
        if self.pools.contains_key(&pool_id) {
            return Err(ManagerError::InvalidParameter(format!("pool {:?} already added", pool_id)));
        }
        tracing::debug!(pool = pool_id.0, asset = %pool.asset(), "pool added");
        self.pools.insert(pool_id, pool);
        Ok(pool_id)
    }

    pub fn pool(&self, pool_id: PoolId) -> Option<&LiquidityPool> {
        self.pools.get(&pool_id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &LiquidityPool> {
        self.pools.values()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Run `op` as one unit of work. `op` may change the ledger, the pool
    /// `pool_id`, the vault `vault_id` and create new vaults; on error all of
    /// it, and every event it emitted, is rolled back. Only the touched pool
    /// and vault are snapshotted.
    pub(super) fn transact<T>(
        &mut self,
        pool_id: Option<PoolId>,
        vault_id: Option<VaultId>,
        op: impl FnOnce(&mut Self) -> Result<T, ManagerError>,
    ) -> Result<T, ManagerError> {
        let ledger = self.ledger.checkpoint();
        let pool = pool_id.and_then(|id| self.pools.get(&id).cloned());
        let vault = vault_id.and_then(|id| self.vaults.get(&id).cloned());
        let vault_count = self.vault_count;
        let adapter_events = self.adapter.events().checkpoint();
        let events = self.events.checkpoint();

        let result = op(self);
        if result.is_err() {
            self.ledger.revert_to(ledger);
            if let Some(pool) = pool {
                self.pools.insert(pool.id(), pool);
            }
            if let Some(vault) = vault {
                self.vaults.insert(vault.id, vault);
            }
            // ids are sequential, so everything past the saved count is new
            let _ = self.vaults.split_off(&VaultId(vault_count + 1));
            self.vault_count = vault_count;
            self.adapter.events_mut().revert_to(adapter_events);
            self.events.revert_to(events);
        }
        result
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        self.events.emit(payload);
    }
}
