//! Tick-bucketed liquidity pool.
//!
//! Providers deposit the pool's settlement asset at discrete ticks. The vault
//! manager locks liquidity at those ticks against open vaults and releases it
//! at settlement, applying the provider side of the collar payoff. At every
//! tick `locked <= deposited`, and per-provider balances sum to `deposited`.

use crate::events::{
    EventLog, EventPayload, LiquidityDepositedEvent, LiquidityLockEvent, LiquidityWithdrawnEvent,
    TickSettledEvent,
};
use crate::ledger::{LedgerError, TokenLedger};
use crate::tick_math::{self, TickMathError};
use crate::types::{AccountId, Amount, AssetId, PoolId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Caller {0} may not lock or release liquidity in this pool")]
    Unauthorized(AccountId),

    #[error("Length mismatch: {ticks} ticks, {amounts} amounts")]
    LengthMismatch { ticks: usize, amounts: usize },

    #[error("Insufficient liquidity at tick {tick}: requested {requested}, available {available}")]
    InsufficientLiquidity { tick: u32, requested: Amount, available: Amount },

    #[error("Insufficient available balance at tick {tick}: requested {requested}, available {available}")]
    InsufficientAvailable { tick: u32, requested: Amount, available: Amount },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Arithmetic overflow at tick {0}")]
    Overflow(u32),

    #[error("Tick math error: {0}")]
    TickMath(#[from] TickMathError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Basis points per tick. Must divide 10000.
    pub scale_factor: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { scale_factor: 1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickLiquidity {
    pub deposited: Amount,
    pub locked: Amount,
}

impl TickLiquidity {
    pub fn available(&self) -> Amount {
        self.deposited.saturating_sub(self.locked)
    }
}

/// Provider side of one settled collar slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSettlement {
    pub tick: u32,
    /// Lock released at this tick.
    pub release: Amount,
    /// Cash moved from the manager to the tick's providers.
    pub provider_gain: Amount,
    /// Cash moved from the tick's providers to the manager. Never above `release`.
    pub provider_loss: Amount,
}

#[derive(Debug, Clone)]
pub struct LiquidityPool {
    id: PoolId,
    address: AccountId,
    asset: AssetId,
    manager: AccountId,
    scale_factor: u32,
    ticks: BTreeMap<u32, TickLiquidity>,
    // keyed tick-first so one tick's providers are a contiguous range
    balances: BTreeMap<(u32, AccountId), Amount>,
    events: EventLog,
}

impl LiquidityPool {
    pub fn new(
        id: PoolId,
        address: AccountId,
        asset: AssetId,
        manager: AccountId,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        tick_math::validate_scale_factor(config.scale_factor)?;
        if manager.is_zero() || address.is_zero() {
            return Err(PoolError::InvalidParameter("zero address".into()));
        }
        Ok(Self {
            id,
            address,
            asset,
            manager,
            scale_factor: config.scale_factor,
            ticks: BTreeMap::new(),
            balances: BTreeMap::new(),
            events: EventLog::default(),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn manager(&self) -> AccountId {
        self.manager
    }

    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Strike price of `tick` relative to `unit_price`.
    pub fn tick_to_price(&self, tick: u32, unit_price: Decimal) -> Result<Decimal, PoolError> {
        Ok(tick_math::tick_to_price(tick, self.scale_factor, unit_price)?)
    }

    pub fn bps_to_tick(&self, bps: u32) -> Result<u32, PoolError> {
        Ok(tick_math::bps_to_tick(bps, self.scale_factor)?)
    }

    fn check_manager(&self, caller: AccountId) -> Result<(), PoolError> {
        if caller != self.manager {
            tracing::warn!(pool = self.id.0, %caller, "pool access rejected");
            return Err(PoolError::Unauthorized(caller));
        }
        Ok(())
    }

    // sums duplicate ticks so batch checks see the full request per tick
    fn aggregate(ticks: &[u32], amounts: &[Amount]) -> Result<BTreeMap<u32, Amount>, PoolError> {
        if ticks.len() != amounts.len() {
            return Err(PoolError::LengthMismatch {
                ticks: ticks.len(),
                amounts: amounts.len(),
            });
        }
        let mut per_tick: BTreeMap<u32, Amount> = BTreeMap::new();
        for (tick, amount) in ticks.iter().zip(amounts) {
            let entry = per_tick.entry(*tick).or_insert_with(Amount::zero);
            *entry = entry.checked_add(*amount).ok_or(PoolError::Overflow(*tick))?;
        }
        Ok(per_tick)
    }

    /// Credit `provider` at each tick, pulling the total from `payer`.
    pub fn deposit_to_ticks(
        &mut self,
        ledger: &mut TokenLedger,
        payer: AccountId,
        provider: AccountId,
        amounts: &[Amount],
        ticks: &[u32],
    ) -> Result<Amount, PoolError> {
        let per_tick = Self::aggregate(ticks, amounts)?;
        for tick in per_tick.keys() {
            tick_math::tick_to_bps(*tick, self.scale_factor)?;
        }
        let mut total = Amount::zero();
        for (tick, amount) in &per_tick {
            total = total.checked_add(*amount).ok_or(PoolError::Overflow(*tick))?;
        }
        ledger.transfer(self.asset, payer, self.address, total)?;

        // the ledger accepted `total`, so no tick or balance below can pass the supply
        for (tick, amount) in per_tick {
            if amount.is_zero() {
                continue;
            }
            let level = self.ticks.entry(tick).or_default();
            level.deposited = level.deposited.saturating_add(amount);
            let balance = self.balances.entry((tick, provider)).or_insert_with(Amount::zero);
            *balance = balance.saturating_add(amount);
        }

        tracing::debug!(pool = self.id.0, %provider, %total, "liquidity deposited");
        self.events.emit(EventPayload::LiquidityDeposited(LiquidityDepositedEvent {
            pool_id: self.id,
            provider,
            ticks: ticks.to_vec(),
            amounts: amounts.to_vec(),
        }));
        Ok(total)
    }

    /// Lock liquidity across ticks. All or nothing.
    pub fn lock(&mut self, caller: AccountId, ticks: &[u32], amounts: &[Amount]) -> Result<(), PoolError> {
        self.check_manager(caller)?;
        let per_tick = Self::aggregate(ticks, amounts)?;

        for (tick, requested) in &per_tick {
            let available = self.available_at(*tick);
            if *requested > available {
                return Err(PoolError::InsufficientLiquidity {
                    tick: *tick,
                    requested: *requested,
                    available,
                });
            }
        }

        for (tick, amount) in per_tick {
            if amount.is_zero() {
                continue;
            }
            // checked against available above, so locked stays <= deposited
            let level = self.ticks.entry(tick).or_default();
            level.locked = level.locked.saturating_add(amount);
        }

        tracing::debug!(pool = self.id.0, ?ticks, "liquidity locked");
        self.events.emit(EventPayload::LiquidityLocked(LiquidityLockEvent {
            pool_id: self.id,
            ticks: ticks.to_vec(),
            amounts: amounts.to_vec(),
        }));
        Ok(())
    }

    /// Release locks without any transfer of value. All or nothing.
    pub fn unlock(&mut self, caller: AccountId, ticks: &[u32], amounts: &[Amount]) -> Result<(), PoolError> {
        self.check_manager(caller)?;
        let per_tick = Self::aggregate(ticks, amounts)?;

        for (tick, requested) in &per_tick {
            let locked = self.tick(*tick).locked;
            if *requested > locked {
                return Err(PoolError::InvalidParameter(format!(
                    "unlock of {} exceeds {} locked at tick {}",
                    requested, locked, tick
                )));
            }
        }

        for (tick, amount) in per_tick {
            if let Some(level) = self.ticks.get_mut(&tick) {
                level.locked = level.locked.saturating_sub(amount);
            }
        }

        self.events.emit(EventPayload::LiquidityUnlocked(LiquidityLockEvent {
            pool_id: self.id,
            ticks: ticks.to_vec(),
            amounts: amounts.to_vec(),
        }));
        Ok(())
    }

    /// Release locks and apply each tick's provider P&L, moving the net cash
    /// between the pool and the manager. All or nothing.
    pub fn settle_ticks(
        &mut self,
        caller: AccountId,
        ledger: &mut TokenLedger,
        settlements: &[TickSettlement],
    ) -> Result<(), PoolError> {
        self.check_manager(caller)?;

        let mut ticks = self.ticks.clone();
        let mut balances = self.balances.clone();
        let mut total_gain = Amount::zero();
        let mut total_loss = Amount::zero();

        for s in settlements {
            if s.provider_loss > s.release {
                return Err(PoolError::InvalidParameter(format!(
                    "loss {} exceeds released {} at tick {}",
                    s.provider_loss, s.release, s.tick
                )));
            }
            let level = ticks.entry(s.tick).or_default();
            level.locked = level.locked.checked_sub(s.release).ok_or_else(|| {
                PoolError::InvalidParameter(format!("release of {} exceeds lock at tick {}", s.release, s.tick))
            })?;

            if !s.provider_gain.is_zero() {
                distribute_gain(&mut balances, s.tick, level.deposited, s.provider_gain)?;
                level.deposited = level
                    .deposited
                    .checked_add(s.provider_gain)
                    .ok_or(PoolError::Overflow(s.tick))?;
            }
            if !s.provider_loss.is_zero() {
                distribute_loss(&mut balances, s.tick, level.deposited, s.provider_loss)?;
                level.deposited = level.deposited.saturating_sub(s.provider_loss);
            }
            total_gain = total_gain.checked_add(s.provider_gain).ok_or(PoolError::Overflow(s.tick))?;
            total_loss = total_loss.checked_add(s.provider_loss).ok_or(PoolError::Overflow(s.tick))?;
        }

        if total_gain > total_loss {
            ledger.transfer(self.asset, self.manager, self.address, total_gain.saturating_sub(total_loss))?;
        } else if total_loss > total_gain {
            ledger.transfer(self.asset, self.address, self.manager, total_loss.saturating_sub(total_gain))?;
        }

        self.ticks = ticks;
        self.balances = balances;

        for s in settlements {
            self.events.emit(EventPayload::TickSettled(TickSettledEvent {
                pool_id: self.id,
                tick: s.tick,
                released: s.release,
                provider_gain: s.provider_gain,
                provider_loss: s.provider_loss,
            }));
        }
        tracing::debug!(pool = self.id.0, %total_gain, %total_loss, "ticks settled");
        Ok(())
    }

    /// Withdraw unlocked liquidity. A provider carries a pro-rata share of the
    /// tick's lock, rounded up, and never takes more than the tick has free.
    pub fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        provider: AccountId,
        tick: u32,
        amount: Amount,
    ) -> Result<(), PoolError> {
        let available = self.withdrawable(provider, tick).min(self.available_at(tick));
        if amount > available {
            return Err(PoolError::InsufficientAvailable {
                tick,
                requested: amount,
                available,
            });
        }
        if amount.is_zero() {
            return Ok(());
        }

        ledger.transfer(self.asset, self.address, provider, amount)?;

        let balance = self.provider_balance(provider, tick).saturating_sub(amount);
        if balance.is_zero() {
            self.balances.remove(&(tick, provider));
        } else {
            self.balances.insert((tick, provider), balance);
        }
        let emptied = match self.ticks.get_mut(&tick) {
            Some(level) => {
                level.deposited = level.deposited.saturating_sub(amount);
                level.deposited.is_zero() && level.locked.is_zero()
            }
            None => false,
        };
        if emptied {
            self.ticks.remove(&tick);
        }

        tracing::debug!(pool = self.id.0, %provider, tick, %amount, "liquidity withdrawn");
        self.events.emit(EventPayload::LiquidityWithdrawn(LiquidityWithdrawnEvent {
            pool_id: self.id,
            provider,
            tick,
            amount,
        }));
        Ok(())
    }

    pub fn tick(&self, tick: u32) -> TickLiquidity {
        self.ticks.get(&tick).copied().unwrap_or_default()
    }

    pub fn available_at(&self, tick: u32) -> Amount {
        self.tick(tick).available()
    }

    pub fn provider_balance(&self, provider: AccountId, tick: u32) -> Amount {
        self.balances
            .get(&(tick, provider))
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    /// `ceil(locked * balance / deposited)`, capped at the balance.
    pub fn provider_locked_share(&self, provider: AccountId, tick: u32) -> Amount {
        let level = self.tick(tick);
        let balance = self.provider_balance(provider, tick);
        if level.deposited.is_zero() {
            return Amount::zero();
        }
        // balance <= deposited keeps the result in range; if it ever isn't, treat it all as locked
        balance
            .mul_div_ceil(level.locked.value(), level.deposited.value())
            .map_or(balance, |share| share.min(balance))
    }

    pub fn withdrawable(&self, provider: AccountId, tick: u32) -> Amount {
        self.provider_balance(provider, tick)
            .saturating_sub(self.provider_locked_share(provider, tick))
    }

    pub fn total_deposited(&self) -> Amount {
        self.ticks.values().map(|t| t.deposited).sum()
    }

    pub fn total_locked(&self) -> Amount {
        self.ticks.values().map(|t| t.locked).sum()
    }

    pub fn initialized_ticks(&self) -> Vec<u32> {
        self.ticks.keys().copied().collect()
    }

    pub fn providers_at(&self, tick: u32) -> Vec<(AccountId, Amount)> {
        self.balances
            .range((tick, AccountId(u64::MIN))..=(tick, AccountId(u64::MAX)))
            .map(|((_, provider), amount)| (*provider, *amount))
            .collect()
    }
}

// largest holders first; ties broken by account id
fn providers_by_size(balances: &BTreeMap<(u32, AccountId), Amount>, tick: u32) -> Vec<(AccountId, Amount)> {
    let mut providers: Vec<(AccountId, Amount)> = balances
        .range((tick, AccountId(u64::MIN))..=(tick, AccountId(u64::MAX)))
        .map(|((_, provider), amount)| (*provider, *amount))
        .collect();
    providers.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    providers
}

fn distribute_gain(
    balances: &mut BTreeMap<(u32, AccountId), Amount>,
    tick: u32,
    deposited: Amount,
    gain: Amount,
) -> Result<(), PoolError> {
    let providers = providers_by_size(balances, tick);
    if providers.is_empty() || deposited.is_zero() {
        return Err(PoolError::InvalidParameter(format!("no providers at tick {} to credit", tick)));
    }

    let mut credited = Amount::zero();
    for (provider, balance) in &providers {
        // never hand out more than is left of the gain
        let share = gain
            .mul_div(balance.value(), deposited.value())
            .ok_or(PoolError::Overflow(tick))?
            .min(gain.saturating_sub(credited));
        credited = credited.saturating_add(share);
        let credited_balance = balance.checked_add(share).ok_or(PoolError::Overflow(tick))?;
        balances.insert((tick, *provider), credited_balance);
    }

    let dust = gain.saturating_sub(credited);
    if !dust.is_zero() {
        let (largest, _) = providers[0];
        let entry = balances.entry((tick, largest)).or_insert_with(Amount::zero);
        *entry = entry.checked_add(dust).ok_or(PoolError::Overflow(tick))?;
    }
    Ok(())
}

fn distribute_loss(
    balances: &mut BTreeMap<(u32, AccountId), Amount>,
    tick: u32,
    deposited: Amount,
    loss: Amount,
) -> Result<(), PoolError> {
    let providers = providers_by_size(balances, tick);
    if loss > deposited {
        return Err(PoolError::InvalidParameter(format!("loss {} exceeds deposits at tick {}", loss, tick)));
    }

    let mut debited = Amount::zero();
    let mut remaining: Vec<(AccountId, Amount)> = Vec::with_capacity(providers.len());
    for (provider, balance) in &providers {
        let share = loss
            .mul_div(balance.value(), deposited.value())
            .ok_or(PoolError::Overflow(tick))?
            .min(*balance)
            .min(loss.saturating_sub(debited));
        debited = debited.saturating_add(share);
        remaining.push((*provider, balance.saturating_sub(share)));
    }

    let mut dust = loss.saturating_sub(debited);
    for (_, balance) in remaining.iter_mut() {
        if dust.is_zero() {
            break;
        }
        let take = dust.min(*balance);
        *balance = balance.saturating_sub(take);
        dust = dust.saturating_sub(take);
    }

    for (provider, balance) in remaining {
        if balance.is_zero() {
            balances.remove(&(tick, provider));
        } else {
            balances.insert((tick, provider), balance);
        }
    }
    Ok(())
}
