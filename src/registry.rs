//! Protocol configuration registry.
//!
//! Owner-controlled allow-lists of cash assets, collateral assets, collar
//! durations, LTV tiers and authorized counterparty contracts. Enumeration
//! reads are public; every mutation is checked against the stored owner.

use crate::events::{
    AssetSupportChangedEvent, CounterpartyAuthorizationEvent, DurationChangedEvent, EventLog,
    EventPayload, LtvChangedEvent, OwnershipTransferredEvent, PriceRecordedEvent,
};
use crate::oracle::{OracleError, TwapOracle};
use crate::types::{AccountId, AssetId, Bps, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Caller {0} is not the registry owner")]
    Unauthorized(AccountId),

    #[error("Value already tracked in {0}")]
    AlreadyExists(&'static str),

    #[error("Value not tracked in {0}")]
    NotFound(&'static str),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported pair {0}/{1}")]
    UnsupportedPair(AssetId, AssetId),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

/// Which allow-list an asset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetRole {
    Cash,
    Collateral,
}

/// Insertion-ordered set without duplicates. Removal swaps the last element
/// into the freed slot, so order among the remaining elements can change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedSet<T> {
    values: Vec<T>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T: Copy + PartialEq> OrderedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the value was already present.
    pub fn add(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    /// Returns false if the value was absent.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.values.iter().position(|v| v == value) {
            Some(index) => {
                self.values.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.values.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    owner: AccountId,
    cash_assets: OrderedSet<AssetId>,
    collateral_assets: OrderedSet<AssetId>,
    collar_durations: OrderedSet<u64>,
    ltvs: OrderedSet<Bps>,
    authorized_takers: HashMap<AccountId, bool>,
    authorized_providers: HashMap<AccountId, bool>,
    oracle: TwapOracle,
    events: EventLog,
}

impl Registry {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            cash_assets: OrderedSet::new(),
            collateral_assets: OrderedSet::new(),
            collar_durations: OrderedSet::new(),
            ltvs: OrderedSet::new(),
            authorized_takers: HashMap::new(),
            authorized_providers: HashMap::new(),
            oracle: TwapOracle::default(),
            events: EventLog::default(),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    fn check_owner(&self, caller: AccountId) -> Result<(), RegistryError> {
        if caller != self.owner {
            tracing::warn!(%caller, "registry mutation rejected");
            return Err(RegistryError::Unauthorized(caller));
        }
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: AccountId, new_owner: AccountId) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        if new_owner.is_zero() {
            return Err(RegistryError::InvalidParameter("new owner is the zero address".into()));
        }
        self.owner = new_owner;
        self.events.emit(EventPayload::OwnershipTransferred(OwnershipTransferredEvent {
            previous_owner: caller,
            new_owner,
        }));
        Ok(())
    }

    // assets

    fn asset_set_mut(&mut self, role: AssetRole) -> (&mut OrderedSet<AssetId>, &'static str) {
        match role {
            AssetRole::Cash => (&mut self.cash_assets, "supported cash assets"),
            AssetRole::Collateral => (&mut self.collateral_assets, "supported collateral assets"),
        }
    }

    fn add_asset(&mut self, caller: AccountId, role: AssetRole, asset: AssetId) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        let (set, name) = self.asset_set_mut(role);
        if !set.add(asset) {
            return Err(RegistryError::AlreadyExists(name));
        }
        tracing::debug!(%asset, ?role, "asset support added");
        self.events.emit(EventPayload::AssetSupportChanged(AssetSupportChangedEvent {
            asset,
            role,
            supported: true,
        }));
        Ok(())
    }

    fn remove_asset(&mut self, caller: AccountId, role: AssetRole, asset: AssetId) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        let (set, name) = self.asset_set_mut(role);
        if !set.remove(&asset) {
            return Err(RegistryError::NotFound(name));
        }
        tracing::debug!(%asset, ?role, "asset support removed");
        self.events.emit(EventPayload::AssetSupportChanged(AssetSupportChangedEvent {
            asset,
            role,
            supported: false,
        }));
        Ok(())
    }

    pub fn add_supported_cash_asset(&mut self, caller: AccountId, asset: AssetId) -> Result<(), RegistryError> {
        self.add_asset(caller, AssetRole::Cash, asset)
    }

    pub fn remove_supported_cash_asset(&mut self, caller: AccountId, asset: AssetId) -> Result<(), RegistryError> {
        self.remove_asset(caller, AssetRole::Cash, asset)
    }

    pub fn add_supported_collateral_asset(&mut self, caller: AccountId, asset: AssetId) -> Result<(), RegistryError> {
        self.add_asset(caller, AssetRole::Collateral, asset)
    }

    pub fn remove_supported_collateral_asset(
        &mut self,
        caller: AccountId,
        asset: AssetId,
    ) -> Result<(), RegistryError> {
        self.remove_asset(caller, AssetRole::Collateral, asset)
    }

    pub fn is_supported_cash_asset(&self, asset: AssetId) -> bool {
        self.cash_assets.contains(&asset)
    }

    pub fn is_supported_collateral_asset(&self, asset: AssetId) -> bool {
        self.collateral_assets.contains(&asset)
    }

    pub fn is_supported_asset(&self, asset: AssetId) -> bool {
        self.is_supported_cash_asset(asset) || self.is_supported_collateral_asset(asset)
    }

    pub fn cash_assets(&self) -> &OrderedSet<AssetId> {
        &self.cash_assets
    }

    pub fn collateral_assets(&self) -> &OrderedSet<AssetId> {
        &self.collateral_assets
    }

    // durations

    pub fn add_collar_duration(&mut self, caller: AccountId, duration_secs: u64) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        if duration_secs == 0 {
            return Err(RegistryError::InvalidParameter("duration must be non-zero".into()));
        }
        if !self.collar_durations.add(duration_secs) {
            return Err(RegistryError::AlreadyExists("collar durations"));
        }
        self.events.emit(EventPayload::DurationChanged(DurationChangedEvent {
            duration_secs,
            valid: true,
        }));
        Ok(())
    }

    pub fn remove_collar_duration(&mut self, caller: AccountId, duration_secs: u64) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        if !self.collar_durations.remove(&duration_secs) {
            return Err(RegistryError::NotFound("collar durations"));
        }
        self.events.emit(EventPayload::DurationChanged(DurationChangedEvent {
            duration_secs,
            valid: false,
        }));
        Ok(())
    }

    pub fn is_valid_collar_duration(&self, duration_secs: u64) -> bool {
        self.collar_durations.contains(&duration_secs)
    }

    pub fn collar_durations(&self) -> &OrderedSet<u64> {
        &self.collar_durations
    }

    // ltvs

    pub fn add_ltv(&mut self, caller: AccountId, ltv: Bps) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        if !ltv.is_valid_ltv() {
            return Err(RegistryError::InvalidParameter(format!("ltv {} outside (0, 10000]", ltv.value())));
        }
        if !self.ltvs.add(ltv) {
            return Err(RegistryError::AlreadyExists("ltvs"));
        }
        self.events.emit(EventPayload::LtvChanged(LtvChangedEvent { ltv, valid: true }));
        Ok(())
    }

    pub fn remove_ltv(&mut self, caller: AccountId, ltv: Bps) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        if !self.ltvs.remove(&ltv) {
            return Err(RegistryError::NotFound("ltvs"));
        }
        self.events.emit(EventPayload::LtvChanged(LtvChangedEvent { ltv, valid: false }));
        Ok(())
    }

    pub fn is_valid_ltv(&self, ltv: Bps) -> bool {
        self.ltvs.contains(&ltv)
    }

    pub fn ltvs(&self) -> &OrderedSet<Bps> {
        &self.ltvs
    }

    // counterparties

    /// Setting a flag to its current value is a successful no-op.
    pub fn set_counterparty_authorization(
        &mut self,
        caller: AccountId,
        contract: AccountId,
        is_taker: bool,
        allowed: bool,
    ) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        let table = if is_taker {
            &mut self.authorized_takers
        } else {
            &mut self.authorized_providers
        };
        let previous = table.insert(contract, allowed).unwrap_or(false);
        if previous != allowed {
            self.events.emit(EventPayload::CounterpartyAuthorizationSet(CounterpartyAuthorizationEvent {
                contract,
                is_taker,
                allowed,
            }));
        }
        Ok(())
    }

    pub fn is_authorized_taker(&self, contract: AccountId) -> bool {
        self.authorized_takers.get(&contract).copied().unwrap_or(false)
    }

    pub fn is_authorized_provider(&self, contract: AccountId) -> bool {
        self.authorized_providers.get(&contract).copied().unwrap_or(false)
    }

    // prices

    pub fn record_price(
        &mut self,
        caller: AccountId,
        base: AssetId,
        quote: AssetId,
        timestamp: Timestamp,
        price: Price,
    ) -> Result<(), RegistryError> {
        self.check_owner(caller)?;
        self.oracle.record(base, quote, timestamp, price)?;
        self.events.emit(EventPayload::PriceRecorded(PriceRecordedEvent {
            base,
            quote,
            timestamp,
            price,
        }));
        Ok(())
    }

    /// TWAP of `asset_a` in `asset_b` over the window ending at `end`.
    pub fn get_historical_price(
        &self,
        asset_a: AssetId,
        asset_b: AssetId,
        end: Timestamp,
        window_secs: u64,
    ) -> Result<Price, RegistryError> {
        if !self.is_supported_asset(asset_a) || !self.is_supported_asset(asset_b) {
            return Err(RegistryError::UnsupportedPair(asset_a, asset_b));
        }
        self.settlement_price(asset_a, asset_b, end, window_secs)
    }

    /// Same TWAP without the support check. Positions opened while the pair
    /// was supported settle through this, so delisting an asset blocks new
    /// vaults but never strands locked liquidity.
    pub fn settlement_price(
        &self,
        asset_a: AssetId,
        asset_b: AssetId,
        end: Timestamp,
        window_secs: u64,
    ) -> Result<Price, RegistryError> {
        Ok(self.oracle.twap(asset_a, asset_b, end, window_secs)?)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const OWNER: AccountId = AccountId(1);
    const MALLORY: AccountId = AccountId(666);
    const USDC: AssetId = AssetId(1);
    const WETH: AssetId = AssetId(2);
    const THREE_DAYS: u64 = 3 * 24 * 3600;

    #[test]
    fn ordered_set_keeps_insertion_order() {
        let mut set = OrderedSet::new();
        assert!(set.add(3));
        assert!(set.add(1));
        assert!(set.add(2));
        assert!(!set.add(1));
        assert_eq!(set.as_slice(), &[3, 1, 2]);

        assert!(set.remove(&3));
        assert!(!set.remove(&3));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&2));
        assert_eq!(set.get(5), None);
    }

    #[test]
    fn cash_asset_add_remove_cycle() {
        let mut registry = Registry::new(OWNER);
        registry.add_supported_cash_asset(OWNER, USDC).unwrap();
        assert!(registry.is_supported_cash_asset(USDC));
        assert_eq!(registry.cash_assets().len(), 1);
        assert_eq!(registry.cash_assets().get(0), Some(USDC));

        assert_eq!(
            registry.add_supported_cash_asset(OWNER, USDC),
            Err(RegistryError::AlreadyExists("supported cash assets"))
        );

        registry.remove_supported_cash_asset(OWNER, USDC).unwrap();
        assert!(!registry.is_supported_cash_asset(USDC));
        assert!(matches!(
            registry.remove_supported_cash_asset(OWNER, USDC),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn cash_and_collateral_sets_are_independent() {
        let mut registry = Registry::new(OWNER);
        registry.add_supported_collateral_asset(OWNER, WETH).unwrap();
        assert!(registry.is_supported_collateral_asset(WETH));
        assert!(!registry.is_supported_cash_asset(WETH));
        registry.add_supported_cash_asset(OWNER, WETH).unwrap();
        registry.remove_supported_collateral_asset(OWNER, WETH).unwrap();
        assert!(registry.is_supported_cash_asset(WETH));
    }

    #[test]
    fn durations_and_ltvs() {
        let mut registry = Registry::new(OWNER);
        registry.add_collar_duration(OWNER, THREE_DAYS).unwrap();
        assert!(registry.is_valid_collar_duration(THREE_DAYS));
        assert!(matches!(
            registry.add_collar_duration(OWNER, THREE_DAYS),
            Err(RegistryError::AlreadyExists(_))
        ));
        assert!(matches!(
            registry.add_collar_duration(OWNER, 0),
            Err(RegistryError::InvalidParameter(_))
        ));

        registry.add_ltv(OWNER, Bps(9000)).unwrap();
        assert!(registry.is_valid_ltv(Bps(9000)));
        assert!(matches!(registry.add_ltv(OWNER, Bps(0)), Err(RegistryError::InvalidParameter(_))));
        assert!(matches!(
            registry.add_ltv(OWNER, Bps(10_001)),
            Err(RegistryError::InvalidParameter(_))
        ));
        registry.remove_ltv(OWNER, Bps(9000)).unwrap();
        assert!(matches!(registry.remove_ltv(OWNER, Bps(9000)), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn non_owner_cannot_mutate() {
        let mut registry = Registry::new(OWNER);
        registry.add_supported_cash_asset(OWNER, USDC).unwrap();

        assert_eq!(
            registry.add_supported_cash_asset(MALLORY, WETH),
            Err(RegistryError::Unauthorized(MALLORY))
        );
        assert_eq!(
            registry.remove_supported_cash_asset(MALLORY, USDC),
            Err(RegistryError::Unauthorized(MALLORY))
        );
        assert!(registry.add_collar_duration(MALLORY, THREE_DAYS).is_err());
        assert!(registry.add_ltv(MALLORY, Bps(9000)).is_err());
        assert!(registry
            .set_counterparty_authorization(MALLORY, AccountId(5), true, true)
            .is_err());
        assert!(registry.transfer_ownership(MALLORY, MALLORY).is_err());

        assert!(registry.is_supported_cash_asset(USDC));
        assert!(!registry.is_supported_cash_asset(WETH));
        assert!(registry.collar_durations().is_empty());
        assert!(registry.ltvs().is_empty());
        assert!(!registry.is_authorized_taker(AccountId(5)));
        assert_eq!(registry.owner(), OWNER);
    }

    #[test]
    fn counterparty_authorization_is_idempotent() {
        let mut registry = Registry::new(OWNER);
        let pool = AccountId(42);

        registry.set_counterparty_authorization(OWNER, pool, false, true).unwrap();
        let events_after_first = registry.events().events().len();
        registry.set_counterparty_authorization(OWNER, pool, false, true).unwrap();
        assert_eq!(registry.events().events().len(), events_after_first);

        assert!(registry.is_authorized_provider(pool));
        assert!(!registry.is_authorized_taker(pool));

        registry.set_counterparty_authorization(OWNER, pool, false, false).unwrap();
        registry.set_counterparty_authorization(OWNER, pool, false, false).unwrap();
        assert!(!registry.is_authorized_provider(pool));
    }

    #[test]
    fn historical_price_requires_supported_pair() {
        let mut registry = Registry::new(OWNER);
        registry
            .record_price(OWNER, WETH, USDC, Timestamp(0), Price::new_unchecked(dec!(2000)))
            .unwrap();

        assert_eq!(
            registry.get_historical_price(WETH, USDC, Timestamp(10), 60),
            Err(RegistryError::UnsupportedPair(WETH, USDC))
        );

        registry.add_supported_cash_asset(OWNER, USDC).unwrap();
        assert!(registry.get_historical_price(WETH, USDC, Timestamp(10), 60).is_err());

        registry.add_supported_collateral_asset(OWNER, WETH).unwrap();
        let price = registry.get_historical_price(WETH, USDC, Timestamp(10), 60).unwrap();
        assert_eq!(price.value(), dec!(2000));
    }

    #[test]
    fn settlement_price_survives_delisting() {
        let mut registry = Registry::new(OWNER);
        registry.add_supported_cash_asset(OWNER, USDC).unwrap();
        registry.add_supported_collateral_asset(OWNER, WETH).unwrap();
        registry
            .record_price(OWNER, WETH, USDC, Timestamp(0), Price::new_unchecked(dec!(2000)))
            .unwrap();
        registry.remove_supported_collateral_asset(OWNER, WETH).unwrap();

        assert_eq!(
            registry.get_historical_price(WETH, USDC, Timestamp(10), 60),
            Err(RegistryError::UnsupportedPair(WETH, USDC))
        );
        let price = registry.settlement_price(WETH, USDC, Timestamp(10), 60).unwrap();
        assert_eq!(price.value(), dec!(2000));
        assert!(registry.settlement_price(WETH, AssetId(99), Timestamp(10), 60).is_err());
    }

    #[test]
    fn ownership_transfer() {
        let mut registry = Registry::new(OWNER);
        let next = AccountId(2);
        registry.transfer_ownership(OWNER, next).unwrap();
        assert_eq!(registry.owner(), next);
        assert!(registry.add_ltv(OWNER, Bps(5000)).is_err());
        registry.add_ltv(next, Bps(5000)).unwrap();
    }
}
