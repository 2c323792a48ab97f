// 5.0 swap.rs: exact-input swaps through an external exchange router.
// the adapter never trusts the router's reported output: it measures its own
// balance delta and rejects any disagreement.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::events::{EventLog, EventPayload, SwapExecutedEvent};
use crate::ledger::{LedgerError, TokenLedger};
use crate::types::{AccountId, Amount, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("Router reports a zero-address factory")]
    InvalidRouter,

    #[error("Fee tier {0} is not one of 100, 500, 3000, 10000")]
    InvalidFeeTier(u32),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Slippage exceeded: minimum {minimum}, received {received}")]
    SlippageExceeded { minimum: Amount, received: Amount },

    #[error("Balance mismatch: router reported {reported}, adapter received {received}")]
    BalanceMismatch { reported: Amount, received: Amount },

    #[error("Router failure: {0}")]
    Router(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

// fee tiers in hundredths of a basis point, as the exchange encodes them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeTier {
    Lowest,
    Low,
    Medium,
    High,
}

impl FeeTier {
    pub fn value(&self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10_000,
        }
    }
}

impl TryFrom<u32> for FeeTier {
    type Error = SwapError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            100 => Ok(FeeTier::Lowest),
            500 => Ok(FeeTier::Low),
            3000 => Ok(FeeTier::Medium),
            10_000 => Ok(FeeTier::High),
            other => Err(SwapError::InvalidFeeTier(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub token_in: AssetId,
    pub token_out: AssetId,
    pub fee_tier: FeeTier,
    pub recipient: AccountId,
    pub amount_in: Amount,
    pub min_amount_out: Amount,
    pub data: Vec<u8>,
}

// External exchange router. Implementations pull `amount_in` from `payer`,
// deliver `token_out` to `request.recipient` and report the amount delivered.
pub trait SwapRouter: std::fmt::Debug {
    fn address(&self) -> AccountId;

    fn factory(&self) -> AccountId;

    fn exact_input_single(
        &mut self,
        ledger: &mut TokenLedger,
        payer: AccountId,
        request: &SwapRequest,
    ) -> Result<Amount, SwapError>;
}

#[derive(Debug)]
pub struct SwapAdapter {
    address: AccountId,
    router: Box<dyn SwapRouter + Send + Sync>,
    fee_tier: FeeTier,
    events: EventLog,
}

impl SwapAdapter {
    pub fn new(
        address: AccountId,
        router: Box<dyn SwapRouter + Send + Sync>,
        fee_tier: u32,
    ) -> Result<Self, SwapError> {
        if router.factory().is_zero() {
            return Err(SwapError::InvalidRouter);
        }
        let fee_tier = FeeTier::try_from(fee_tier)?;
        Ok(Self {
            address,
            router,
            fee_tier,
            events: EventLog::default(),
        })
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn router_address(&self) -> AccountId {
        self.router.address()
    }

    pub fn fee_tier(&self) -> FeeTier {
        self.fee_tier
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }

    /// Swap `amount_in` of `token_in` held by `caller` into `token_out`, paying
    /// the verified output back to `caller`. Ledger changes are rolled back on failure.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &mut self,
        ledger: &mut TokenLedger,
        caller: AccountId,
        token_in: AssetId,
        token_out: AssetId,
        amount_in: Amount,
        min_amount_out: Amount,
        data: &[u8],
    ) -> Result<Amount, SwapError> {
        let checkpoint = ledger.checkpoint();
        let result = self.execute(ledger, caller, token_in, token_out, amount_in, min_amount_out, data);
        if let Err(e) = &result {
            tracing::warn!(%caller, %token_in, %token_out, %amount_in, error = %e, "swap reverted");
            ledger.revert_to(checkpoint);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        ledger: &mut TokenLedger,
        caller: AccountId,
        token_in: AssetId,
        token_out: AssetId,
        amount_in: Amount,
        min_amount_out: Amount,
        data: &[u8],
    ) -> Result<Amount, SwapError> {
        if amount_in.is_zero() {
            return Err(SwapError::InvalidParameter("amount_in must be non-zero"));
        }
        if token_in == token_out {
            return Err(SwapError::InvalidParameter("token_in equals token_out"));
        }

        ledger.transfer(token_in, caller, self.address, amount_in)?;

        let balance_before = ledger.balance_of(token_out, self.address);
        let request = SwapRequest {
            token_in,
            token_out,
            fee_tier: self.fee_tier,
            recipient: self.address,
            amount_in,
            min_amount_out,
            data: data.to_vec(),
        };
        let reported = self.router.exact_input_single(ledger, self.address, &request)?;

        if reported < min_amount_out {
            return Err(SwapError::SlippageExceeded {
                minimum: min_amount_out,
                received: reported,
            });
        }

        let balance_after = ledger.balance_of(token_out, self.address);
        let received = balance_after.saturating_sub(balance_before);
        if balance_after < balance_before || received != reported {
            return Err(SwapError::BalanceMismatch { reported, received });
        }

        ledger.transfer(token_out, self.address, caller, reported)?;

        tracing::debug!(%caller, %token_in, %token_out, %amount_in, amount_out = %reported, "swap executed");
        self.events.emit(EventPayload::SwapExecuted(SwapExecutedEvent {
            token_in,
            token_out,
            amount_in,
            amount_out: reported,
        }));
        Ok(reported)
    }
}

/// In-memory router quoting fixed rates out of its own reserves. `shortfall`
/// makes it deliver less than it reports, which is how a malicious router looks.
#[derive(Debug, Clone)]
pub struct FixedRateRouter {
    address: AccountId,
    factory: AccountId,
    rates: HashMap<(AssetId, AssetId), Decimal>,
    shortfall: Amount,
}

impl FixedRateRouter {
    pub fn new(address: AccountId, factory: AccountId) -> Self {
        Self {
            address,
            factory,
            rates: HashMap::new(),
            shortfall: Amount::zero(),
        }
    }

    // amount_out = amount_in * rate, truncated
    pub fn with_rate(mut self, token_in: AssetId, token_out: AssetId, rate: Decimal) -> Self {
        self.rates.insert((token_in, token_out), rate);
        self
    }

    pub fn with_shortfall(mut self, shortfall: Amount) -> Self {
        self.shortfall = shortfall;
        self
    }

    pub fn quote(&self, token_in: AssetId, token_out: AssetId, amount_in: Amount) -> Option<Amount> {
        self.rates
            .get(&(token_in, token_out))
            .and_then(|rate| amount_in.value().checked_mul(*rate))
            .map(|out| Amount::new(out.trunc()))
    }
}

impl SwapRouter for FixedRateRouter {
    fn address(&self) -> AccountId {
        self.address
    }

    fn factory(&self) -> AccountId {
        self.factory
    }

    fn exact_input_single(
        &mut self,
        ledger: &mut TokenLedger,
        payer: AccountId,
        request: &SwapRequest,
    ) -> Result<Amount, SwapError> {
        let amount_out = self
            .quote(request.token_in, request.token_out, request.amount_in)
            .ok_or_else(|| SwapError::Router(format!("no quote for {}/{}", request.token_in, request.token_out)))?;

        ledger.transfer(request.token_in, payer, self.address, request.amount_in)?;
        let delivered = amount_out.saturating_sub(self.shortfall);
        ledger.transfer(request.token_out, self.address, request.recipient, delivered)?;
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const WETH: AssetId = AssetId(1);
    const USDC: AssetId = AssetId(2);
    const ROUTER: AccountId = AccountId(100);
    const FACTORY: AccountId = AccountId(101);
    const ADAPTER: AccountId = AccountId(102);
    const USER: AccountId = AccountId(7);

    fn setup(router: FixedRateRouter) -> (SwapAdapter, TokenLedger) {
        let mut ledger = TokenLedger::new();
        ledger.mint(WETH, USER, Amount::from(10_000)).unwrap();
        ledger.mint(USDC, ROUTER, Amount::from(1_000_000)).unwrap();
        let adapter = SwapAdapter::new(ADAPTER, Box::new(router), 3000).unwrap();
        (adapter, ledger)
    }

    fn router() -> FixedRateRouter {
        FixedRateRouter::new(ROUTER, FACTORY).with_rate(WETH, USDC, dec!(0.9))
    }

    #[test]
    fn fee_tier_parsing() {
        assert_eq!(FeeTier::try_from(100).unwrap(), FeeTier::Lowest);
        assert_eq!(FeeTier::try_from(10_000).unwrap().value(), 10_000);
        assert_eq!(FeeTier::try_from(2500), Err(SwapError::InvalidFeeTier(2500)));
    }

    #[test]
    fn construction_rejects_bad_config() {
        let zero_factory = FixedRateRouter::new(ROUTER, AccountId::ZERO);
        assert_eq!(
            SwapAdapter::new(ADAPTER, Box::new(zero_factory), 3000).unwrap_err(),
            SwapError::InvalidRouter
        );
        assert_eq!(
            SwapAdapter::new(ADAPTER, Box::new(router()), 42).unwrap_err(),
            SwapError::InvalidFeeTier(42)
        );
    }

    #[test]
    fn swap_returns_verified_output() {
        let (mut adapter, mut ledger) = setup(router());
        let out = adapter
            .swap(&mut ledger, USER, WETH, USDC, Amount::from(1000), Amount::from(900), &[])
            .unwrap();

        assert_eq!(out, Amount::from(900));
        assert_eq!(ledger.balance_of(USDC, USER), Amount::from(900));
        assert_eq!(ledger.balance_of(WETH, USER), Amount::from(9000));
        assert!(ledger.balance_of(USDC, ADAPTER).is_zero());
        assert_eq!(adapter.events().events().len(), 1);
    }

    #[test]
    fn slippage_floor_enforced() {
        let (mut adapter, mut ledger) = setup(router());
        let result = adapter.swap(&mut ledger, USER, WETH, USDC, Amount::from(1000), Amount::from(901), &[]);

        assert_eq!(
            result,
            Err(SwapError::SlippageExceeded {
                minimum: Amount::from(901),
                received: Amount::from(900),
            })
        );
        assert_eq!(ledger.balance_of(WETH, USER), Amount::from(10_000));
        assert!(ledger.balance_of(USDC, USER).is_zero());
    }

    #[test]
    fn under_delivering_router_detected() {
        let (mut adapter, mut ledger) = setup(router().with_shortfall(Amount::from(1)));
        let result = adapter.swap(&mut ledger, USER, WETH, USDC, Amount::from(1000), Amount::from(900), &[]);

        assert_eq!(
            result,
            Err(SwapError::BalanceMismatch {
                reported: Amount::from(900),
                received: Amount::from(899),
            })
        );
        // everything rolled back, including the router's partial delivery
        assert_eq!(ledger.balance_of(WETH, USER), Amount::from(10_000));
        assert_eq!(ledger.balance_of(USDC, ROUTER), Amount::from(1_000_000));
        assert!(ledger.balance_of(USDC, ADAPTER).is_zero());
    }

    #[test]
    fn rejects_degenerate_requests() {
        let (mut adapter, mut ledger) = setup(router());
        assert!(matches!(
            adapter.swap(&mut ledger, USER, WETH, USDC, Amount::zero(), Amount::zero(), &[]),
            Err(SwapError::InvalidParameter(_))
        ));
        assert!(matches!(
            adapter.swap(&mut ledger, USER, WETH, WETH, Amount::from(1), Amount::zero(), &[]),
            Err(SwapError::InvalidParameter(_))
        ));
    }

    #[test]
    fn unknown_pair_is_router_failure() {
        let (mut adapter, mut ledger) = setup(router());
        ledger.mint(USDC, USER, Amount::from(10)).unwrap();
        let result = adapter.swap(&mut ledger, USER, USDC, WETH, Amount::from(10), Amount::zero(), &[]);
        assert!(matches!(result, Err(SwapError::Router(_))));
        assert_eq!(ledger.balance_of(USDC, USER), Amount::from(10));
    }

    #[test]
    fn caller_without_funds_fails() {
        let (mut adapter, mut ledger) = setup(router());
        let result = adapter.swap(&mut ledger, AccountId(99), WETH, USDC, Amount::from(1), Amount::zero(), &[]);
        assert!(matches!(result, Err(SwapError::Ledger(LedgerError::InsufficientBalance { .. }))));
    }
}
