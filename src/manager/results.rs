// 6.0.2: result types and errors for vault manager operations.

use crate::ledger::LedgerError;
use crate::pool::PoolError;
use crate::registry::RegistryError;
use crate::swap::SwapError;
use crate::tick_math::TickMathError;
use crate::types::{AccountId, Amount, PoolId, Price, Timestamp, VaultId};
use crate::vault::VaultState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementResult {
    pub vault_id: VaultId,
    pub final_price: Price,
    /// Borrower's share of the locked cash and the providers' locked liquidity.
    pub borrower_payout: Amount,
    /// Providers' share of the same pot.
    pub provider_payout: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollResult {
    pub settlement: SettlementResult,
    pub new_vault_id: VaultId,
    pub carried_cash: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error("Caller {0} is not authorized for this operation")]
    Unauthorized(AccountId),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Liquidity mismatch: locked cash is {expected}, ticks provide {provided}")]
    LiquidityMismatch { expected: Amount, provided: Amount },

    #[error("Pool {0:?} not found")]
    PoolNotFound(PoolId),

    #[error("Vault {0:?} not found")]
    VaultNotFound(VaultId),

    #[error("Vault {vault_id:?} is {state:?}, expected Active")]
    InvalidState { vault_id: VaultId, state: VaultState },

    #[error("Vault expires at {expiry}, now is {now}")]
    NotExpired { expiry: Timestamp, now: Timestamp },

    #[error("Vault expired at {expiry}, now is {now}")]
    Expired { expiry: Timestamp, now: Timestamp },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Arithmetic overflow in vault {0:?}")]
    Overflow(VaultId),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Swap error: {0}")]
    Swap(#[from] SwapError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Tick math error: {0}")]
    TickMath(#[from] TickMathError),
}
