// collar-core: collateralized collar lending.
// borrowers swap collateral to cash, keep the LTV share unlocked and put the
// rest at risk against provider liquidity locked at price ticks until expiry.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, AssetId, Amount, Price, Bps, Timestamp
//   2.x  ledger.rs: token balances with checkpoint/revert (mocked)
//   3.x  events.rs: state transition events for audit
//   4.x  oracle.rs: TWAP reads per asset pair (mocked feed)
//   5.x  swap.rs: swap adapter, router trait, fixed-rate router
//   6.x  manager/: vault manager: open, withdraw, settle, roll, liquidity routing
//        tick_math.rs: bps <-> tick <-> price conversions
//        registry.rs: owner-gated allow-lists and counterparty authorization
//        pool.rs: tick-bucketed liquidity ledger
//        vault.rs: vault record, cash split, collar payoff

// core protocol modules
pub mod manager;
pub mod pool;
pub mod registry;
pub mod tick_math;
pub mod types;
pub mod vault;

// integration modules
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod swap;

// re exports for convenience
pub use events::*;
pub use ledger::{LedgerCheckpoint, LedgerError, TokenLedger};
pub use manager::*;
pub use oracle::{Observation, OracleError, TwapOracle};
pub use pool::{LiquidityPool, PoolConfig, PoolError, TickLiquidity, TickSettlement};
pub use registry::{AssetRole, OrderedSet, Registry, RegistryError};
pub use swap::{FeeTier, FixedRateRouter, SwapAdapter, SwapError, SwapRequest, SwapRouter};
pub use tick_math::TickMathError;
pub use types::*;
pub use vault::*;
