// 6.0: vault manager. validates against the registry, swaps collateral through
// the adapter, splits cash by LTV and locks pool liquidity, then settles or
// rolls vaults against the oracle price. every public mutation is atomic.

mod config;
mod core;
mod liquidity;
mod results;
mod settlement;
mod vaults;

pub use config::ManagerConfig;
pub use core::VaultManager;
pub use results::{ManagerError, RollResult, SettlementResult};
