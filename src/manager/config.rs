//! Vault manager configuration options.

use serde::{Deserialize, Serialize};

/// Vault manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Window of the TWAP read used to settle and roll vaults.
    pub twap_window_secs: u64,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            twap_window_secs: 900,
            max_events: 100_000,
        }
    }
}
