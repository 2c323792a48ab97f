// 3.0: every state change produces an event. used for audit trails and for
// notifying external indexers. the EventPayload enum lists all event types.

use crate::registry::AssetRole;
use crate::types::{AccountId, Amount, AssetId, Bps, PoolId, Price, Timestamp, VaultId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Registry events
    AssetSupportChanged(AssetSupportChangedEvent),
    DurationChanged(DurationChangedEvent),
    LtvChanged(LtvChangedEvent),
    CounterpartyAuthorizationSet(CounterpartyAuthorizationEvent),
    OwnershipTransferred(OwnershipTransferredEvent),
    PriceRecorded(PriceRecordedEvent),

    // Pool events
    LiquidityDeposited(LiquidityDepositedEvent),
    LiquidityWithdrawn(LiquidityWithdrawnEvent),
    LiquidityLocked(LiquidityLockEvent),
    LiquidityUnlocked(LiquidityLockEvent),
    TickSettled(TickSettledEvent),

    // Vault events
    VaultOpened(VaultOpenedEvent),
    VaultSettled(VaultSettledEvent),
    VaultRolled(VaultRolledEvent),
    CashWithdrawn(CashWithdrawnEvent),

    // Swap events
    SwapExecuted(SwapExecutedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSupportChangedEvent {
    pub asset: AssetId,
    pub role: AssetRole,
    pub supported: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationChangedEvent {
    pub duration_secs: u64,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtvChangedEvent {
    pub ltv: Bps,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyAuthorizationEvent {
    pub contract: AccountId,
    pub is_taker: bool,
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipTransferredEvent {
    pub previous_owner: AccountId,
    pub new_owner: AccountId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecordedEvent {
    pub base: AssetId,
    pub quote: AssetId,
    pub timestamp: Timestamp,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityDepositedEvent {
    pub pool_id: PoolId,
    pub provider: AccountId,
    pub ticks: Vec<u32>,
    pub amounts: Vec<Amount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityWithdrawnEvent {
    pub pool_id: PoolId,
    pub provider: AccountId,
    pub tick: u32,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityLockEvent {
    pub pool_id: PoolId,
    pub ticks: Vec<u32>,
    pub amounts: Vec<Amount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSettledEvent {
    pub pool_id: PoolId,
    pub tick: u32,
    pub released: Amount,
    pub provider_gain: Amount,
    pub provider_loss: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultOpenedEvent {
    pub vault_id: VaultId,
    pub borrower: AccountId,
    pub pool_id: PoolId,
    pub collateral_amount: Amount,
    pub cash_amount: Amount,
    pub unlocked_cash: Amount,
    pub locked_cash: Amount,
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultSettledEvent {
    pub vault_id: VaultId,
    pub final_price: Price,
    pub borrower_payout: Amount,
    pub provider_payout: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultRolledEvent {
    pub old_vault_id: VaultId,
    pub new_vault_id: VaultId,
    pub roll_price: Price,
    pub carried_cash: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashWithdrawnEvent {
    pub vault_id: VaultId,
    pub borrower: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapExecutedEvent {
    pub token_in: AssetId,
    pub token_out: AssetId,
    pub amount_in: Amount,
    pub amount_out: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCheckpoint {
    next_id: u64,
}

/// Bounded in-memory event log, one per component.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(100_000)
    }
}

impl EventLog {
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
        }
    }

    pub fn emit(&mut self, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;

        tracing::debug!(event_id = id.0, ?payload, "event");
        self.events.push(Event { id, payload });

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
        id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn last(&self) -> Option<&EventPayload> {
        self.events.last().map(|e| &e.payload)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn checkpoint(&self) -> EventCheckpoint {
        EventCheckpoint { next_id: self.next_id }
    }

    /// Drop everything emitted since `checkpoint`.
    pub fn revert_to(&mut self, checkpoint: EventCheckpoint) {
        self.events.retain(|e| e.id.0 < checkpoint.next_id);
        self.next_id = checkpoint.next_id;
    }
}
