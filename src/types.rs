// 1.0: all the primitives live here. nothing in the protocol works without these types.
// IDs, amounts, prices, bps, timestamps. each is a newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

pub const BPS_DENOMINATOR: u32 = 10_000;

// any actor or contract: borrowers, providers, the manager, pools, routers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl AccountId {
    pub const ZERO: AccountId = AccountId(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:040x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VaultId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId(pub u32);

// 1.1: token amount in whole base units. never negative.
// 18-decimal tokens put balances near 1e24, so every product goes through checked maths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    // None past Decimal::MAX
    pub fn checked_add(&self, other: Amount) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Amount) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    // None when other > self
    pub fn checked_sub(&self, other: Amount) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - other.0))
        }
    }

    pub fn saturating_sub(&self, other: Amount) -> Self {
        Self((self.0 - other.0).max(Decimal::ZERO))
    }

    // (self * num / den) truncated toward zero. Zero when den is zero,
    // None when the result itself does not fit.
    pub fn mul_div(&self, num: Decimal, den: Decimal) -> Option<Self> {
        if den.is_zero() {
            return Some(Self::zero());
        }
        self.scaled(num, den).map(|v| Self(v.trunc().max(Decimal::ZERO)))
    }

    // (self * num / den) rounded up.
    pub fn mul_div_ceil(&self, num: Decimal, den: Decimal) -> Option<Self> {
        if den.is_zero() {
            return Some(Self::zero());
        }
        self.scaled(num, den).map(|v| Self(v.ceil().max(Decimal::ZERO)))
    }

    // Exact when self * num fits in 96 bits. Past that the ratio is taken
    // first, which keeps 28 significant digits.
    fn scaled(&self, num: Decimal, den: Decimal) -> Option<Decimal> {
        match self.0.checked_mul(num) {
            Some(product) => product.checked_div(den),
            None => num
                .checked_div(den)
                .and_then(|ratio| self.0.checked_mul(ratio))
                .or_else(|| self.0.checked_div(den)?.checked_mul(num)),
        }
    }

    pub fn min(self, other: Amount) -> Self {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(Decimal::from(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, a| acc.saturating_add(a))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, a| acc.saturating_add(*a))
    }
}

// 1.2: price in cash units per collateral unit. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: basis points. 100 bps = 1%, 10_000 bps = 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bps(pub u32);

impl Bps {
    pub fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 4)
    }

    // valid LTV tiers live in (0, 10000]
    pub fn is_valid_ltv(&self) -> bool {
        self.0 > 0 && self.0 <= BPS_DENOMINATOR
    }
}

// 1.4: unix timestamp in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp().max(0) as u64)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn plus(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    // None if other is in the future
    pub fn seconds_since(&self, other: Timestamp) -> Option<u64> {
        self.0.checked_sub(other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp(self.0 as i64, 0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            None => write!(f, "{}s", self.0),
        }
    }
}
