//! State stores backing the admission middlewares
//!
//! Both stores expose atomic read-modify-write operations so a middleware
//! asks one question per decision: [`FrequencyStore::try_increment`] claims
//! an impression slot, [`BudgetStore::charge`] debits spend. The bundled
//! [`MemoryStore`] guards all state with one mutex; swapping in a shared
//! backend (Redis and friends) only needs these traits.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{ProtocolError, Result};

/// Frequency key for a user, optionally scoped to a campaign
pub fn frequency_key(user_id: &str, campaign_id: Option<&str>) -> String {
    match campaign_id {
        Some(campaign) => format!("freq:user:{user_id}:campaign:{campaign}"),
        None => format!("freq:user:{user_id}"),
    }
}

/// Budget key, global or per campaign
pub fn budget_key(campaign_id: Option<&str>) -> String {
    match campaign_id {
        Some(campaign) => format!("budget:campaign:{campaign}"),
        None => "budget:global".to_string(),
    }
}

/// A spending allowance with exact decimal arithmetic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Budget {
    total: Decimal,
    spent: Decimal,
    currency: String,
}

impl Budget {
    /// Create a budget; the total must be non-negative and the currency a
    /// three-letter uppercase code
    pub fn new(total: Decimal, currency: impl Into<String>) -> Result<Self> {
        let currency = currency.into();
        if total.is_sign_negative() {
            return Err(ProtocolError::InvalidRequest(format!(
                "budget total must be non-negative, got {total}"
            )));
        }
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ProtocolError::InvalidRequest(format!(
                "invalid currency code: {currency}"
            )));
        }
        Ok(Self {
            total,
            spent: Decimal::ZERO,
            currency,
        })
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn spent(&self) -> Decimal {
        self.spent
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn remaining(&self) -> Decimal {
        self.total - self.spent
    }

    fn charged(&self, cost: Decimal) -> Self {
        Self {
            total: self.total,
            spent: self.spent + cost,
            currency: self.currency.clone(),
        }
    }
}

/// Result of an atomic impression-slot claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyVerdict {
    /// Whether a slot was claimed
    pub admitted: bool,
    /// Count in the active window, including this claim when admitted
    pub count: u64,
}

/// Counter store with fixed impression windows
///
/// Windows are fixed, not sliding: the expiry set when a counter is created
/// stays put while increments accumulate, and the counter lapses wholesale
/// when it passes.
#[async_trait]
pub trait FrequencyStore: Send + Sync {
    /// Atomically claim an impression slot under `key`
    ///
    /// A lapsed or missing counter starts a new window. When the count has
    /// already reached `limit` the claim is refused and the count is left
    /// untouched.
    async fn try_increment(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<FrequencyVerdict>;

    /// Current count for `key`; zero when absent or lapsed
    async fn count(&self, key: &str) -> Result<u64>;

    /// Drop the counter for `key`
    async fn reset(&self, key: &str) -> Result<()>;
}

/// Result of an atomic budget charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The charge was applied; carries the post-charge budget
    Charged(Budget),
    /// The remaining budget could not cover the cost; nothing was charged
    InsufficientFunds(Budget),
}

/// Budget storage with atomic charging
#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn budget(&self, key: &str) -> Result<Option<Budget>>;

    async fn set_budget(&self, key: &str, budget: Budget) -> Result<()>;

    /// Atomically debit `cost` from the budget under `key`
    ///
    /// The check and the debit happen under one lock, so concurrent charges
    /// can never overspend. Fails when no budget is configured for `key` or
    /// `cost` is negative.
    async fn charge(&self, key: &str, cost: Decimal) -> Result<ChargeOutcome>;

    /// Zero the spent amount under `key`, keeping the total
    async fn reset_spent(&self, key: &str) -> Result<()>;
}

#[derive(Debug)]
struct Counter {
    count: u64,
    window_ends: Instant,
}

#[derive(Debug, Default)]
struct StoreState {
    counters: HashMap<String, Counter>,
    budgets: HashMap<String, Budget>,
}

/// In-process store for both frequency counters and budgets
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FrequencyStore for MemoryStore {
    async fn try_increment(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<FrequencyVerdict> {
        let mut state = self.state.lock();
        let now = Instant::now();

        let live = state
            .counters
            .get(key)
            .filter(|counter| counter.window_ends > now)
            .map(|counter| counter.count);

        match live {
            Some(count) if count >= u64::from(limit) => {
                Ok(FrequencyVerdict {
                    admitted: false,
                    count,
                })
            }
            Some(count) => {
                if let Some(counter) = state.counters.get_mut(key) {
                    counter.count = count + 1;
                }
                Ok(FrequencyVerdict {
                    admitted: true,
                    count: count + 1,
                })
            }
            None if limit == 0 => Ok(FrequencyVerdict {
                admitted: false,
                count: 0,
            }),
            None => {
                state.counters.insert(
                    key.to_string(),
                    Counter {
                        count: 1,
                        window_ends: now + window,
                    },
                );
                Ok(FrequencyVerdict {
                    admitted: true,
                    count: 1,
                })
            }
        }
    }

    async fn count(&self, key: &str) -> Result<u64> {
        let state = self.state.lock();
        let now = Instant::now();
        Ok(state
            .counters
            .get(key)
            .filter(|counter| counter.window_ends > now)
            .map_or(0, |counter| counter.count))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.state.lock().counters.remove(key);
        Ok(())
    }
}

#[async_trait]
impl BudgetStore for MemoryStore {
    async fn budget(&self, key: &str) -> Result<Option<Budget>> {
        Ok(self.state.lock().budgets.get(key).cloned())
    }

    async fn set_budget(&self, key: &str, budget: Budget) -> Result<()> {
        self.state.lock().budgets.insert(key.to_string(), budget);
        Ok(())
    }

    async fn charge(&self, key: &str, cost: Decimal) -> Result<ChargeOutcome> {
        if cost.is_sign_negative() {
            return Err(ProtocolError::InvalidRequest(format!(
                "charge cost must be non-negative, got {cost}"
            )));
        }

        let mut state = self.state.lock();
        let budget = state
            .budgets
            .get(key)
            .ok_or_else(|| ProtocolError::Store(format!("no budget configured for {key}")))?;

        if cost > budget.remaining() {
            return Ok(ChargeOutcome::InsufficientFunds(budget.clone()));
        }

        let charged = budget.charged(cost);
        state.budgets.insert(key.to_string(), charged.clone());
        Ok(ChargeOutcome::Charged(charged))
    }

    async fn reset_spent(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(budget) = state.budgets.get(key) {
            let mut reset = budget.clone();
            reset.spent = Decimal::ZERO;
            state.budgets.insert(key.to_string(), reset);
        }
        Ok(())
    }
}
