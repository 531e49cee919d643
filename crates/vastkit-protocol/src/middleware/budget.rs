//! Budget admission middleware
//!
//! Charges are taken only after the downstream stages succeed: a rejected or
//! failed fetch never spends money. The pre-check keeps obviously unpayable
//! requests away from the upstream, and the post-fetch charge revalidates
//! atomically so concurrent requests cannot overspend between the two.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::{Delivery, Middleware, Next, Rejection};
use crate::context::SessionContext;
use crate::error::{ProtocolError, Result};
use crate::request::AdRequest;
use crate::store::{BudgetStore, ChargeOutcome, budget_key};

/// Budget policy configuration
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// Cost assumed when the request carries no pricing parameter
    pub default_cost: Decimal,
    /// Charge the campaign's budget when the request names one
    pub per_campaign: bool,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_cost: Decimal::ZERO,
            per_campaign: false,
        }
    }
}

/// Admits requests the configured budget can pay for
pub struct BudgetMiddleware {
    config: BudgetConfig,
    store: Arc<dyn BudgetStore>,
}

impl BudgetMiddleware {
    pub fn new(config: BudgetConfig, store: Arc<dyn BudgetStore>) -> Self {
        Self { config, store }
    }

    /// Cost resolution order: explicit cost, bid price, CPM / 1000, default
    fn resolve_cost(&self, request: &AdRequest) -> Result<Decimal> {
        let cost = request
            .cost()
            .or_else(|| request.bid_price())
            .or_else(|| request.cpm().map(|cpm| cpm / Decimal::from(1000)))
            .unwrap_or(self.config.default_cost);
        if cost.is_sign_negative() {
            return Err(ProtocolError::InvalidRequest(format!(
                "request cost must be non-negative, got {cost}"
            )));
        }
        Ok(cost)
    }

    fn scope_key(&self, request: &AdRequest) -> String {
        let campaign = if self.config.per_campaign {
            request.campaign_id()
        } else {
            None
        };
        budget_key(campaign)
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Middleware<T> for BudgetMiddleware {
    async fn handle(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
        next: Next<'_, T>,
    ) -> Result<Delivery<T>> {
        let key = self.scope_key(request);
        let cost = self.resolve_cost(request)?;

        let budget = self
            .store
            .budget(&key)
            .await?
            .ok_or_else(|| ProtocolError::Store(format!("no budget configured for {key}")))?;

        if cost > budget.remaining() {
            tracing::debug!(
                "Budget pre-check refused {key}: cost {cost} over remaining {}",
                budget.remaining()
            );
            return Ok(Delivery::Rejected(Rejection::BudgetExceeded {
                key,
                cost,
                remaining: budget.remaining(),
                spent: budget.spent(),
                total: budget.total(),
                currency: budget.currency().to_string(),
            }));
        }

        let delivery = next.run(request, ctx).await?;
        if !delivery.is_granted() {
            return Ok(delivery);
        }

        match self.store.charge(&key, cost).await? {
            ChargeOutcome::Charged(budget) => {
                tracing::debug!(
                    "Charged {cost} {} to {key}, {} remaining",
                    budget.currency(),
                    budget.remaining()
                );
                Ok(delivery)
            }
            // A concurrent request drained the budget between the pre-check
            // and the charge.
            ChargeOutcome::InsufficientFunds(budget) => {
                Ok(Delivery::Rejected(Rejection::BudgetExceeded {
                    key,
                    cost,
                    remaining: budget.remaining(),
                    spent: budget.spent(),
                    total: budget.total(),
                    currency: budget.currency().to_string(),
                }))
            }
        }
    }
}
