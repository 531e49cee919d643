//! Admission middleware pipeline
//!
//! Middlewares wrap the terminal upstream fetch in onion order: the first
//! middleware added is the outermost layer. Each layer either passes the
//! request to [`Next`], short-circuits with a [`Rejection`], or fails with a
//! transport/config error. Rejections are ordinary values, not errors; a
//! capped user is a business outcome the caller inspects, while a broken
//! upstream is an `Err`.

mod budget;
mod frequency;

pub use budget::{BudgetConfig, BudgetMiddleware};
pub use frequency::{FrequencyCapConfig, FrequencyCapMiddleware};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::context::SessionContext;
use crate::error::Result;
use crate::request::AdRequest;
use crate::upstream::Upstream;

/// Outcome of an admitted or rejected delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Delivery<T> {
    /// The request passed every admission check and produced a response
    Granted(T),
    /// An admission policy declined the request
    Rejected(Rejection),
}

impl<T> Delivery<T> {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The granted value, consuming the delivery
    pub fn granted(self) -> Option<T> {
        match self {
            Self::Granted(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Granted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Why an admission policy declined a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    /// The user has hit the impression cap for the active window
    FrequencyCapExceeded {
        key: String,
        count: u64,
        limit: u32,
        window: Duration,
    },
    /// The remaining budget cannot cover the request's cost
    BudgetExceeded {
        key: String,
        cost: Decimal,
        remaining: Decimal,
        spent: Decimal,
        total: Decimal,
        currency: String,
    },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FrequencyCapExceeded {
                key,
                count,
                limit,
                window,
            } => write!(
                f,
                "frequency cap exceeded for {key}: {count} impressions, limit {limit} per {}s",
                window.as_secs()
            ),
            Self::BudgetExceeded {
                key,
                cost,
                remaining,
                currency,
                ..
            } => write!(
                f,
                "budget exceeded for {key}: cost {cost} {currency} over remaining {remaining} {currency}"
            ),
        }
    }
}

/// Innermost stage of a pipeline, usually an [`Upstream`]
#[async_trait]
pub trait Terminal<T>: Send + Sync {
    async fn invoke(&self, request: &AdRequest, ctx: &SessionContext) -> Result<T>;
}

#[async_trait]
impl<T: Send + Sync + 'static> Terminal<T> for Upstream<T> {
    async fn invoke(&self, request: &AdRequest, ctx: &SessionContext) -> Result<T> {
        self.fetch(request, ctx, None).await
    }
}

/// An admission layer around the rest of the pipeline
#[async_trait]
pub trait Middleware<T>: Send + Sync {
    async fn handle(
        &self,
        request: &AdRequest,
        ctx: &SessionContext,
        next: Next<'_, T>,
    ) -> Result<Delivery<T>>;
}

/// Continuation into the remaining pipeline stages
pub struct Next<'a, T> {
    rest: &'a [Arc<dyn Middleware<T>>],
    terminal: &'a dyn Terminal<T>,
}

impl<T: Send + Sync + 'static> Next<'_, T> {
    /// Run the remaining middlewares, then the terminal
    pub async fn run(self, request: &AdRequest, ctx: &SessionContext) -> Result<Delivery<T>> {
        match self.rest.split_first() {
            Some((middleware, rest)) => {
                let next = Next {
                    rest,
                    terminal: self.terminal,
                };
                middleware.handle(request, ctx, next).await
            }
            None => Ok(Delivery::Granted(self.terminal.invoke(request, ctx).await?)),
        }
    }
}

/// A terminal wrapped in zero or more admission middlewares
pub struct Pipeline<T> {
    terminal: Arc<dyn Terminal<T>>,
    middlewares: Vec<Arc<dyn Middleware<T>>>,
}

impl<T: Send + Sync + 'static> Pipeline<T> {
    pub fn new(terminal: Arc<dyn Terminal<T>>) -> Self {
        Self {
            terminal,
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware; earlier additions run outermost
    #[must_use]
    pub fn with(mut self, middleware: Arc<dyn Middleware<T>>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub async fn fetch(&self, request: &AdRequest, ctx: &SessionContext) -> Result<Delivery<T>> {
        let next = Next {
            rest: &self.middlewares,
            terminal: self.terminal.as_ref(),
        };
        next.run(request, ctx).await
    }
}
