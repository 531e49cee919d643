//! Ad request parameters
//!
//! An [`AdRequest`] is a sorted bag of named parameters with typed accessors
//! for the fields the admission middlewares care about. Parameters ride to
//! the upstream as query parameters (or the encoded payload for POST-style
//! protocols), so values are JSON values rather than plain strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Parameters for a single ad request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdRequest {
    params: BTreeMap<String, Value>,
}

impl AdRequest {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style parameter insertion
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a parameter
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    /// Raw parameter value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Parameter as a string slice, if it is a JSON string
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Parameter as an exact decimal
    ///
    /// Accepts JSON numbers and numeric strings; anything else is `None`.
    /// Numbers go through their decimal rendering, so no binary float
    /// artifacts leak into budget arithmetic.
    pub fn decimal_param(&self, name: &str) -> Option<Decimal> {
        match self.params.get(name)? {
            Value::String(s) => Decimal::from_str(s).ok(),
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        }
    }

    /// The requesting user, required by frequency capping
    pub fn user_id(&self) -> Option<&str> {
        self.str_param("user_id")
    }

    /// Campaign the request belongs to, if any
    pub fn campaign_id(&self) -> Option<&str> {
        self.str_param("campaign_id")
    }

    /// Explicit per-impression cost
    pub fn cost(&self) -> Option<Decimal> {
        self.decimal_param("cost")
    }

    /// Bid price, used as cost when no explicit cost is set
    pub fn bid_price(&self) -> Option<Decimal> {
        self.decimal_param("bid_price")
    }

    /// Cost per mille; divided by 1000 to derive a per-impression cost
    pub fn cpm(&self) -> Option<Decimal> {
        self.decimal_param("cpm")
    }

    /// All parameters in sorted order
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_typed_accessors() {
        let request = AdRequest::new()
            .param("user_id", "alice")
            .param("campaign_id", "summer")
            .param("cost", "0.25");

        assert_eq!(request.user_id(), Some("alice"));
        assert_eq!(request.campaign_id(), Some("summer"));
        assert_eq!(
            request.cost(),
            Some(Decimal::from_str("0.25").expect("Operation should succeed"))
        );
    }

    #[test]
    fn test_decimal_from_json_number_is_exact() {
        let request = AdRequest::new().param("cpm", 2.5);
        assert_eq!(
            request.cpm(),
            Some(Decimal::from_str("2.5").expect("Operation should succeed"))
        );
    }

    #[test]
    fn test_decimal_rejects_non_numeric() {
        let request = AdRequest::new().param("cost", true);
        assert!(request.cost().is_none());
    }

    #[test]
    fn test_params_are_sorted() {
        let request = AdRequest::new().param("z", 1).param("a", 2);
        let names: Vec<&str> = request.params().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "z"]);
    }
}
