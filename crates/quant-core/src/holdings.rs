//! Portfolio holdings and valuation (spec component C10, supplement §4.8).
//!
//! Grounded in the teacher's `portfolio-manager/src/portfolio.rs`
//! (market_value = shares*price, cost_basis = shares*entry_price) and
//! `shared_math::herfindahl_index` for concentration, generalized from the
//! teacher's async/sqlx-backed positions table to a pure value type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};

/// A single symbol's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub shares: f64,
    pub average_cost: f64,
    pub current_price: f64,
}

impl Holding {
    pub fn new(shares: f64, average_cost: f64, current_price: f64) -> AnalyticsResult<Self> {
        if shares < 0.0 {
            return Err(AnalyticsError::invalid_input("holding shares must be non-negative"));
        }
        if current_price <= 0.0 || average_cost <= 0.0 {
            return Err(AnalyticsError::invalid_input("holding prices must be strictly positive"));
        }
        Ok(Self { shares, average_cost, current_price })
    }

    pub fn market_value(&self) -> f64 {
        self.shares * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares * self.average_cost
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }
}

/// Cash balance plus a per-symbol `Holding` map at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHoldings {
    pub cash: f64,
    pub holdings: HashMap<String, Holding>,
}

impl PortfolioHoldings {
    pub fn new(cash: f64, holdings: HashMap<String, Holding>) -> Self {
        Self { cash, holdings }
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.holdings.values().map(Holding::market_value).sum::<f64>()
    }

    /// `weight_i = market_value_i / total_value`; cash is excluded from the
    /// numerator but included in the denominator.
    pub fn weights(&self) -> AnalyticsResult<HashMap<String, f64>> {
        let total = self.total_value();
        if total.abs() < 1e-12 {
            return Err(AnalyticsError::division_by_zero("portfolio weights undefined when total value is zero"));
        }
        Ok(self
            .holdings
            .iter()
            .map(|(symbol, h)| (symbol.clone(), h.market_value() / total))
            .collect())
    }

    /// Herfindahl index `sum(w_i^2)` over non-cash weights.
    pub fn concentration(&self) -> AnalyticsResult<f64> {
        let weights = self.weights()?;
        Ok(weights.values().map(|w| w * w).sum())
    }

    /// Trades (signed delta shares) needed to move from current weights to
    /// `target_weights` at current prices, ignoring transaction costs.
    pub fn rebalance_to(&self, target_weights: &HashMap<String, f64>) -> AnalyticsResult<HashMap<String, f64>> {
        let total = self.total_value();
        if total.abs() < 1e-12 {
            return Err(AnalyticsError::division_by_zero("rebalancing undefined when total value is zero"));
        }
        let mut trades = HashMap::new();
        for (symbol, &target_w) in target_weights {
            let price = self
                .holdings
                .get(symbol)
                .map(|h| h.current_price)
                .ok_or_else(|| AnalyticsError::invalid_symbol(format!("no price known for symbol '{symbol}'")))?;
            let current_shares = self.holdings.get(symbol).map_or(0.0, |h| h.shares);
            let target_shares = target_w * total / price;
            trades.insert(symbol.clone(), target_shares - current_shares);
        }
        for symbol in self.holdings.keys() {
            if !target_weights.contains_key(symbol) {
                trades.insert(symbol.clone(), -self.holdings[symbol].shares);
            }
        }
        Ok(trades)
    }

    /// Aggregate non-cash weight by sector, via an explicit symbol-to-sector map.
    pub fn sector_weights(&self, sector_map: &HashMap<String, String>) -> AnalyticsResult<HashMap<String, f64>> {
        let weights = self.weights()?;
        let mut out: HashMap<String, f64> = HashMap::new();
        for (symbol, w) in weights {
            let sector = sector_map
                .get(&symbol)
                .ok_or_else(|| AnalyticsError::invalid_symbol(format!("no sector mapping for symbol '{symbol}'")))?;
            *out.entry(sector.clone()).or_insert(0.0) += w;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_portfolio() -> PortfolioHoldings {
        let mut holdings = HashMap::new();
        holdings.insert("AAA".to_string(), Holding::new(100.0, 10.0, 12.0).unwrap());
        holdings.insert("BBB".to_string(), Holding::new(50.0, 20.0, 18.0).unwrap());
        PortfolioHoldings::new(100.0, holdings)
    }

    #[test]
    fn total_value_is_cash_plus_market_values() {
        let p = sample_portfolio();
        assert_relative_eq!(p.total_value(), 100.0 + 1200.0 + 900.0);
    }

    #[test]
    fn weights_exclude_cash_from_numerator() {
        let p = sample_portfolio();
        let weights = p.weights().unwrap();
        assert_relative_eq!(weights["AAA"], 1200.0 / 2200.0, epsilon = 1e-9);
        let sum: f64 = weights.values().sum();
        assert!(sum < 1.0);
    }

    #[test]
    fn concentration_is_herfindahl_index() {
        let p = sample_portfolio();
        let weights = p.weights().unwrap();
        let expected: f64 = weights.values().map(|w| w * w).sum();
        assert_relative_eq!(p.concentration().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn rebalance_computes_signed_share_deltas() {
        let p = sample_portfolio();
        let mut target = HashMap::new();
        target.insert("AAA".to_string(), 0.5);
        target.insert("BBB".to_string(), 0.5);
        let trades = p.rebalance_to(&target).unwrap();
        let total = p.total_value();
        assert_relative_eq!(trades["AAA"], 0.5 * total / 12.0 - 100.0, epsilon = 1e-6);
    }

    #[test]
    fn rebalance_to_unknown_symbol_is_invalid_symbol() {
        let p = sample_portfolio();
        let mut target = HashMap::new();
        target.insert("ZZZ".to_string(), 1.0);
        assert!(matches!(p.rebalance_to(&target), Err(AnalyticsError::InvalidSymbol { .. })));
    }

    #[test]
    fn holding_rejects_negative_shares_or_nonpositive_price() {
        assert!(Holding::new(-1.0, 1.0, 1.0).is_err());
        assert!(Holding::new(1.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn sector_weights_aggregate_by_sector() {
        let p = sample_portfolio();
        let mut sectors = HashMap::new();
        sectors.insert("AAA".to_string(), "Tech".to_string());
        sectors.insert("BBB".to_string(), "Tech".to_string());
        let sector_weights = p.sector_weights(&sectors).unwrap();
        assert_relative_eq!(sector_weights["Tech"], (1200.0 + 900.0) / 2200.0, epsilon = 1e-9);
    }
}
