//! Day-by-day backtest driver (spec component C14, spec-level only):
//! strategy -> target weights -> orders -> fills -> P&L -> metrics, composed
//! from the holdings model (C10), round-trip builder (C11), and the
//! return/ratio primitives (C5/C6). Grounded in the teacher's
//! `backtest-engine/src/engine.rs` day-walk (unified timeline, running
//! cash/positions, peak-equity drawdown tracking), re-expressed against this
//! crate's `PortfolioHoldings` value type instead of the teacher's
//! mutable `OpenPosition` map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::holdings::{Holding, PortfolioHoldings};
use crate::returns::{cagr, max_drawdown, sharpe_ratio, sortino_ratio};
use crate::roundtrip::{build_round_trips, OpenLot, RoundTrip, Trade};
use crate::timeseries::{Frequency, Timestamp};

/// Decides target portfolio weights given the current date, today's prices,
/// and the portfolio's state before rebalancing.
pub trait Strategy {
    fn target_weights(
        &mut self,
        date: Timestamp,
        prices: &HashMap<String, f64>,
        holdings: &PortfolioHoldings,
    ) -> AnalyticsResult<HashMap<String, f64>>;
}

/// Always-equal-weight across whatever symbols have a price on the day.
pub struct EqualWeightStrategy;

impl Strategy for EqualWeightStrategy {
    fn target_weights(
        &mut self,
        _date: Timestamp,
        prices: &HashMap<String, f64>,
        _holdings: &PortfolioHoldings,
    ) -> AnalyticsResult<HashMap<String, f64>> {
        if prices.is_empty() {
            return Ok(HashMap::new());
        }
        let w = 1.0 / prices.len() as f64;
        Ok(prices.keys().map(|s| (s.clone(), w)).collect())
    }
}

/// Rebalances to fixed target weights once, on the first day only.
pub struct BuyAndHoldStrategy {
    pub weights: HashMap<String, f64>,
    allocated: bool,
}

impl BuyAndHoldStrategy {
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self { weights, allocated: false }
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn target_weights(
        &mut self,
        _date: Timestamp,
        _prices: &HashMap<String, f64>,
        holdings: &PortfolioHoldings,
    ) -> AnalyticsResult<HashMap<String, f64>> {
        if self.allocated {
            return Ok(holdings.weights().unwrap_or_default());
        }
        self.allocated = true;
        Ok(self.weights.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    /// Rebalance every `rebalance_interval` trading days; 0 rebalances daily.
    pub rebalance_interval: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self { initial_capital: 100_000.0, commission_rate: 0.001, slippage_rate: 0.0005, rebalance_interval: 0 }
    }
}

/// One result record composing the day-by-day run's accounting and the
/// headline performance/risk metrics computed over its daily returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub dates: Vec<Timestamp>,
    pub equity_curve: Vec<f64>,
    pub daily_returns: Vec<f64>,
    pub final_holdings: PortfolioHoldings,
    pub total_commission: f64,
    pub total_slippage: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub round_trips: Vec<(String, RoundTrip)>,
    pub open_lots: Vec<(String, OpenLot)>,
}

fn apply_fill(
    cash: &mut f64,
    shares: &mut HashMap<String, f64>,
    avg_cost: &mut HashMap<String, f64>,
    symbol: &str,
    delta: f64,
    price: f64,
) {
    let old_shares = *shares.get(symbol).unwrap_or(&0.0);
    let new_shares = old_shares + delta;
    if delta > 0.0 {
        let old_cost = *avg_cost.get(symbol).unwrap_or(&0.0);
        let new_cost = (old_shares * old_cost + delta * price) / new_shares;
        avg_cost.insert(symbol.to_string(), new_cost);
    }
    *cash -= delta * price;
    if new_shares.abs() < 1e-9 {
        shares.remove(symbol);
        avg_cost.remove(symbol);
    } else {
        shares.insert(symbol.to_string(), new_shares);
    }
}

fn snapshot(cash: f64, shares: &HashMap<String, f64>, avg_cost: &HashMap<String, f64>, prices: &HashMap<String, f64>) -> PortfolioHoldings {
    let mut holdings = HashMap::new();
    for (symbol, &qty) in shares {
        if qty.abs() < 1e-9 {
            continue;
        }
        let price = prices.get(symbol).copied().unwrap_or_else(|| avg_cost.get(symbol).copied().unwrap_or(1.0));
        let cost = avg_cost.get(symbol).copied().unwrap_or(price);
        if let Ok(h) = Holding::new(qty, cost.max(1e-9), price.max(1e-9)) {
            holdings.insert(symbol.clone(), h);
        }
    }
    PortfolioHoldings::new(cash, holdings)
}

/// Run `strategy` over a chronologically ordered price history, rebalancing
/// every `config.rebalance_interval` trading days (0 = daily), accounting for
/// commission and per-share slippage, and summarizing the resulting equity
/// path with the crate's existing performance/risk primitives.
pub fn run_backtest(
    strategy: &mut dyn Strategy,
    price_history: &[(Timestamp, HashMap<String, f64>)],
    config: BacktestConfig,
) -> AnalyticsResult<BacktestResult> {
    if price_history.is_empty() {
        return Err(AnalyticsError::insufficient_data("backtest requires at least one priced day"));
    }
    if price_history.windows(2).any(|w| w[0].0 >= w[1].0) {
        return Err(AnalyticsError::invalid_input("price history must be strictly ascending by date"));
    }
    if config.initial_capital <= 0.0 {
        return Err(AnalyticsError::invalid_input("initial_capital must be strictly positive"));
    }

    let mut cash = config.initial_capital;
    let mut shares: HashMap<String, f64> = HashMap::new();
    let mut avg_cost: HashMap<String, f64> = HashMap::new();
    let mut trades_by_symbol: HashMap<String, Vec<Trade>> = HashMap::new();

    let mut dates = Vec::with_capacity(price_history.len());
    let mut equity_curve = Vec::with_capacity(price_history.len());
    let mut total_commission = 0.0;
    let mut total_slippage = 0.0;
    let mut bars_since_rebalance = 0usize;

    for (date, prices) in price_history {
        let should_rebalance = bars_since_rebalance == 0 || config.rebalance_interval == 0 || bars_since_rebalance >= config.rebalance_interval;

        if should_rebalance {
            for symbol in prices.keys() {
                avg_cost.entry(symbol.clone()).or_insert_with(|| prices[symbol]);
            }
            let current = snapshot(cash, &shares, &avg_cost, prices);
            let targets = strategy.target_weights(*date, prices, &current)?;
            if !targets.is_empty() {
                let priced = snapshot_with_placeholders(&current, prices, &targets);
                let deltas = priced.rebalance_to(&targets)?;
                for (symbol, delta) in deltas {
                    if delta.abs() < 1e-9 {
                        continue;
                    }
                    let price = *prices
                        .get(&symbol)
                        .ok_or_else(|| AnalyticsError::invalid_symbol(format!("no price for symbol '{symbol}' on rebalance day")))?;
                    let commission = delta.abs() * price * config.commission_rate;
                    let slippage_per_share = price * config.slippage_rate;
                    total_commission += commission;
                    total_slippage += slippage_per_share * delta.abs();
                    apply_fill(&mut cash, &mut shares, &mut avg_cost, &symbol, delta, price);
                    cash -= commission + slippage_per_share * delta.abs();
                    let trade = Trade::new(delta, price, *date, commission, slippage_per_share)?;
                    trades_by_symbol.entry(symbol).or_default().push(trade);
                }
            }
            bars_since_rebalance = 0;
        }
        bars_since_rebalance += 1;

        let value = cash + shares.iter().map(|(s, &q)| q * prices.get(s).copied().unwrap_or(0.0)).sum::<f64>();
        dates.push(*date);
        equity_curve.push(value);
    }

    let daily_returns: Vec<f64> = equity_curve.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let periods_per_year = Frequency::Daily.periods_per_year();

    let sharpe = sharpe_ratio(&daily_returns, 0.0, periods_per_year).unwrap_or(0.0);
    let sortino = sortino_ratio(&daily_returns, 0.0, periods_per_year).unwrap_or(0.0);
    let cagr_value = cagr(&daily_returns, periods_per_year).unwrap_or(0.0);
    let (max_dd, _) = max_drawdown(&daily_returns).unwrap_or((0.0, Vec::new()));

    let final_prices = price_history.last().map(|(_, p)| p.clone()).unwrap_or_default();
    let final_holdings = snapshot(cash, &shares, &avg_cost, &final_prices);

    let (round_trips, open_lots) = build_round_trips(&trades_by_symbol)?;

    Ok(BacktestResult {
        dates,
        equity_curve,
        daily_returns,
        final_holdings,
        total_commission,
        total_slippage,
        sharpe,
        sortino,
        cagr: cagr_value,
        max_drawdown: max_dd,
        round_trips,
        open_lots,
    })
}

/// Add zero-share placeholder holdings for any target symbol not already
/// held, so `rebalance_to` can look up a price for brand-new positions.
fn snapshot_with_placeholders(current: &PortfolioHoldings, prices: &HashMap<String, f64>, targets: &HashMap<String, f64>) -> PortfolioHoldings {
    let mut holdings = current.holdings.clone();
    for symbol in targets.keys() {
        if !holdings.contains_key(symbol) {
            if let Some(&price) = prices.get(symbol) {
                if let Ok(h) = Holding::new(0.0, price.max(1e-9), price.max(1e-9)) {
                    holdings.insert(symbol.clone(), h);
                }
            }
        }
    }
    PortfolioHoldings::new(current.cash, holdings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn history(prices: &[(Timestamp, f64, f64)]) -> Vec<(Timestamp, HashMap<String, f64>)> {
        prices
            .iter()
            .map(|(d, a, b)| {
                let mut m = HashMap::new();
                m.insert("A".to_string(), *a);
                m.insert("B".to_string(), *b);
                (*d, m)
            })
            .collect()
    }

    #[test]
    fn equal_weight_backtest_tracks_blended_returns() {
        let prices = history(&[
            (date(2024, 1, 1), 100.0, 50.0),
            (date(2024, 1, 2), 110.0, 50.0),
            (date(2024, 1, 3), 110.0, 55.0),
        ]);
        let config = BacktestConfig { commission_rate: 0.0, slippage_rate: 0.0, ..Default::default() };
        let mut strategy = EqualWeightStrategy;
        let result = run_backtest(&mut strategy, &prices, config).unwrap();
        assert_eq!(result.equity_curve.len(), 3);
        assert_relative_eq!(result.equity_curve[0], config.initial_capital, epsilon = 1e-6);
        // day 2: A +10%, B flat, equal weighted => +5%
        assert_relative_eq!(result.daily_returns[0], 0.05, epsilon = 1e-6);
    }

    #[test]
    fn buy_and_hold_only_trades_once() {
        let prices = history(&[
            (date(2024, 1, 1), 100.0, 50.0),
            (date(2024, 1, 2), 105.0, 52.0),
            (date(2024, 1, 3), 108.0, 53.0),
        ]);
        let mut weights = HashMap::new();
        weights.insert("A".to_string(), 0.6);
        weights.insert("B".to_string(), 0.4);
        let config = BacktestConfig { commission_rate: 0.0, slippage_rate: 0.0, rebalance_interval: usize::MAX, ..Default::default() };
        let mut strategy = BuyAndHoldStrategy::new(weights);
        let result = run_backtest(&mut strategy, &prices, config).unwrap();
        let total_fills: usize = result.round_trips.len() + result.open_lots.len();
        assert!(total_fills > 0);
        assert!(result.final_holdings.holdings.contains_key("A"));
    }

    #[test]
    fn commission_and_slippage_reduce_equity() {
        let prices = history(&[(date(2024, 1, 1), 100.0, 50.0), (date(2024, 1, 2), 100.0, 50.0)]);
        let config = BacktestConfig { commission_rate: 0.01, slippage_rate: 0.01, ..Default::default() };
        let mut strategy = EqualWeightStrategy;
        let result = run_backtest(&mut strategy, &prices, config).unwrap();
        assert!(result.total_commission > 0.0);
        assert!(result.total_slippage > 0.0);
        assert!(result.equity_curve[1] < config.initial_capital);
    }

    #[test]
    fn rejects_empty_history_and_nonascending_dates() {
        let mut strategy = EqualWeightStrategy;
        assert!(run_backtest(&mut strategy, &[], BacktestConfig::default()).is_err());
        let bad = vec![
            (date(2024, 1, 2), HashMap::from([("A".to_string(), 1.0)])),
            (date(2024, 1, 1), HashMap::from([("A".to_string(), 1.0)])),
        ];
        assert!(run_backtest(&mut strategy, &bad, BacktestConfig::default()).is_err());
    }
}
