//! Returns, performance ratios, and drawdown accounting (spec component C5).
//!
//! Grounded in the teacher's `shared_math.rs` (Sharpe/Sortino/max-drawdown)
//! and `extended_metrics.rs` (Omega, Treynor), generalized to the documented
//! exact formulas rather than the teacher's fixed-252 shortcuts.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::regression::ols_simple;
use crate::stats::{mean, std_dev};
use crate::timeseries::Frequency;

/// Magnitudes below this are treated as exact zero when guarding divisions —
/// repeated floating-point addition rarely lands on a bit-exact zero even
/// when the underlying series is constant.
const ZERO_EPS: f64 = 1e-12;

/// Simple returns `r_i = p_i / p_{i-1} - 1`. Output has length N-1.
pub fn simple_returns(prices: &[f64]) -> AnalyticsResult<Vec<f64>> {
    validate_prices(prices)?;
    Ok(prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect())
}

/// Log returns `r_i = ln(p_i / p_{i-1})`. Output has length N-1.
pub fn log_returns(prices: &[f64]) -> AnalyticsResult<Vec<f64>> {
    validate_prices(prices)?;
    Ok(prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
}

fn validate_prices(prices: &[f64]) -> AnalyticsResult<()> {
    if prices.len() < 2 {
        return Err(AnalyticsError::insufficient_data("returns require at least two prices"));
    }
    if prices.iter().any(|&p| p <= 0.0) {
        return Err(AnalyticsError::invalid_input("prices must be strictly positive"));
    }
    Ok(())
}

/// `cum_i = (Prod_{j<=i} (1+r_j)) * S - S` for starting value `S`.
pub fn cumulative_returns(returns: &[f64], starting_value: f64) -> Vec<f64> {
    let mut acc = 1.0;
    returns
        .iter()
        .map(|r| {
            acc *= 1.0 + r;
            acc * starting_value - starting_value
        })
        .collect()
}

pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Per-period excess return over the risk-free rate, `r_i - rf/K`.
pub fn excess_returns(returns: &[f64], risk_free_annual: f64, periods_per_year: f64) -> Vec<f64> {
    let rf_period = risk_free_annual / periods_per_year;
    returns.iter().map(|r| r - rf_period).collect()
}

pub fn annualize_mean(mean_period: f64, periods_per_year: f64) -> f64 {
    mean_period * periods_per_year
}

pub fn annualize_vol(vol_period: f64, periods_per_year: f64) -> f64 {
    vol_period * periods_per_year.sqrt()
}

/// `(1 + total_return)^(1/years) - 1`, with `years = N/K`.
pub fn cagr(returns: &[f64], periods_per_year: f64) -> AnalyticsResult<f64> {
    let years = returns.len() as f64 / periods_per_year;
    if years <= 0.0 {
        return Err(AnalyticsError::invalid_input("CAGR requires a positive number of years"));
    }
    Ok((1.0 + total_return(returns)).powf(1.0 / years) - 1.0)
}

pub fn sharpe_ratio(returns: &[f64], risk_free_annual: f64, periods_per_year: f64) -> AnalyticsResult<f64> {
    let excess = excess_returns(returns, risk_free_annual, periods_per_year);
    let m = mean(&excess)?;
    let s = std_dev(&excess)?;
    if s.abs() < ZERO_EPS {
        return Err(AnalyticsError::division_by_zero("Sharpe ratio undefined when excess returns have zero volatility"));
    }
    Ok(m * periods_per_year.sqrt() / s)
}

/// `target_annual` is the minimum acceptable annual return `T`.
pub fn sortino_ratio(returns: &[f64], target_annual: f64, periods_per_year: f64) -> AnalyticsResult<f64> {
    if returns.is_empty() {
        return Err(AnalyticsError::insufficient_data("Sortino ratio requires at least one observation"));
    }
    let target_period = target_annual / periods_per_year;
    let downside_mean_sq = returns
        .iter()
        .map(|r| (r - target_period).min(0.0).powi(2))
        .sum::<f64>()
        / returns.len() as f64;
    let denom = downside_mean_sq.sqrt();
    if denom.abs() < ZERO_EPS {
        return Err(AnalyticsError::division_by_zero("Sortino ratio undefined when downside deviation is zero"));
    }
    let m = mean(returns)?;
    Ok(((m * periods_per_year) - target_annual) / (denom * periods_per_year.sqrt()))
}

pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> AnalyticsResult<f64> {
    let annualized = annualize_mean(mean(returns)?, periods_per_year);
    let (max_dd, _) = max_drawdown(returns)?;
    if max_dd.abs() < ZERO_EPS {
        return Err(AnalyticsError::division_by_zero("Calmar ratio undefined when max drawdown is zero"));
    }
    Ok(annualized / max_dd.abs())
}

pub fn information_ratio(portfolio: &[f64], benchmark: &[f64], periods_per_year: f64) -> AnalyticsResult<f64> {
    if portfolio.len() != benchmark.len() {
        return Err(AnalyticsError::invalid_input("information ratio requires equal-length series"));
    }
    let active: Vec<f64> = portfolio.iter().zip(benchmark.iter()).map(|(p, b)| p - b).collect();
    let m = mean(&active)?;
    let s = std_dev(&active)?;
    if s.abs() < ZERO_EPS {
        return Err(AnalyticsError::division_by_zero("information ratio undefined when active returns have zero volatility"));
    }
    Ok((m * periods_per_year) / (s * periods_per_year.sqrt()))
}

/// `(Sum(r-T')+) / (Sum(T'-r)+)`; infinite when the denominator is zero and
/// the numerator is positive.
pub fn omega_ratio(returns: &[f64], target_annual: f64, periods_per_year: f64) -> AnalyticsResult<f64> {
    if returns.is_empty() {
        return Err(AnalyticsError::insufficient_data("Omega ratio requires at least one observation"));
    }
    let target_period = target_annual / periods_per_year;
    let gains: f64 = returns.iter().map(|r| (r - target_period).max(0.0)).sum();
    let losses: f64 = returns.iter().map(|r| (target_period - r).max(0.0)).sum();
    if losses.abs() < ZERO_EPS {
        return if gains > 0.0 {
            Ok(f64::INFINITY)
        } else {
            Err(AnalyticsError::division_by_zero("Omega ratio undefined when both gains and losses are zero"))
        };
    }
    Ok(gains / losses)
}

/// Beta from regressing portfolio excess returns on benchmark excess returns.
pub fn treynor_ratio(
    portfolio_excess: &[f64],
    benchmark_excess: &[f64],
    periods_per_year: f64,
) -> AnalyticsResult<f64> {
    let fit = ols_simple(portfolio_excess, benchmark_excess)?;
    if fit.beta.abs() < ZERO_EPS {
        return Err(AnalyticsError::division_by_zero("Treynor ratio undefined when beta is zero"));
    }
    Ok((mean(portfolio_excess)? * periods_per_year) / fit.beta)
}

/// `max_drawdown, per-period drawdown series` where `dd_i = (m_i - equity_i)/m_i`.
pub fn max_drawdown(returns: &[f64]) -> AnalyticsResult<(f64, Vec<f64>)> {
    if returns.is_empty() {
        return Err(AnalyticsError::insufficient_data("drawdown requires at least one observation"));
    }
    let equity = equity_curve(returns);
    let mut peak = 1.0f64;
    let mut dd = Vec::with_capacity(equity.len());
    let mut max_dd = 0.0f64;
    for &e in &equity {
        peak = peak.max(e).max(1.0);
        let d = (peak - e) / peak;
        dd.push(d);
        max_dd = max_dd.max(d);
    }
    Ok((max_dd, dd))
}

fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut acc = 1.0;
    returns
        .iter()
        .map(|r| {
            acc *= 1.0 + r;
            acc
        })
        .collect()
}

/// A single peak-to-trough-to-recovery episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownEpisode {
    pub peak_index: usize,
    pub trough_index: usize,
    /// `None` if equity never recovers to the prior peak within the series.
    pub recovery_index: Option<usize>,
    pub max_drawdown: f64,
    pub duration: usize,
    pub recovery: Option<usize>,
}

/// Enumerate drawdown episodes, filtering those whose max drawdown is below
/// `min_drawdown`.
pub fn drawdown_episodes(returns: &[f64], min_drawdown: f64) -> AnalyticsResult<Vec<DrawdownEpisode>> {
    if returns.is_empty() {
        return Err(AnalyticsError::insufficient_data("drawdown episodes require at least one observation"));
    }
    let equity = equity_curve(returns);
    let mut episodes = Vec::new();
    let mut peak_idx = 0usize;
    let mut peak_val = equity[0].max(1.0);
    let mut in_drawdown = false;
    let mut trough_idx = 0usize;
    let mut trough_val = peak_val;

    for i in 0..equity.len() {
        if equity[i] >= peak_val {
            if in_drawdown {
                let dd = (peak_val - trough_val) / peak_val;
                if dd >= min_drawdown {
                    episodes.push(DrawdownEpisode {
                        peak_index: peak_idx,
                        trough_index: trough_idx,
                        recovery_index: Some(i),
                        max_drawdown: dd,
                        duration: trough_idx - peak_idx,
                        recovery: Some(i - trough_idx),
                    });
                }
                in_drawdown = false;
            }
            peak_idx = i;
            peak_val = equity[i];
            trough_val = peak_val;
            trough_idx = i;
        } else {
            in_drawdown = true;
            if equity[i] < trough_val {
                trough_val = equity[i];
                trough_idx = i;
            }
        }
    }

    if in_drawdown {
        let dd = (peak_val - trough_val) / peak_val;
        if dd >= min_drawdown {
            episodes.push(DrawdownEpisode {
                peak_index: peak_idx,
                trough_index: trough_idx,
                recovery_index: None,
                max_drawdown: dd,
                duration: trough_idx - peak_idx,
                recovery: None,
            });
        }
    }

    Ok(episodes)
}

/// Consecutive-days-since-last-peak counter, reset to 0 at each new peak.
pub fn underwater_duration(returns: &[f64]) -> AnalyticsResult<Vec<usize>> {
    if returns.is_empty() {
        return Err(AnalyticsError::insufficient_data("underwater duration requires at least one observation"));
    }
    let equity = equity_curve(returns);
    let mut peak = equity[0].max(1.0);
    let mut counter = 0usize;
    let mut out = Vec::with_capacity(equity.len());
    for &e in &equity {
        if e >= peak {
            peak = e;
            counter = 0;
        } else {
            counter += 1;
        }
        out.push(counter);
    }
    Ok(out)
}

pub fn periods_per_year(freq: Frequency) -> f64 {
    freq.periods_per_year()
}
