//! Value-at-Risk / Expected Shortfall engine (spec component C7).
//!
//! Four estimators over the same sign convention: VaR is reported as a
//! (typically negative) return, not a positive loss magnitude. Grounded in
//! the teacher's Monte-Carlo simulation idiom (`backtest-engine/src/monte_carlo.rs`,
//! reshuffle-and-measure) and `shared_math`'s use of `statrs` for the normal
//! quantile used by the parametric and Cornish-Fisher variants.

use std::collections::HashMap;

use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use rand_distr::{Distribution, Normal};
use rand_chacha::ChaCha8Rng;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::stats::{excess_kurtosis, mean, normal_pdf, normal_ppf, quantile, skewness, std_dev};

fn validate_confidence(confidence: f64) -> AnalyticsResult<()> {
    if !(0.0..1.0).contains(&confidence) || confidence <= 0.0 {
        return Err(AnalyticsError::invalid_input(format!(
            "confidence {confidence} must be in (0, 1)"
        )));
    }
    Ok(())
}

fn validate_returns(returns: &[f64]) -> AnalyticsResult<()> {
    if returns.is_empty() {
        return Err(AnalyticsError::insufficient_data("VaR requires a non-empty return series"));
    }
    Ok(())
}

/// Value-at-Risk plus Expected Shortfall (mean of the tail beyond VaR).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarEs {
    pub var: f64,
    pub es: f64,
}

/// `VaR_c = quantile(r, 1-c)`; `ES = mean{r_i : r_i <= VaR_c}`.
pub fn historical_var_es(returns: &[f64], confidence: f64) -> AnalyticsResult<VarEs> {
    validate_returns(returns)?;
    validate_confidence(confidence)?;
    let var = quantile(returns, 1.0 - confidence)?;
    let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= var).collect();
    let es = if tail.is_empty() { var } else { mean(&tail)? };
    Ok(VarEs { var, es })
}

/// `VaR = mu + z*sigma`, `ES = mu - sigma*phi(z)/(1-c)` with `z = Phi^-1(1-c)`.
pub fn parametric_var_es(returns: &[f64], confidence: f64) -> AnalyticsResult<VarEs> {
    validate_returns(returns)?;
    validate_confidence(confidence)?;
    let mu = mean(returns)?;
    let sigma = std_dev(returns)?;
    let z = normal_ppf(1.0 - confidence, 0.0, 1.0)?;
    let var = mu + z * sigma;
    let phi_z = normal_pdf(z, 0.0, 1.0)?;
    let es = mu - sigma * phi_z / (1.0 - confidence);
    Ok(VarEs { var, es })
}

/// Parametric VaR/ES with the Gaussian quantile replaced by its
/// Cornish-Fisher expansion in sample skewness/kurtosis.
pub fn cornish_fisher_var_es(returns: &[f64], confidence: f64) -> AnalyticsResult<VarEs> {
    validate_returns(returns)?;
    validate_confidence(confidence)?;
    let mu = mean(returns)?;
    let sigma = std_dev(returns)?;
    let z = normal_ppf(1.0 - confidence, 0.0, 1.0)?;
    let skew = skewness(returns)?;
    let kurt = excess_kurtosis(returns)? + 3.0; // restore raw (non-excess) kurtosis for the formula
    let z2 = z * z;
    let z3 = z2 * z;
    let z_cf = z
        + (1.0 / 6.0) * (z2 - 1.0) * skew
        + (1.0 / 24.0) * (z3 - 3.0 * z) * (kurt - 3.0)
        - (1.0 / 36.0) * (2.0 * z3 - 5.0 * z) * skew * skew;
    let var = mu + z_cf * sigma;
    let phi_z = normal_pdf(z_cf, 0.0, 1.0)?;
    let es = mu - sigma * phi_z / (1.0 - confidence);
    Ok(VarEs { var, es })
}

/// Empirical VaR/ES over `num_samples` draws from `N(mu, sigma^2)`.
pub fn monte_carlo_var_es(
    returns: &[f64],
    confidence: f64,
    num_samples: usize,
    seed: Option<u64>,
) -> AnalyticsResult<VarEs> {
    validate_returns(returns)?;
    validate_confidence(confidence)?;
    if num_samples == 0 {
        return Err(AnalyticsError::invalid_input("Monte Carlo VaR requires at least one sample"));
    }
    let mu = mean(returns)?;
    let sigma = std_dev(returns)?;
    let dist = Normal::new(mu, sigma.max(1e-12))
        .map_err(|e| AnalyticsError::calculation_error(format!("invalid sampling distribution: {e}")))?;
    let mut rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };
    let samples: Vec<f64> = (0..num_samples).map(|_| dist.sample(&mut rng)).collect();
    historical_var_es(&samples, confidence)
}

/// Scale `(mu, sigma)` from `base_h` periods to a `h`-period horizon by `sqrt(h/base_h)`.
pub fn scale_horizon(mu: f64, sigma: f64, h: f64, base_h: f64) -> AnalyticsResult<(f64, f64)> {
    if h <= 0.0 || base_h <= 0.0 {
        return Err(AnalyticsError::invalid_input("horizon scaling requires positive horizons"));
    }
    let scale = (h / base_h).sqrt();
    Ok((mu * scale, sigma * scale))
}

/// Per-asset contribution to portfolio VaR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentVar {
    pub weight: f64,
    pub marginal: f64,
    pub component: f64,
    pub pct_contribution: f64,
}

/// Portfolio return series for a given weight vector over aligned per-asset
/// return series (all equal length, observation `t` lines up across assets).
fn portfolio_returns(weights: &[f64], asset_returns: &[&[f64]]) -> Vec<f64> {
    let n = asset_returns.first().map_or(0, |s| s.len());
    (0..n)
        .map(|t| weights.iter().zip(asset_returns.iter()).map(|(w, s)| w * s[t]).sum())
        .collect()
}

/// Finite-difference marginal/component VaR: perturb each weight by `delta`,
/// renormalize, recompute portfolio historical VaR, divide by `delta`.
pub fn marginal_component_var(
    weights: &[f64],
    asset_returns: &[&[f64]],
    confidence: f64,
) -> AnalyticsResult<Vec<ComponentVar>> {
    if weights.len() != asset_returns.len() {
        return Err(AnalyticsError::invalid_input("weights and asset return series must match in count"));
    }
    if weights.iter().any(|&w| w < 0.0) {
        return Err(AnalyticsError::invalid_input("component VaR requires non-negative weights"));
    }
    if weights.is_empty() {
        return Err(AnalyticsError::insufficient_data("component VaR requires at least one asset"));
    }
    const DELTA: f64 = 1e-3;
    let base_returns = portfolio_returns(weights, asset_returns);
    let base_var = historical_var_es(&base_returns, confidence)?.var;

    let mut marginals = Vec::with_capacity(weights.len());
    for i in 0..weights.len() {
        let mut bumped = weights.to_vec();
        bumped[i] += DELTA;
        let total: f64 = bumped.iter().sum();
        let normalized: Vec<f64> = bumped.iter().map(|w| w / total).collect();
        let bumped_returns = portfolio_returns(&normalized, asset_returns);
        let bumped_var = historical_var_es(&bumped_returns, confidence)?.var;
        marginals.push((bumped_var - base_var) / DELTA);
    }

    let components: Vec<f64> = weights.iter().zip(marginals.iter()).map(|(w, m)| w * m).collect();
    let total_component: f64 = components.iter().sum();

    Ok(weights
        .iter()
        .zip(marginals.iter())
        .zip(components.iter())
        .map(|((w, m), c)| ComponentVar {
            weight: *w,
            marginal: *m,
            component: *c,
            pct_contribution: if total_component.abs() > 1e-12 { c / total_component } else { 0.0 },
        })
        .collect())
}

/// A named multiplicative shock applied to one or more symbols' return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub shocks: HashMap<String, f64>,
}

impl StressScenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), shocks: HashMap::new() }
    }

    pub fn with_shock(mut self, symbol: impl Into<String>, multiplier: f64) -> Self {
        self.shocks.insert(symbol.into(), multiplier);
        self
    }
}

/// Apply a stress scenario to per-symbol return series and recompute
/// historical portfolio VaR/ES on the shocked series.
pub fn apply_stress(
    weights: &HashMap<String, f64>,
    asset_returns: &HashMap<String, Vec<f64>>,
    scenario: &StressScenario,
    confidence: f64,
) -> AnalyticsResult<VarEs> {
    let mut symbols: Vec<&String> = weights.keys().collect();
    symbols.sort();
    let n = symbols
        .first()
        .and_then(|s| asset_returns.get(*s))
        .map_or(0, |v| v.len());

    let mut shocked: Vec<Vec<f64>> = Vec::with_capacity(symbols.len());
    let mut w = Vec::with_capacity(symbols.len());
    for sym in &symbols {
        let series = asset_returns
            .get(*sym)
            .ok_or_else(|| AnalyticsError::invalid_symbol(format!("no return series for symbol '{sym}'")))?;
        if series.len() != n {
            return Err(AnalyticsError::invalid_input("all asset return series must be equal length"));
        }
        let mult = scenario.shocks.get(*sym).copied().unwrap_or(1.0);
        shocked.push(series.iter().map(|r| r * mult).collect());
        w.push(*weights.get(*sym).unwrap());
    }
    let refs: Vec<&[f64]> = shocked.iter().map(|v| v.as_slice()).collect();
    let port = portfolio_returns(&w, &refs);
    historical_var_es(&port, confidence)
}
