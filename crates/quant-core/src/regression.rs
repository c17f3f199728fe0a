//! Single-factor OLS regression, shared by the Treynor ratio, factor
//! attribution, and the Bayesian sampler's frequentist starting point.
//!
//! Grounded in the teacher's `shared_math::ols_regression` /
//! `factor_attribution::compute_factor_attribution`: `y = alpha + beta*x + e`
//! fit by minimizing sum of squared residuals. `FactorAttribution` mirrors
//! the teacher's standalone record of the same name (`backtest-engine`'s
//! `models::FactorAttribution`), annualizing alpha/tracking-error/residual
//! risk by a caller-supplied periods-per-year rather than a hardcoded 252.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::stats::mean;

/// Result of fitting `y = alpha + beta*x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    pub alpha: f64,
    pub beta: f64,
    pub r_squared: f64,
}

pub fn ols_simple(y: &[f64], x: &[f64]) -> AnalyticsResult<OlsFit> {
    if y.len() != x.len() {
        return Err(AnalyticsError::invalid_input("regression requires equal-length series"));
    }
    if y.len() < 2 {
        return Err(AnalyticsError::insufficient_data("regression requires at least two observations"));
    }
    let my = mean(y)?;
    let mx = mean(x)?;
    let cov: f64 = x.iter().zip(y.iter()).map(|(xi, yi)| (xi - mx) * (yi - my)).sum();
    let var_x: f64 = x.iter().map(|xi| (xi - mx).powi(2)).sum();
    if var_x == 0.0 {
        return Err(AnalyticsError::division_by_zero("regression undefined when the factor has zero variance"));
    }
    let beta = cov / var_x;
    let alpha = my - beta * mx;

    let ss_tot: f64 = y.iter().map(|yi| (yi - my).powi(2)).sum();
    let ss_res: f64 = y
        .iter()
        .zip(x.iter())
        .map(|(yi, xi)| (yi - (alpha + beta * xi)).powi(2))
        .sum();
    let r_squared = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    Ok(OlsFit { alpha, beta, r_squared })
}

/// Standalone factor-exposure summary shared between the Treynor ratio and
/// the Bayesian sampler's frequentist starting point (spec §3 supplement).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorAttribution {
    pub beta: f64,
    pub alpha_annualized: f64,
    pub r_squared: f64,
    pub tracking_error: f64,
    pub residual_risk: f64,
}

/// Fit `strategy_returns = alpha + beta*benchmark_returns + residual` and
/// annualize alpha, tracking error, and residual risk by `periods_per_year`.
pub fn factor_attribution(
    strategy_returns: &[f64],
    benchmark_returns: &[f64],
    periods_per_year: f64,
) -> AnalyticsResult<FactorAttribution> {
    let fit = ols_simple(strategy_returns, benchmark_returns)?;
    let n = strategy_returns.len() as f64;

    let diffs: Vec<f64> =
        strategy_returns.iter().zip(benchmark_returns.iter()).map(|(r, b)| r - b).collect();
    let mean_diff = mean(&diffs)?;
    let var_diff: f64 = diffs.iter().map(|d| (d - mean_diff).powi(2)).sum::<f64>() / (n - 1.0);
    let tracking_error = (var_diff * periods_per_year).sqrt();

    let residuals: Vec<f64> = strategy_returns
        .iter()
        .zip(benchmark_returns.iter())
        .map(|(r, b)| r - (fit.alpha + fit.beta * b))
        .collect();
    let mean_resid = mean(&residuals)?;
    let var_resid: f64 = residuals.iter().map(|e| (e - mean_resid).powi(2)).sum::<f64>() / (n - 1.0);
    let residual_risk = (var_resid * periods_per_year).sqrt();

    Ok(FactorAttribution {
        beta: fit.beta,
        alpha_annualized: fit.alpha * periods_per_year,
        r_squared: fit.r_squared,
        tracking_error,
        residual_risk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_linear_fit() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let fit = ols_simple(&y, &x).unwrap();
        assert_relative_eq!(fit.alpha, 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.beta, 3.0, epsilon = 1e-9);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_variance_factor_errors() {
        let x = vec![1.0, 1.0, 1.0];
        let y = vec![1.0, 2.0, 3.0];
        assert!(ols_simple(&y, &x).is_err());
    }

    #[test]
    fn factor_attribution_matches_ols_on_identical_series() {
        let x = vec![0.01, -0.02, 0.015, 0.03, -0.01, 0.02, 0.005, -0.015, 0.025, 0.01];
        let fa = factor_attribution(&x, &x, 252.0).unwrap();
        assert_relative_eq!(fa.beta, 1.0, epsilon = 1e-9);
        assert_relative_eq!(fa.alpha_annualized, 0.0, epsilon = 1e-9);
        assert_relative_eq!(fa.r_squared, 1.0, epsilon = 1e-9);
        assert_relative_eq!(fa.tracking_error, 0.0, epsilon = 1e-9);
        assert_relative_eq!(fa.residual_risk, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn factor_attribution_reports_nonzero_tracking_error_and_risk() {
        let x = vec![0.01, -0.02, 0.015, 0.03, -0.01, 0.02, 0.005, -0.015, 0.025, 0.01];
        let y: Vec<f64> = x.iter().enumerate().map(|(i, v)| 0.4 * v + if i % 2 == 0 { 0.002 } else { -0.001 }).collect();
        let fa = factor_attribution(&y, &x, 252.0).unwrap();
        assert!(fa.tracking_error > 0.0);
        assert!(fa.residual_risk > 0.0);
    }
}
