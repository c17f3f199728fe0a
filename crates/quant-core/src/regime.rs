//! Regime detection (spec component C8): an ensemble of threshold
//! heuristics, a Gaussian Hidden-Markov-Model fit by forward-backward EM,
//! and CUSUM structural-break detection.
//!
//! Grounded in the teacher's `market-regime-detector::classify_regime`
//! score-and-threshold shape, generalized from the teacher's ad-hoc
//! five-state scoring to the documented volatility/trend/tail ensemble, plus
//! a from-scratch HMM and CUSUM estimator the teacher does not carry.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::stats::{mean, std_dev};
use crate::var::historical_var_es;

/// Qualitative market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimeType {
    Bull,
    Bear,
    Volatile,
    Stable,
    Crisis,
    Recovery,
}

/// Threshold configuration for the ensemble detector.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleConfig {
    pub window: usize,
    pub vol_threshold: f64,
    pub trend_threshold: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self { window: 21, vol_threshold: 0.02, trend_threshold: 0.001 }
    }
}

/// Classification for one index plus the ensemble's confidence, `(# signals
/// in the majority) / 3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleCall {
    pub regime: RegimeType,
    pub confidence: f64,
}

/// Right-aligned ensemble classification: output index `i` summarizes
/// `returns[i-window+1..=i]`, mirroring `TimeSeries::rolling`'s convention.
///
/// Crisis is gated on the tail signal alone (a VaR breach), matching
/// `combine_regime_signals` in the original implementation: a volatility
/// spike with no tail breach falls through to the Volatile/Bear branches
/// instead of forcing Crisis.
pub fn ensemble_detect(returns: &[f64], config: EnsembleConfig) -> AnalyticsResult<Vec<EnsembleCall>> {
    if config.window == 0 || config.window > returns.len() {
        return Err(AnalyticsError::invalid_input(format!(
            "ensemble window {} out of range [1, {}]",
            config.window,
            returns.len()
        )));
    }
    let mut out = Vec::with_capacity(returns.len() - config.window + 1);
    for i in config.window - 1..returns.len() {
        let window = &returns[i + 1 - config.window..=i];
        out.push(classify_window(window, returns[i], config)?);
    }
    Ok(out)
}

fn classify_window(window: &[f64], current: f64, config: EnsembleConfig) -> AnalyticsResult<EnsembleCall> {
    let vol = std_dev(window)?;
    let trend = mean(window)?;
    let var_5 = historical_var_es(window, 0.95)?.var;

    #[derive(Clone, Copy, PartialEq)]
    enum Signal {
        Crisis,
        Volatile,
        Stable,
        Bull,
        Bear,
        Recovery,
    }

    let vol_signal = if vol > 2.0 * config.vol_threshold {
        Signal::Crisis
    } else if vol > config.vol_threshold {
        Signal::Volatile
    } else {
        Signal::Stable
    };

    let trend_signal = if trend > config.trend_threshold {
        Signal::Bull
    } else if trend < -config.trend_threshold {
        Signal::Bear
    } else {
        Signal::Recovery
    };

    let tail_signal = if current <= 1.5 * var_5 { Signal::Crisis } else { Signal::Recovery };

    let signals = [vol_signal, trend_signal, tail_signal];
    let majority_count = |target: &Signal| signals.iter().filter(|s| *s == target).count();

    let combined = if tail_signal == Signal::Crisis {
        RegimeType::Crisis
    } else if vol_signal == Signal::Volatile && trend_signal == Signal::Bear {
        RegimeType::Bear
    } else if vol_signal == Signal::Volatile && trend_signal == Signal::Bull {
        RegimeType::Volatile
    } else if vol_signal == Signal::Stable {
        match trend_signal {
            Signal::Bull => RegimeType::Bull,
            Signal::Bear => RegimeType::Bear,
            _ => RegimeType::Recovery,
        }
    } else {
        match trend_signal {
            Signal::Bull => RegimeType::Bull,
            Signal::Bear => RegimeType::Bear,
            _ => RegimeType::Recovery,
        }
    };

    let majority = match combined {
        RegimeType::Crisis => majority_count(&Signal::Crisis),
        RegimeType::Volatile => majority_count(&Signal::Volatile),
        RegimeType::Bull => majority_count(&Signal::Bull),
        RegimeType::Bear => majority_count(&Signal::Bear),
        _ => majority_count(&Signal::Recovery).max(majority_count(&Signal::Stable)),
    }
    .max(1);

    Ok(EnsembleCall { regime: combined, confidence: majority as f64 / 3.0 })
}

/// Gaussian-emission Markov-switching model fit by EM over the
/// forward-backward recursion.
#[derive(Debug, Clone)]
pub struct HmmFit {
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
    /// Row-stochastic `[from][to]` transition matrix.
    pub transition: Vec<Vec<f64>>,
    /// Smoothed posterior `gamma_t(k)` for every observation and state.
    pub posteriors: Vec<Vec<f64>>,
    pub regimes: Vec<RegimeType>,
    pub log_likelihood: f64,
    pub iterations: usize,
}

fn gaussian_density(x: f64, mean: f64, variance: f64) -> f64 {
    let var = variance.max(1e-6);
    (-0.5 * (x - mean).powi(2) / var).exp() / (2.0 * std::f64::consts::PI * var).sqrt()
}

/// Fit a `num_regimes`-state Gaussian HMM. Initialized from the overall
/// mean/variance with small random perturbations; re-estimation uses the
/// documented `gamma_t(i)*gamma_t+1(j)` approximation to the joint posterior
/// (spec §4.4/§9 — an intentional under-coupling, not silently corrected).
pub fn fit_hmm(
    returns: &[f64],
    num_regimes: usize,
    trend_threshold: f64,
    max_iter: usize,
    seed: Option<u64>,
) -> AnalyticsResult<HmmFit> {
    if !(2..=5).contains(&num_regimes) {
        return Err(AnalyticsError::invalid_input("num_regimes must be in [2, 5]"));
    }
    if returns.len() < num_regimes * 2 {
        return Err(AnalyticsError::insufficient_data("HMM fit requires at least 2 observations per regime"));
    }

    let n = returns.len();
    let overall_mean = mean(returns)?;
    let overall_var = std_dev(returns)?.powi(2).max(1e-8);

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut means: Vec<f64> = (0..num_regimes)
        .map(|_| overall_mean + rng.gen_range(-0.1..0.1) * overall_var.sqrt())
        .collect();
    let mut variances: Vec<f64> = vec![overall_var; num_regimes];
    let mut transition: Vec<Vec<f64>> = (0..num_regimes)
        .map(|i| {
            (0..num_regimes)
                .map(|j| if i == j { 0.9 } else { 0.1 / (num_regimes - 1) as f64 })
                .collect()
        })
        .collect();
    let mut init: Vec<f64> = vec![1.0 / num_regimes as f64; num_regimes];

    let mut prev_ll = f64::NEG_INFINITY;
    let mut iterations = 0usize;
    let mut gamma: Vec<Vec<f64>> = vec![vec![0.0; num_regimes]; n];

    for iter in 0..max_iter {
        iterations = iter + 1;

        // Scaled forward pass.
        let mut alpha = vec![vec![0.0; num_regimes]; n];
        let mut scales = vec![0.0; n];
        for k in 0..num_regimes {
            alpha[0][k] = init[k] * gaussian_density(returns[0], means[k], variances[k]);
        }
        scales[0] = alpha[0].iter().sum::<f64>().max(1e-300);
        for k in 0..num_regimes {
            alpha[0][k] /= scales[0];
        }
        for t in 1..n {
            for k in 0..num_regimes {
                let inflow: f64 = (0..num_regimes).map(|j| alpha[t - 1][j] * transition[j][k]).sum();
                alpha[t][k] = inflow * gaussian_density(returns[t], means[k], variances[k]);
            }
            scales[t] = alpha[t].iter().sum::<f64>().max(1e-300);
            for k in 0..num_regimes {
                alpha[t][k] /= scales[t];
            }
        }

        // Scaled backward pass.
        let mut beta = vec![vec![0.0; num_regimes]; n];
        for k in 0..num_regimes {
            beta[n - 1][k] = 1.0;
        }
        for t in (0..n - 1).rev() {
            for k in 0..num_regimes {
                beta[t][k] = (0..num_regimes)
                    .map(|j| transition[k][j] * gaussian_density(returns[t + 1], means[j], variances[j]) * beta[t + 1][j])
                    .sum::<f64>()
                    / scales[t + 1];
            }
        }

        for t in 0..n {
            let denom: f64 = (0..num_regimes).map(|k| alpha[t][k] * beta[t][k]).sum::<f64>().max(1e-300);
            for k in 0..num_regimes {
                gamma[t][k] = alpha[t][k] * beta[t][k] / denom;
            }
        }

        let log_likelihood: f64 = scales.iter().map(|s| s.ln()).sum();

        for k in 0..num_regimes {
            let weight_sum: f64 = gamma.iter().map(|g| g[k]).sum::<f64>().max(1e-12);
            let new_mean = gamma.iter().zip(returns.iter()).map(|(g, r)| g[k] * r).sum::<f64>() / weight_sum;
            let new_var = gamma
                .iter()
                .zip(returns.iter())
                .map(|(g, r)| g[k] * (r - new_mean).powi(2))
                .sum::<f64>()
                / weight_sum;
            means[k] = new_mean;
            variances[k] = new_var.max(1e-6);
        }
        for i in 0..num_regimes {
            // Re-estimation uses the documented gamma_t(i)*gamma_t+1(j)
            // approximation rather than the true joint posterior xi_t(i,j).
            let row_norm: f64 = (0..num_regimes)
                .map(|j| (0..n - 1).map(|t| gamma[t][i] * gamma[t + 1][j]).sum::<f64>())
                .sum::<f64>()
                .max(1e-12);
            for j in 0..num_regimes {
                let num: f64 = (0..n - 1).map(|t| gamma[t][i] * gamma[t + 1][j]).sum();
                transition[i][j] = num / row_norm;
            }
        }
        init = gamma[0].clone();

        if (log_likelihood - prev_ll).abs() < 1e-6 {
            prev_ll = log_likelihood;
            break;
        }
        prev_ll = log_likelihood;
    }

    let regimes = means
        .iter()
        .map(|&m| {
            if m > trend_threshold {
                RegimeType::Bull
            } else if m < -trend_threshold {
                RegimeType::Bear
            } else {
                RegimeType::Stable
            }
        })
        .collect();

    Ok(HmmFit {
        means,
        variances,
        transition,
        posteriors: gamma,
        regimes,
        log_likelihood: prev_ll,
        iterations,
    })
}

/// Summary statistics for one HMM state: mean, volatility, probability mass,
/// and mean dwell time `1/(1-P_kk)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeSummary {
    pub mean: f64,
    pub volatility: f64,
    pub probability_mass: f64,
    pub mean_dwell_time: f64,
}

pub fn regime_summaries(fit: &HmmFit) -> Vec<RegimeSummary> {
    let n = fit.posteriors.len() as f64;
    (0..fit.means.len())
        .map(|k| {
            let mass = fit.posteriors.iter().map(|g| g[k]).sum::<f64>() / n;
            let self_transition = fit.transition[k][k];
            let dwell = if (1.0 - self_transition).abs() < 1e-9 {
                f64::INFINITY
            } else {
                1.0 / (1.0 - self_transition)
            };
            RegimeSummary {
                mean: fit.means[k],
                volatility: fit.variances[k].sqrt(),
                probability_mass: mass,
                mean_dwell_time: dwell,
            }
        })
        .collect()
}

/// A CUSUM-detected structural break with its assigned directional regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralBreak {
    pub index: usize,
    pub regime: RegimeType,
}

/// `S_t = sum_{j<=t}(r_j - rbar)`; break at `t` when `|S_t| > tau =
/// 1.358*sqrt(N)*sigma` (an approximation of the Kolmogorov-like critical
/// value, per spec §4.4/§9 — documented, not tuned). Breaks are spaced at
/// least 20 observations apart and the first/last 10 indices are skipped.
pub fn cusum_breaks(returns: &[f64]) -> AnalyticsResult<Vec<StructuralBreak>> {
    if returns.len() < 20 {
        return Err(AnalyticsError::insufficient_data("CUSUM requires at least 20 observations"));
    }
    let n = returns.len();
    let rbar = mean(returns)?;
    let sigma = std_dev(returns)?;
    let tau = 1.358 * (n as f64).sqrt() * sigma;

    let mut cusum = 0.0;
    let mut series = Vec::with_capacity(n);
    for &r in returns {
        cusum += r - rbar;
        series.push(cusum);
    }

    let mut breaks = Vec::new();
    let mut last_break: Option<usize> = None;
    for t in 10..n.saturating_sub(10) {
        if series[t].abs() > tau && last_break.is_none_or(|l| t - l >= 20) {
            breaks.push(t);
            last_break = Some(t);
        }
    }

    let mut boundaries = vec![0usize];
    boundaries.extend(&breaks);
    boundaries.push(n);

    let mut out = Vec::with_capacity(breaks.len());
    for (seg_idx, window) in boundaries.windows(2).enumerate() {
        let (start, end) = (window[0], window[1]);
        if seg_idx == 0 {
            continue;
        }
        let seg_mean = mean(&returns[start..end])?;
        out.push(StructuralBreak {
            index: start,
            regime: if seg_mean >= 0.0 { RegimeType::Bull } else { RegimeType::Bear },
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_regimes(seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut out = Vec::new();
        for _ in 0..60 {
            out.push(0.01 + rng.gen_range(-0.002..0.002));
        }
        for _ in 0..60 {
            out.push(-0.01 + rng.gen_range(-0.002..0.002));
        }
        out
    }

    #[test]
    fn ensemble_detect_rejects_bad_window() {
        let returns = vec![0.01; 10];
        assert!(ensemble_detect(&returns, EnsembleConfig { window: 0, ..Default::default() }).is_err());
        assert!(ensemble_detect(&returns, EnsembleConfig { window: 11, ..Default::default() }).is_err());
    }

    #[test]
    fn ensemble_detect_flags_crisis_on_high_volatility() {
        let mut returns = vec![0.001; 25];
        returns[24] = -0.5;
        let calls = ensemble_detect(&returns, EnsembleConfig::default()).unwrap();
        assert_eq!(calls.last().unwrap().regime, RegimeType::Crisis);
    }

    #[test]
    fn hmm_fit_separates_two_trend_regimes() {
        let returns = synthetic_regimes(11);
        let fit = fit_hmm(&returns, 2, 0.001, 100, Some(11)).unwrap();
        assert_eq!(fit.means.len(), 2);
        let spread = (fit.means[0] - fit.means[1]).abs();
        assert!(spread > 0.005, "expected separated regime means, got {:?}", fit.means);
        assert!(fit.regimes.contains(&RegimeType::Bull));
        assert!(fit.regimes.contains(&RegimeType::Bear));
    }

    #[test]
    fn hmm_rejects_bad_regime_count() {
        let returns = synthetic_regimes(2);
        assert!(fit_hmm(&returns, 1, 0.001, 50, Some(1)).is_err());
        assert!(fit_hmm(&returns, 6, 0.001, 50, Some(1)).is_err());
    }

    #[test]
    fn cusum_detects_the_regime_switch() {
        let returns = synthetic_regimes(5);
        let breaks = cusum_breaks(&returns).unwrap();
        assert!(!breaks.is_empty());
        assert!(breaks.iter().any(|b| (50..70).contains(&b.index)));
    }

    #[test]
    fn cusum_requires_minimum_length() {
        assert!(cusum_breaks(&[0.01; 10]).is_err());
    }
}
