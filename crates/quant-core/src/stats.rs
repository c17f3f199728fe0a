//! Scalar descriptive statistics shared by the ratio, VaR, and regime
//! modules. Grounded in the teacher's `shared_math` helpers, with the normal
//! distribution functions delegated to `statrs` rather than hand-rolled.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{AnalyticsError, AnalyticsResult};

pub fn mean(values: &[f64]) -> AnalyticsResult<f64> {
    if values.is_empty() {
        return Err(AnalyticsError::insufficient_data("mean requires at least one observation"));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (N-1 denominator).
pub fn variance(values: &[f64]) -> AnalyticsResult<f64> {
    if values.len() < 2 {
        return Err(AnalyticsError::insufficient_data("variance requires at least two observations"));
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Ok(ss / (values.len() - 1) as f64)
}

pub fn std_dev(values: &[f64]) -> AnalyticsResult<f64> {
    variance(values).map(f64::sqrt)
}

/// Sample skewness with the standard bias correction, `g1 * sqrt(n(n-1))/(n-2)`.
pub fn skewness(values: &[f64]) -> AnalyticsResult<f64> {
    let n = values.len();
    if n < 3 {
        return Err(AnalyticsError::insufficient_data("skewness requires at least three observations"));
    }
    let m = mean(values)?;
    let s = std_dev(values)?;
    if s == 0.0 {
        return Err(AnalyticsError::division_by_zero("skewness undefined for zero-variance series"));
    }
    let nf = n as f64;
    let g1 = values.iter().map(|v| ((v - m) / s).powi(3)).sum::<f64>() / nf;
    Ok(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
}

/// Sample excess kurtosis (kurtosis minus 3), bias-corrected.
pub fn excess_kurtosis(values: &[f64]) -> AnalyticsResult<f64> {
    let n = values.len();
    if n < 4 {
        return Err(AnalyticsError::insufficient_data("kurtosis requires at least four observations"));
    }
    let m = mean(values)?;
    let s = std_dev(values)?;
    if s == 0.0 {
        return Err(AnalyticsError::division_by_zero("kurtosis undefined for zero-variance series"));
    }
    let nf = n as f64;
    let m4 = values.iter().map(|v| ((v - m) / s).powi(4)).sum::<f64>() / nf;
    let g2 = (nf + 1.0) * m4 - 3.0 * (nf - 1.0);
    Ok(g2 * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0)))
}

/// Linear-interpolated quantile over `[0, 1]`, matching numpy's default.
pub fn quantile(values: &[f64], q: f64) -> AnalyticsResult<f64> {
    if values.is_empty() {
        return Err(AnalyticsError::insufficient_data("quantile requires at least one observation"));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(AnalyticsError::invalid_input(format!("quantile {q} out of range [0, 1]")));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n == 1 {
        return Ok(sorted[0]);
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Ok(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Pearson correlation coefficient between two equal-length series.
pub fn correlation(a: &[f64], b: &[f64]) -> AnalyticsResult<f64> {
    if a.len() != b.len() {
        return Err(AnalyticsError::invalid_input("correlation requires equal-length series"));
    }
    if a.len() < 2 {
        return Err(AnalyticsError::insufficient_data("correlation requires at least two observations"));
    }
    let ma = mean(a)?;
    let mb = mean(b)?;
    let cov: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let var_a: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
    let var_b: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        return Err(AnalyticsError::division_by_zero("correlation undefined when a series has zero variance"));
    }
    Ok(cov / denom)
}

pub fn normal_cdf(x: f64, mean: f64, std_dev: f64) -> AnalyticsResult<f64> {
    let dist = Normal::new(mean, std_dev)
        .map_err(|e| AnalyticsError::calculation_error(format!("invalid normal distribution: {e}")))?;
    Ok(dist.cdf(x))
}

pub fn normal_pdf(x: f64, mean: f64, std_dev: f64) -> AnalyticsResult<f64> {
    use statrs::distribution::Continuous;
    let dist = Normal::new(mean, std_dev)
        .map_err(|e| AnalyticsError::calculation_error(format!("invalid normal distribution: {e}")))?;
    Ok(dist.pdf(x))
}

/// Inverse normal CDF (quantile function).
pub fn normal_ppf(p: f64, mean: f64, std_dev: f64) -> AnalyticsResult<f64> {
    if !(0.0..=1.0).contains(&p) {
        return Err(AnalyticsError::invalid_input(format!("probability {p} out of range [0, 1]")));
    }
    let dist = Normal::new(mean, std_dev)
        .map_err(|e| AnalyticsError::calculation_error(format!("invalid normal distribution: {e}")))?;
    Ok(dist.inverse_cdf(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_and_variance_on_known_series() {
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(mean(&v).unwrap(), 3.0);
        assert_relative_eq!(variance(&v).unwrap(), 2.5);
    }

    #[test]
    fn quantile_median_odd_and_even() {
        assert_relative_eq!(quantile(&[1.0, 2.0, 3.0], 0.5).unwrap(), 2.0);
        assert_relative_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5).unwrap(), 2.5);
    }

    #[test]
    fn correlation_perfect_positive_and_negative() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(correlation(&a, &b).unwrap(), 1.0, epsilon = 1e-9);
        let c = vec![8.0, 6.0, 4.0, 2.0];
        assert_relative_eq!(correlation(&a, &c).unwrap(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn normal_cdf_at_mean_is_one_half() {
        assert_relative_eq!(normal_cdf(0.0, 0.0, 1.0).unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn normal_ppf_is_cdf_inverse() {
        let p = normal_cdf(1.5, 0.0, 1.0).unwrap();
        let x = normal_ppf(p, 0.0, 1.0).unwrap();
        assert_relative_eq!(x, 1.5, epsilon = 1e-6);
    }

    #[test]
    fn insufficient_data_errors() {
        assert!(variance(&[1.0]).is_err());
        assert!(skewness(&[1.0, 2.0]).is_err());
        assert!(excess_kurtosis(&[1.0, 2.0, 3.0]).is_err());
    }
}
