//! Liquidity- and impact-bounded position sizing (spec component C13,
//! supplement §4.9). No teacher equivalent exists in the pack's portfolio
//! crates; grounded in the documented square-root market-impact model and
//! expressed in the same "scalar in, `Result` out" idiom as `returns.rs`.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::stats::mean;

/// Square-root market-impact model: `impact_bps = k * sqrt(size / ADV)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityAnalyzer {
    pub impact_coefficient: f64,
}

impl CapacityAnalyzer {
    pub fn new(impact_coefficient: f64) -> Self {
        Self { impact_coefficient }
    }

    fn average_adv(&self, adv: &[f64]) -> AnalyticsResult<f64> {
        if adv.is_empty() {
            return Err(AnalyticsError::insufficient_data("capacity analysis requires a non-empty ADV series"));
        }
        if adv.iter().any(|&v| v <= 0.0) {
            return Err(AnalyticsError::invalid_input("ADV observations must be strictly positive"));
        }
        mean(adv)
    }

    /// Largest position such that `size/ADV <= participation_limit`.
    pub fn max_capacity(&self, adv: &[f64], participation_limit: f64) -> AnalyticsResult<f64> {
        if !(0.0..=1.0).contains(&participation_limit) || participation_limit <= 0.0 {
            return Err(AnalyticsError::invalid_input("participation_limit must be in (0, 1]"));
        }
        let avg_adv = self.average_adv(adv)?;
        Ok(avg_adv * participation_limit)
    }

    /// Expected impact in basis points for a target position size.
    pub fn estimate_impact(&self, size: f64, adv: &[f64]) -> AnalyticsResult<f64> {
        if size <= 0.0 {
            return Err(AnalyticsError::invalid_input("position size must be strictly positive"));
        }
        let avg_adv = self.average_adv(adv)?;
        Ok(self.impact_coefficient * (size / avg_adv).sqrt())
    }

    /// `ceil(size / (ADV * max_participation))`.
    pub fn days_to_liquidate(&self, size: f64, adv: &[f64], max_participation: f64) -> AnalyticsResult<u64> {
        if !(0.0..=1.0).contains(&max_participation) || max_participation <= 0.0 {
            return Err(AnalyticsError::invalid_input("max_participation must be in (0, 1]"));
        }
        if size <= 0.0 {
            return Err(AnalyticsError::invalid_input("position size must be strictly positive"));
        }
        let avg_adv = self.average_adv(adv)?;
        Ok((size / (avg_adv * max_participation)).ceil() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn max_capacity_scales_with_participation_limit() {
        let analyzer = CapacityAnalyzer::new(1.0);
        let adv = vec![1_000_000.0; 10];
        assert_relative_eq!(analyzer.max_capacity(&adv, 0.1).unwrap(), 100_000.0);
    }

    #[test]
    fn estimate_impact_follows_square_root_law() {
        let analyzer = CapacityAnalyzer::new(2.0);
        let adv = vec![1_000_000.0; 10];
        let impact = analyzer.estimate_impact(250_000.0, &adv).unwrap();
        assert_relative_eq!(impact, 2.0 * 0.5, epsilon = 1e-9);
    }

    #[test]
    fn days_to_liquidate_rounds_up() {
        let analyzer = CapacityAnalyzer::new(1.0);
        let adv = vec![1_000_000.0; 5];
        assert_eq!(analyzer.days_to_liquidate(250_000.0, &adv, 0.1).unwrap(), 3);
    }

    #[test]
    fn rejects_bad_participation_limit_and_empty_adv() {
        let analyzer = CapacityAnalyzer::new(1.0);
        assert!(analyzer.max_capacity(&[1.0], 0.0).is_err());
        assert!(analyzer.max_capacity(&[1.0], 1.5).is_err());
        assert!(analyzer.max_capacity(&[], 0.1).is_err());
    }
}
