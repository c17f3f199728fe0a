//! Brinson-Hood-Beebower attribution (spec component C12). Grounded in the
//! teacher's `backtest-engine/src/factor_attribution.rs` record shape
//! (beta/alpha/r_squared as a standalone struct rather than inlined scalars),
//! generalized to the documented sector-level allocation/selection/
//! interaction decomposition, which the teacher does not implement.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};

/// Per-sector Brinson decomposition for a single period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrinsonRow {
    pub sector: String,
    pub allocation: f64,
    pub selection: f64,
    pub interaction: f64,
    pub total: f64,
}

/// Which allocation-effect formula to use. The library's historical default
/// is the simplified form; `Textbook` is offered alongside it (spec §4.7/§9
/// — implementers must match the simplified source formula for parity and
/// offer the textbook variant under a flag, not silently replace it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationFormula {
    /// `(wP_s - wB_s) * rB_s`, matching the library's source.
    Simplified,
    /// `(wP_s - wB_s) * (rB_s - rB)`, the textbook formula.
    Textbook,
}

/// One period's Brinson attribution across sectors.
pub fn brinson_attribution(
    portfolio_weights: &HashMap<String, f64>,
    benchmark_weights: &HashMap<String, f64>,
    portfolio_returns: &HashMap<String, f64>,
    benchmark_returns: &HashMap<String, f64>,
    formula: AllocationFormula,
) -> AnalyticsResult<Vec<BrinsonRow>> {
    let mut sectors: Vec<&String> = portfolio_weights.keys().chain(benchmark_weights.keys()).collect();
    sectors.sort();
    sectors.dedup();
    if sectors.is_empty() {
        return Err(AnalyticsError::insufficient_data("Brinson attribution requires at least one sector"));
    }

    let benchmark_total_return: f64 = sectors
        .iter()
        .map(|s| {
            let w = benchmark_weights.get(*s).copied().unwrap_or(0.0);
            let r = benchmark_returns.get(*s).copied().unwrap_or(0.0);
            w * r
        })
        .sum();

    let mut rows = Vec::with_capacity(sectors.len());
    for sector in sectors {
        let w_p = portfolio_weights.get(sector).copied().unwrap_or(0.0);
        let w_b = benchmark_weights.get(sector).copied().unwrap_or(0.0);
        let r_p = portfolio_returns
            .get(sector)
            .copied()
            .ok_or_else(|| AnalyticsError::invalid_symbol(format!("no portfolio return for sector '{sector}'")))?;
        let r_b = benchmark_returns
            .get(sector)
            .copied()
            .ok_or_else(|| AnalyticsError::invalid_symbol(format!("no benchmark return for sector '{sector}'")))?;

        let allocation = match formula {
            AllocationFormula::Simplified => (w_p - w_b) * r_b,
            AllocationFormula::Textbook => (w_p - w_b) * (r_b - benchmark_total_return),
        };
        let selection = w_b * (r_p - r_b);
        let interaction = (w_p - w_b) * (r_p - r_b);
        let total = allocation + selection + interaction;

        rows.push(BrinsonRow { sector: sector.clone(), allocation, selection, interaction, total });
    }
    Ok(rows)
}

/// One period's attribution row set plus the active return it should
/// reconcile to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrinsonPeriod {
    pub rows: Vec<BrinsonRow>,
    pub active_return: f64,
}

/// Brinson attribution over multiple periods; `periods[i]` pairs a period's
/// weight/return maps.
pub fn multi_period_attribution(
    periods: &[(HashMap<String, f64>, HashMap<String, f64>, HashMap<String, f64>, HashMap<String, f64>)],
    formula: AllocationFormula,
) -> AnalyticsResult<Vec<BrinsonPeriod>> {
    periods
        .iter()
        .map(|(pw, bw, pr, br)| {
            let rows = brinson_attribution(pw, bw, pr, br, formula)?;
            let portfolio_total: f64 = rows
                .iter()
                .map(|row| pw.get(&row.sector).copied().unwrap_or(0.0) * pr.get(&row.sector).copied().unwrap_or(0.0))
                .sum();
            let benchmark_total: f64 = rows
                .iter()
                .map(|row| bw.get(&row.sector).copied().unwrap_or(0.0) * br.get(&row.sector).copied().unwrap_or(0.0))
                .sum();
            Ok(BrinsonPeriod { rows, active_return: portfolio_total - benchmark_total })
        })
        .collect()
}

/// Whether the sum of each period's effects reconciles to its active return
/// within `tol`.
pub fn is_consistent(periods: &[BrinsonPeriod], tol: f64) -> bool {
    periods.iter().all(|p| {
        let total: f64 = p.rows.iter().map(|r| r.total).sum();
        (total - p.active_return).abs() < tol
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn map(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn two_sector_scenario_reconciles_to_active_return() {
        // Spec §8 scenario 6. The per-sector totals telescope to
        // wP.rP - wB.rB regardless of which allocation formula is used;
        // for these weights/returns that active return is 0.001, not 0.
        let wp = map(&[("A", 0.6), ("B", 0.4)]);
        let wb = map(&[("A", 0.5), ("B", 0.5)]);
        let rp = map(&[("A", 0.02), ("B", 0.01)]);
        let rb = map(&[("A", 0.01), ("B", 0.02)]);
        let rows = brinson_attribution(&wp, &wb, &rp, &rb, AllocationFormula::Simplified).unwrap();
        let total: f64 = rows.iter().map(|r| r.total).sum();
        assert_relative_eq!(total, 0.001, epsilon = 1e-12);
    }

    #[test]
    fn identical_portfolio_and_benchmark_yields_zero_effects() {
        let w = map(&[("A", 0.5), ("B", 0.5)]);
        let r = map(&[("A", 0.02), ("B", -0.01)]);
        let rows = brinson_attribution(&w, &w, &r, &r, AllocationFormula::Simplified).unwrap();
        for row in rows {
            assert_relative_eq!(row.allocation, 0.0, epsilon = 1e-12);
            assert_relative_eq!(row.selection, 0.0, epsilon = 1e-12);
            assert_relative_eq!(row.interaction, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn missing_sector_return_is_invalid_symbol() {
        let wp = map(&[("A", 1.0)]);
        let wb = map(&[("A", 1.0)]);
        let rp = map(&[("A", 0.01)]);
        let rb = HashMap::new();
        assert!(matches!(
            brinson_attribution(&wp, &wb, &rp, &rb, AllocationFormula::Simplified),
            Err(AnalyticsError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn multi_period_reconciles_within_tolerance() {
        let wp = map(&[("A", 0.6), ("B", 0.4)]);
        let wb = map(&[("A", 0.5), ("B", 0.5)]);
        let rp = map(&[("A", 0.02), ("B", 0.01)]);
        let rb = map(&[("A", 0.01), ("B", 0.02)]);
        let periods = vec![(wp, wb, rp, rb)];
        let result = multi_period_attribution(&periods, AllocationFormula::Simplified).unwrap();
        assert!(is_consistent(&result, 1e-6));
    }
}
