//! Return/risk computational kernel.
//!
//! Pure, stateless analytics over price and return series: performance
//! ratios, drawdowns, VaR/ES, regime detection, Bayesian posterior
//! sampling, round-trip trade accounting, and Brinson attribution.

pub mod attribution;
pub mod backtest;
pub mod bayesian;
pub mod calendar;
pub mod capacity;
pub mod error;
pub mod holdings;
pub mod pool;
pub mod regime;
pub mod regression;
pub mod returns;
pub mod roundtrip;
pub mod stats;
pub mod streaming;
pub mod timeseries;
pub mod var;

pub use attribution::{brinson_attribution, is_consistent, multi_period_attribution, AllocationFormula, BrinsonPeriod, BrinsonRow};
pub use backtest::{run_backtest, BacktestConfig, BacktestResult, BuyAndHoldStrategy, EqualWeightStrategy, Strategy};
pub use bayesian::{gibbs_sample, GibbsConfig, PosteriorMarginal, PosteriorSummary};
pub use calendar::BusinessCalendar;
pub use capacity::CapacityAnalyzer;
pub use error::{AnalyticsError, AnalyticsResult};
pub use holdings::{Holding, PortfolioHoldings};
pub use pool::{FixedBlockPool, PoolHandle, VariableBlockPool};
pub use regime::{cusum_breaks, ensemble_detect, fit_hmm, regime_summaries, EnsembleCall, EnsembleConfig, HmmFit, RegimeSummary, RegimeType, StructuralBreak};
pub use regression::{factor_attribution, ols_simple, FactorAttribution, OlsFit};
pub use roundtrip::{
    aggregate, build_round_trips, duration_bucket, group_by_duration_bucket, group_by_symbol, DurationBucket, OpenLot,
    RoundTrip, RoundTripAggregates, Trade,
};
pub use streaming::{RingBuffer, StreamObservation, StreamSummary, StreamingCore};
pub use timeseries::{AlignPolicy, FillPolicy, Frequency, TimeSeries, Timestamp};
pub use var::{
    apply_stress, cornish_fisher_var_es, historical_var_es, marginal_component_var, monte_carlo_var_es,
    parametric_var_es, scale_horizon, ComponentVar, StressScenario, VarEs,
};
