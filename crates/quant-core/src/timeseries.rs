//! Ordered timestamp -> value container with alignment, rolling windows, and
//! resampling. The hard-engineering piece of the crate (spec C3): every other
//! analytics component consumes `TimeSeries<f64>` and either returns a
//! scalar, another series, or a typed record.
//!
//! `rolling` fans its per-window reductions out across `rayon`'s thread pool
//! since each window is an independent slice of `values` — the teacher's
//! `rayon` dependency (declared for exactly this kind of hot loop) otherwise
//! went unused.

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};

/// A civil date with total order. Two timestamps compare equal iff they
/// represent the same day.
pub type Timestamp = NaiveDate;

/// Ordered sequence of `(timestamp, value)` pairs.
///
/// Invariants enforced at construction: timestamps are strictly increasing,
/// and `timestamps.len() == values.len()`. The container is immutable to
/// external readers once built — every transform returns a new series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    name: Option<String>,
    timestamps: Vec<Timestamp>,
    values: Vec<T>,
}

impl<T: Clone> TimeSeries<T> {
    /// Build a series, rejecting mismatched lengths or non-ascending timestamps.
    pub fn create(timestamps: Vec<Timestamp>, values: Vec<T>) -> AnalyticsResult<Self> {
        if timestamps.len() != values.len() {
            return Err(AnalyticsError::invalid_input(format!(
                "timestamps ({}) and values ({}) length mismatch",
                timestamps.len(),
                values.len()
            )));
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalyticsError::invalid_input(
                "timestamps must be strictly ascending",
            ));
        }
        Ok(Self {
            name: None,
            timestamps,
            values,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn first(&self) -> Option<(&Timestamp, &T)> {
        self.timestamps.first().zip(self.values.first())
    }

    pub fn last(&self) -> Option<(&Timestamp, &T)> {
        self.timestamps.last().zip(self.values.last())
    }

    /// Exact lookup by timestamp. O(log N) via binary search.
    pub fn at_time(&self, t: Timestamp) -> AnalyticsResult<&T> {
        self.timestamps
            .binary_search(&t)
            .map(|idx| &self.values[idx])
            .map_err(|_| AnalyticsError::missing_data(format!("no observation at {t}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Timestamp, &T)> {
        self.timestamps.iter().zip(self.values.iter())
    }
}

/// How to reconcile timestamps that appear in one series but not the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPolicy {
    Forward,
    Backward,
    Interpolate,
    Drop,
}

/// Alignment strategy for binary operations on two series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignPolicy {
    /// Keep only timestamps present in both series.
    Inner,
    /// Keep the union of timestamps, filling gaps per `FillPolicy`.
    Outer(FillPolicy),
}

/// Resampling frequency. Observations are bucketed by the calendar period
/// containing their timestamp; the emitted timestamp is the period start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// Periods per year, used throughout annualization (spec §4.2).
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Frequency::Daily => 252.0,
            Frequency::Weekly => 52.0,
            Frequency::Monthly => 12.0,
            Frequency::Quarterly => 4.0,
            Frequency::Yearly => 1.0,
        }
    }

    fn period_start(&self, t: Timestamp) -> Timestamp {
        match self {
            Frequency::Daily => t,
            Frequency::Weekly => t - chrono::Duration::days(t.weekday().num_days_from_monday() as i64),
            Frequency::Monthly => NaiveDate::from_ymd_opt(t.year(), t.month(), 1).unwrap(),
            Frequency::Quarterly => {
                let q_month = ((t.month0() / 3) * 3) + 1;
                NaiveDate::from_ymd_opt(t.year(), q_month, 1).unwrap()
            }
            Frequency::Yearly => NaiveDate::from_ymd_opt(t.year(), 1, 1).unwrap(),
        }
    }
}

impl TimeSeries<f64> {
    /// Intersect or union two series onto a common timestamp axis.
    pub fn align(
        &self,
        other: &TimeSeries<f64>,
        policy: AlignPolicy,
    ) -> AnalyticsResult<(TimeSeries<f64>, TimeSeries<f64>)> {
        match policy {
            AlignPolicy::Inner => self.align_inner(other),
            AlignPolicy::Outer(fill) => self.align_outer(other, fill),
        }
    }

    fn align_inner(&self, other: &TimeSeries<f64>) -> AnalyticsResult<(TimeSeries<f64>, TimeSeries<f64>)> {
        let mut ts = Vec::new();
        let mut a = Vec::new();
        let mut b = Vec::new();
        let (mut i, mut j) = (0usize, 0usize);
        while i < self.len() && j < other.len() {
            match self.timestamps[i].cmp(&other.timestamps[j]) {
                std::cmp::Ordering::Equal => {
                    ts.push(self.timestamps[i]);
                    a.push(self.values[i]);
                    b.push(other.values[j]);
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        Ok((TimeSeries::create(ts.clone(), a)?, TimeSeries::create(ts, b)?))
    }

    fn align_outer(
        &self,
        other: &TimeSeries<f64>,
        fill: FillPolicy,
    ) -> AnalyticsResult<(TimeSeries<f64>, TimeSeries<f64>)> {
        let mut union: Vec<Timestamp> = self
            .timestamps
            .iter()
            .chain(other.timestamps.iter())
            .copied()
            .collect();
        union.sort();
        union.dedup();

        let a = fill_onto(&self.timestamps, &self.values, &union, fill);
        let b = fill_onto(&other.timestamps, &other.values, &union, fill);

        if fill == FillPolicy::Drop {
            let mut ts = Vec::new();
            let mut av = Vec::new();
            let mut bv = Vec::new();
            for (t, (oa, ob)) in union.iter().zip(a.iter().zip(b.iter())) {
                if let (Some(x), Some(y)) = (oa, ob) {
                    ts.push(*t);
                    av.push(*x);
                    bv.push(*y);
                }
            }
            return Ok((TimeSeries::create(ts.clone(), av)?, TimeSeries::create(ts, bv)?));
        }

        let av: Vec<f64> = a.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        let bv: Vec<f64> = b.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        Ok((
            TimeSeries::create(union.clone(), av)?,
            TimeSeries::create(union, bv)?,
        ))
    }

    /// Right-aligned rolling reduction: the value at output index `i` is
    /// `f(values[i-window+1..=i])`, emitted at the timestamp of the last
    /// observation in the window.
    pub fn rolling<F>(&self, window: usize, f: F) -> AnalyticsResult<TimeSeries<f64>>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        if window == 0 || window > self.len() {
            return Err(AnalyticsError::invalid_input(format!(
                "rolling window {} out of range [1, {}]",
                window,
                self.len()
            )));
        }
        // Each window's reduction is independent of every other, so the
        // per-index work fans out across rayon's pool; `collect` preserves
        // the ascending index order the container's timestamps require.
        let out: Vec<f64> = (window - 1..self.len())
            .into_par_iter()
            .map(|i| f(&self.values[i + 1 - window..=i]))
            .collect();
        let ts: Vec<Timestamp> = self.timestamps[window - 1..].to_vec();
        TimeSeries::create(ts, out)
    }

    /// Partition by calendar period and reduce each bucket. Empty buckets are
    /// omitted; the emitted timestamp is the canonical period start.
    pub fn resample<F>(&self, freq: Frequency, f: F) -> AnalyticsResult<TimeSeries<f64>>
    where
        F: Fn(&[f64]) -> f64,
    {
        if self.is_empty() {
            return Err(AnalyticsError::insufficient_data("cannot resample an empty series"));
        }
        let mut buckets: Vec<(Timestamp, Vec<f64>)> = Vec::new();
        for (t, v) in self.iter() {
            let start = freq.period_start(*t);
            match buckets.last_mut() {
                Some((bstart, vals)) if *bstart == start => vals.push(*v),
                _ => buckets.push((start, vec![*v])),
            }
        }
        let mut ts = Vec::with_capacity(buckets.len());
        let mut out = Vec::with_capacity(buckets.len());
        for (start, vals) in buckets {
            ts.push(start);
            out.push(f(&vals));
        }
        TimeSeries::create(ts, out)
    }

    fn binary_op<F>(&self, other: &TimeSeries<f64>, op: F) -> AnalyticsResult<TimeSeries<f64>>
    where
        F: Fn(f64, f64) -> f64,
    {
        let (a, b) = self.align_inner(other)?;
        let out: Vec<f64> = a.values.iter().zip(b.values.iter()).map(|(x, y)| op(*x, *y)).collect();
        TimeSeries::create(a.timestamps, out)
    }

    pub fn add(&self, other: &TimeSeries<f64>) -> AnalyticsResult<TimeSeries<f64>> {
        self.binary_op(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &TimeSeries<f64>) -> AnalyticsResult<TimeSeries<f64>> {
        self.binary_op(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &TimeSeries<f64>) -> AnalyticsResult<TimeSeries<f64>> {
        self.binary_op(other, |a, b| a * b)
    }

    pub fn div(&self, other: &TimeSeries<f64>) -> AnalyticsResult<TimeSeries<f64>> {
        self.binary_op(other, |a, b| a / b)
    }
}

/// Compounding reducer for periodic returns: f(v) = Prod(1+vi) - 1.
pub fn compound_reducer(values: &[f64]) -> f64 {
    values.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

fn fill_onto(
    src_ts: &[Timestamp],
    src_vals: &[f64],
    union: &[Timestamp],
    fill: FillPolicy,
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(union.len());
    let mut idx = 0usize;
    let mut last_seen: Option<f64> = None;
    for t in union {
        while idx < src_ts.len() && src_ts[idx] < *t {
            last_seen = Some(src_vals[idx]);
            idx += 1;
        }
        if idx < src_ts.len() && src_ts[idx] == *t {
            out.push(Some(src_vals[idx]));
            last_seen = Some(src_vals[idx]);
            continue;
        }
        match fill {
            FillPolicy::Forward => out.push(last_seen),
            FillPolicy::Backward => {
                let next = src_ts[idx..].first().map(|_| src_vals[idx]);
                out.push(next.or(last_seen));
            }
            FillPolicy::Interpolate => {
                let prev = last_seen;
                let next = if idx < src_ts.len() { Some((src_ts[idx], src_vals[idx])) } else { None };
                match (prev, next) {
                    (Some(p), Some((nt, nv))) => {
                        // Linear interpolation over elapsed days.
                        let prev_t = src_ts[..idx].last().copied();
                        if let Some(pt) = prev_t {
                            let span = (nt - pt).num_days() as f64;
                            let frac = (*t - pt).num_days() as f64 / span.max(1.0);
                            out.push(Some(p + (nv - p) * frac));
                        } else {
                            out.push(Some(p));
                        }
                    }
                    (Some(p), None) => out.push(Some(p)),
                    (None, Some((_, nv))) => out.push(Some(nv)),
                    (None, None) => out.push(None),
                }
            }
            FillPolicy::Drop => out.push(None),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn create_rejects_mismatched_lengths() {
        let err = TimeSeries::create(vec![d(2024, 1, 1)], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidInput { .. }));
    }

    #[test]
    fn create_rejects_non_ascending() {
        let err = TimeSeries::create(vec![d(2024, 1, 2), d(2024, 1, 1)], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidInput { .. }));
    }

    #[test]
    fn at_time_exact_and_missing() {
        let ts = TimeSeries::create(vec![d(2024, 1, 1), d(2024, 1, 2)], vec![1.0, 2.0]).unwrap();
        assert_eq!(*ts.at_time(d(2024, 1, 1)).unwrap(), 1.0);
        assert!(ts.at_time(d(2024, 1, 3)).is_err());
    }

    #[test]
    fn rolling_is_right_aligned_and_validates_window() {
        let ts = TimeSeries::create(
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        let rolled = ts.rolling(2, |w| w.iter().sum()).unwrap();
        assert_eq!(rolled.len(), 3);
        assert_eq!(rolled.values(), &[3.0, 5.0, 7.0]);
        assert_eq!(rolled.timestamps()[0], d(2024, 1, 2));

        assert!(ts.rolling(0, |w| w.iter().sum()).is_err());
        assert!(ts.rolling(5, |w| w.iter().sum()).is_err());
    }

    #[test]
    fn resample_monthly_compounds_returns() {
        let ts = TimeSeries::create(
            vec![d(2024, 1, 1), d(2024, 1, 15), d(2024, 2, 1)],
            vec![0.01, 0.02, 0.03],
        )
        .unwrap();
        let monthly = ts.resample(Frequency::Monthly, compound_reducer).unwrap();
        assert_eq!(monthly.len(), 2);
        let expected_jan = 1.01 * 1.02 - 1.0;
        assert!((monthly.values()[0] - expected_jan).abs() < 1e-9);
    }

    #[test]
    fn align_inner_keeps_intersection() {
        let a = TimeSeries::create(vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)], vec![1.0, 2.0, 3.0]).unwrap();
        let b = TimeSeries::create(vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)], vec![20.0, 30.0, 40.0]).unwrap();
        let (ra, rb) = a.align(&b, AlignPolicy::Inner).unwrap();
        assert_eq!(ra.values(), &[2.0, 3.0]);
        assert_eq!(rb.values(), &[20.0, 30.0]);
    }

    #[test]
    fn align_outer_forward_fills() {
        let a = TimeSeries::create(vec![d(2024, 1, 1), d(2024, 1, 3)], vec![1.0, 3.0]).unwrap();
        let b = TimeSeries::create(vec![d(2024, 1, 2)], vec![2.0]).unwrap();
        let (ra, _rb) = a.align(&b, AlignPolicy::Outer(FillPolicy::Forward)).unwrap();
        assert_eq!(ra.len(), 3);
        assert_eq!(ra.values()[1], 1.0);
    }
}
