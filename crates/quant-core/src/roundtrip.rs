//! Round-trip reconstruction from a trade stream via FIFO lot matching
//! (spec component C11). Grounded in the teacher's `trade_analysis.rs`
//! expectancy/streak aggregates, generalized from "already-closed trade
//! records" to an explicit FIFO matcher the teacher does not build (the
//! teacher's backtest engine materializes closed trades directly).

use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};

/// A single signed fill: positive shares buy, negative shares sell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trade {
    pub shares: f64,
    pub price: f64,
    pub timestamp: NaiveDate,
    pub commission: f64,
    pub slippage: f64,
}

impl Trade {
    pub fn new(shares: f64, price: f64, timestamp: NaiveDate, commission: f64, slippage: f64) -> AnalyticsResult<Self> {
        if price <= 0.0 {
            return Err(AnalyticsError::invalid_input("trade price must be strictly positive"));
        }
        if shares == 0.0 {
            return Err(AnalyticsError::invalid_input("trade shares must be non-zero"));
        }
        Ok(Self { shares, price, timestamp, commission, slippage })
    }
}

/// A closed position reconstructed from matched opening and closing fills.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoundTrip {
    pub symbol_is_long: bool,
    pub open_ts: NaiveDate,
    pub close_ts: NaiveDate,
    pub shares: f64,
    pub open_price: f64,
    pub close_price: f64,
    pub open_commission: f64,
    pub close_commission: f64,
    pub open_slippage: f64,
    pub close_slippage: f64,
}

impl RoundTrip {
    /// `matched * (close - open)`, signed by long/short direction.
    pub fn gross_pnl(&self) -> f64 {
        let direction = if self.symbol_is_long { 1.0 } else { -1.0 };
        direction * self.shares * (self.close_price - self.open_price)
    }

    pub fn net_pnl(&self) -> f64 {
        self.gross_pnl()
            - (self.open_commission + self.close_commission + self.shares * (self.open_slippage + self.close_slippage))
    }

    pub fn duration(&self) -> i64 {
        (self.close_ts - self.open_ts).num_days()
    }
}

#[derive(Debug, Clone, Copy)]
struct Lot {
    shares: f64,
    price: f64,
    timestamp: NaiveDate,
    /// Per-share commission/slippage, fixed at lot creation so proportional
    /// allocation to partial matches needs no running recomputation.
    commission_per_share: f64,
    slippage_per_share: f64,
}

/// Remaining unmatched lots for one symbol after round-trip reconstruction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpenLot {
    pub is_long: bool,
    pub shares: f64,
    pub price: f64,
    pub timestamp: NaiveDate,
}

/// Reconstruct round trips per symbol via FIFO matching: each sell consumes
/// the front of the long queue (or opens a short if the long queue is
/// empty), mirrored for buys against a short queue.
pub fn build_round_trips(trades_by_symbol: &HashMap<String, Vec<Trade>>) -> AnalyticsResult<(Vec<(String, RoundTrip)>, Vec<(String, OpenLot)>)> {
    let mut round_trips = Vec::new();
    let mut open_lots = Vec::new();

    for (symbol, trades) in trades_by_symbol {
        let mut ordered = trades.clone();
        ordered.sort_by_key(|t| t.timestamp);

        let mut longs: VecDeque<Lot> = VecDeque::new();
        let mut shorts: VecDeque<Lot> = VecDeque::new();

        for trade in ordered {
            let mut remaining = trade.shares.abs();
            let is_buy = trade.shares > 0.0;
            let per_share_commission = trade.commission / trade.shares.abs();
            let per_share_slippage = trade.slippage / trade.shares.abs();

            if is_buy {
                // Buys close shorts first, FIFO, then open a long lot.
                while remaining > 1e-9 {
                    let Some(front) = shorts.front_mut() else { break };
                    let matched = remaining.min(front.shares);
                    round_trips.push((
                        symbol.clone(),
                        RoundTrip {
                            symbol_is_long: false,
                            open_ts: front.timestamp,
                            close_ts: trade.timestamp,
                            shares: matched,
                            open_price: front.price,
                            close_price: trade.price,
                            open_commission: front.commission_per_share * matched,
                            close_commission: per_share_commission * matched,
                            open_slippage: front.slippage_per_share * matched,
                            close_slippage: per_share_slippage * matched,
                        },
                    ));
                    front.shares -= matched;
                    if front.shares <= 1e-9 {
                        shorts.pop_front();
                    }
                    remaining -= matched;
                }
                if remaining > 1e-9 {
                    longs.push_back(Lot {
                        shares: remaining,
                        price: trade.price,
                        timestamp: trade.timestamp,
                        commission_per_share: per_share_commission,
                        slippage_per_share: per_share_slippage,
                    });
                }
            } else {
                while remaining > 1e-9 {
                    let Some(front) = longs.front_mut() else { break };
                    let matched = remaining.min(front.shares);
                    round_trips.push((
                        symbol.clone(),
                        RoundTrip {
                            symbol_is_long: true,
                            open_ts: front.timestamp,
                            close_ts: trade.timestamp,
                            shares: matched,
                            open_price: front.price,
                            close_price: trade.price,
                            open_commission: front.commission_per_share * matched,
                            close_commission: per_share_commission * matched,
                            open_slippage: front.slippage_per_share * matched,
                            close_slippage: per_share_slippage * matched,
                        },
                    ));
                    front.shares -= matched;
                    if front.shares <= 1e-9 {
                        longs.pop_front();
                    }
                    remaining -= matched;
                }
                if remaining > 1e-9 {
                    shorts.push_back(Lot {
                        shares: remaining,
                        price: trade.price,
                        timestamp: trade.timestamp,
                        commission_per_share: per_share_commission,
                        slippage_per_share: per_share_slippage,
                    });
                }
            }
        }

        for lot in longs {
            open_lots.push((symbol.clone(), OpenLot { is_long: true, shares: lot.shares, price: lot.price, timestamp: lot.timestamp }));
        }
        for lot in shorts {
            open_lots.push((symbol.clone(), OpenLot { is_long: false, shares: lot.shares, price: lot.price, timestamp: lot.timestamp }));
        }
    }

    Ok((round_trips, open_lots))
}

/// Duration bucket used for round-trip aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationBucket {
    Intraday,
    OneDay,
    TwoToFive,
    SixToTen,
    ElevenToTwentyOne,
    TwentyTwoToFortyTwo,
    FortyThreeToSixtyThree,
    SixtyFourPlus,
}

pub fn duration_bucket(days: i64) -> DurationBucket {
    match days {
        0 => DurationBucket::Intraday,
        1 => DurationBucket::OneDay,
        2..=5 => DurationBucket::TwoToFive,
        6..=10 => DurationBucket::SixToTen,
        11..=21 => DurationBucket::ElevenToTwentyOne,
        22..=42 => DurationBucket::TwentyTwoToFortyTwo,
        43..=63 => DurationBucket::FortyThreeToSixtyThree,
        _ => DurationBucket::SixtyFourPlus,
    }
}

/// Aggregate statistics over a collection of round trips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundTripAggregates {
    pub win_rate: f64,
    pub mean_pnl: f64,
    pub mean_duration_days: f64,
    pub profit_factor: f64,
}

pub fn aggregate(round_trips: &[RoundTrip]) -> AnalyticsResult<RoundTripAggregates> {
    if round_trips.is_empty() {
        return Err(AnalyticsError::insufficient_data("round-trip aggregation requires at least one round trip"));
    }
    let n = round_trips.len() as f64;
    let pnls: Vec<f64> = round_trips.iter().map(RoundTrip::net_pnl).collect();
    let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();

    let win_rate = wins.len() as f64 / n;
    let mean_pnl = pnls.iter().sum::<f64>() / n;
    let mean_duration = round_trips.iter().map(|r| r.duration() as f64).sum::<f64>() / n;

    let gross_wins: f64 = wins.iter().sum();
    let gross_losses: f64 = losses.iter().map(|l| l.abs()).sum();
    let profit_factor = if gross_losses > 1e-12 {
        gross_wins / gross_losses
    } else if gross_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    Ok(RoundTripAggregates { win_rate, mean_pnl, mean_duration_days: mean_duration, profit_factor })
}

pub fn group_by_symbol(round_trips: &[(String, RoundTrip)]) -> HashMap<String, Vec<RoundTrip>> {
    let mut out: HashMap<String, Vec<RoundTrip>> = HashMap::new();
    for (symbol, rt) in round_trips {
        out.entry(symbol.clone()).or_default().push(*rt);
    }
    out
}

pub fn group_by_duration_bucket(round_trips: &[RoundTrip]) -> HashMap<DurationBucket, Vec<RoundTrip>> {
    let mut out: HashMap<DurationBucket, Vec<RoundTrip>> = HashMap::new();
    for rt in round_trips {
        out.entry(duration_bucket(rt.duration())).or_default().push(*rt);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn fifo_matches_layered_buys_against_one_sell() {
        // Spec §8 scenario 5: Buy 100 @100, Buy 50 @110, Sell 120 @120.
        let mut trades_by_symbol = HashMap::new();
        trades_by_symbol.insert(
            "AAPL".to_string(),
            vec![
                Trade::new(100.0, 100.0, d(2024, 1, 1), 0.0, 0.0).unwrap(),
                Trade::new(50.0, 110.0, d(2024, 1, 2), 0.0, 0.0).unwrap(),
                Trade::new(-120.0, 120.0, d(2024, 1, 3), 0.0, 0.0).unwrap(),
            ],
        );
        let (round_trips, open_lots) = build_round_trips(&trades_by_symbol).unwrap();
        assert_eq!(round_trips.len(), 2);
        let total_pnl: f64 = round_trips.iter().map(|(_, rt)| rt.net_pnl()).sum();
        assert!((total_pnl - 2200.0).abs() < 1e-9);

        assert_eq!(open_lots.len(), 1);
        assert!((open_lots[0].1.shares - 30.0).abs() < 1e-9);
        assert_eq!(open_lots[0].1.price, 110.0);
    }

    #[test]
    fn unmatched_sell_opens_a_short_lot() {
        let mut trades_by_symbol = HashMap::new();
        trades_by_symbol.insert("AAPL".to_string(), vec![Trade::new(-10.0, 50.0, d(2024, 1, 1), 0.0, 0.0).unwrap()]);
        let (round_trips, open_lots) = build_round_trips(&trades_by_symbol).unwrap();
        assert!(round_trips.is_empty());
        assert_eq!(open_lots.len(), 1);
        assert!(!open_lots[0].1.is_long);
    }

    #[test]
    fn trade_rejects_nonpositive_price_or_zero_shares() {
        assert!(Trade::new(10.0, 0.0, d(2024, 1, 1), 0.0, 0.0).is_err());
        assert!(Trade::new(0.0, 10.0, d(2024, 1, 1), 0.0, 0.0).is_err());
    }

    #[test]
    fn aggregate_computes_win_rate_and_profit_factor() {
        let rts = vec![
            RoundTrip {
                symbol_is_long: true,
                open_ts: d(2024, 1, 1),
                close_ts: d(2024, 1, 3),
                shares: 10.0,
                open_price: 100.0,
                close_price: 110.0,
                open_commission: 0.0,
                close_commission: 0.0,
                open_slippage: 0.0,
                close_slippage: 0.0,
            },
            RoundTrip {
                symbol_is_long: true,
                open_ts: d(2024, 1, 1),
                close_ts: d(2024, 1, 2),
                shares: 10.0,
                open_price: 100.0,
                close_price: 90.0,
                open_commission: 0.0,
                close_commission: 0.0,
                open_slippage: 0.0,
                close_slippage: 0.0,
            },
        ];
        let agg = aggregate(&rts).unwrap();
        assert!((agg.win_rate - 0.5).abs() < 1e-9);
        assert!((agg.profit_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duration_buckets_match_spec_ranges() {
        assert_eq!(duration_bucket(0), DurationBucket::Intraday);
        assert_eq!(duration_bucket(1), DurationBucket::OneDay);
        assert_eq!(duration_bucket(5), DurationBucket::TwoToFive);
        assert_eq!(duration_bucket(100), DurationBucket::SixtyFourPlus);
    }
}
