//! Bounded streaming core (spec component C16, supplement §4.10): a ring
//! buffer of observations plus a single background worker that periodically
//! recomputes summary metrics and dispatches them to a callback.
//!
//! Grounded in the teacher's `tokio`-based async worker idiom seen in
//! `analytics/src/performance_tracker.rs`; a callback panic is not caught
//! via `catch_unwind` across an await point (not idiomatic async Rust) —
//! instead a callback that returns `Err` is logged via `tracing::error!` and
//! the affected tick is dropped, matching the "errors drop only the
//! affected event" contract from spec §5.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::stats::{mean, std_dev};

/// One (timestamp-ordinal, return) observation. The streaming core is
/// agnostic to calendar timestamps; callers pass a monotonically increasing
/// sequence number alongside the value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamObservation {
    pub sequence: u64,
    pub value: f64,
}

/// A bounded ring buffer: `push` overwrites the oldest entry once full.
pub struct RingBuffer {
    capacity: usize,
    buffer: Vec<StreamObservation>,
    next_write: usize,
    filled: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> AnalyticsResult<Self> {
        if capacity == 0 {
            return Err(AnalyticsError::invalid_input("ring buffer capacity must be positive"));
        }
        Ok(Self { capacity, buffer: Vec::with_capacity(capacity), next_write: 0, filled: 0 })
    }

    pub fn push(&mut self, obs: StreamObservation) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(obs);
        } else {
            self.buffer[self.next_write] = obs;
        }
        self.next_write = (self.next_write + 1) % self.capacity;
        self.filled = (self.filled + 1).min(self.capacity);
    }

    /// Observations oldest-first.
    pub fn snapshot(&self) -> Vec<StreamObservation> {
        if self.buffer.len() < self.capacity {
            self.buffer.clone()
        } else {
            let mut out = Vec::with_capacity(self.capacity);
            out.extend_from_slice(&self.buffer[self.next_write..]);
            out.extend_from_slice(&self.buffer[..self.next_write]);
            out
        }
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.next_write = 0;
        self.filled = 0;
    }
}

/// Periodic summary computed over the ring buffer's current contents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub mean: f64,
    pub volatility: f64,
    pub running_max_drawdown: f64,
}

fn summarize(observations: &[StreamObservation]) -> Option<StreamSummary> {
    if observations.is_empty() {
        return None;
    }
    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
    let m = mean(&values).ok()?;
    let vol = if values.len() >= 2 { std_dev(&values).unwrap_or(0.0) } else { 0.0 };

    let mut equity = 1.0f64;
    let mut peak = 1.0f64;
    let mut max_dd = 0.0f64;
    for &v in &values {
        equity *= 1.0 + v;
        peak = peak.max(equity);
        max_dd = max_dd.max((peak - equity) / peak);
    }

    Some(StreamSummary { mean: m, volatility: vol, running_max_drawdown: max_dd })
}

/// Owns the ring buffer and the single background worker. `start` spawns a
/// tokio task; `stop` joins it and clears the buffer.
pub struct StreamingCore {
    buffer: Arc<Mutex<RingBuffer>>,
    worker: Option<JoinHandle<()>>,
}

impl StreamingCore {
    pub fn new(capacity: usize) -> AnalyticsResult<Self> {
        Ok(Self { buffer: Arc::new(Mutex::new(RingBuffer::new(capacity)?)), worker: None })
    }

    pub fn push(&self, obs: StreamObservation) {
        self.buffer.lock().push(obs);
    }

    pub fn snapshot(&self) -> Vec<StreamObservation> {
        self.buffer.lock().snapshot()
    }

    /// Spawn the worker. Dropping the returned guard without calling `stop`
    /// leaves the task running detached — callers own the lifecycle.
    pub fn start<F>(&mut self, interval_ms: u64, callback: F)
    where
        F: Fn(StreamSummary) -> Result<(), String> + Send + Sync + 'static,
    {
        let buffer = Arc::clone(&self.buffer);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_millis(interval_ms.max(1)));
            loop {
                ticker.tick().await;
                let snapshot = buffer.lock().snapshot();
                let Some(summary) = summarize(&snapshot) else { continue };
                if let Err(message) = callback(summary) {
                    tracing::error!(error = %message, "streaming callback failed; dropping this tick");
                }
            }
        });
        self.worker = Some(handle);
    }

    /// Abort the worker and clear the buffer.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.worker.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.buffer.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(seq: u64, value: f64) -> StreamObservation {
        StreamObservation { sequence: seq, value }
    }

    #[test]
    fn ring_buffer_overwrites_oldest_once_full() {
        let mut buf = RingBuffer::new(3).unwrap();
        buf.push(obs(1, 1.0));
        buf.push(obs(2, 2.0));
        buf.push(obs(3, 3.0));
        buf.push(obs(4, 4.0));
        let snapshot = buf.snapshot();
        assert_eq!(snapshot.iter().map(|o| o.sequence).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn ring_buffer_rejects_zero_capacity() {
        assert!(RingBuffer::new(0).is_err());
    }

    #[test]
    fn summary_reports_mean_and_drawdown() {
        let observations = vec![obs(1, 0.01), obs(2, -0.02), obs(3, 0.03)];
        let summary = summarize(&observations).unwrap();
        assert!((summary.mean - 0.02f64 / 3.0).abs() < 1e-9);
        assert!(summary.running_max_drawdown > 0.0);
    }

    #[tokio::test]
    async fn start_and_stop_invokes_callback_and_clears_buffer() {
        let mut core = StreamingCore::new(10).unwrap();
        for i in 0..5 {
            core.push(obs(i, 0.001 * i as f64));
        }
        let invocations = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&invocations);
        core.start(10, move |_summary| {
            *counter.lock() += 1;
            Ok(())
        });
        time::sleep(Duration::from_millis(50)).await;
        core.stop().await;
        assert!(*invocations.lock() > 0);
        assert!(core.snapshot().is_empty());
    }
}
