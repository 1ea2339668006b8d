use crate::types::Sample;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

/// Per-symbol bounded history of price/volume samples.
///
/// Appends never fail: invalid input (non-finite price or volume, negative
/// volume) is silently dropped. When a window is at capacity the oldest
/// sample is evicted first.
pub struct RollingSeriesStore {
    capacity: usize,
    windows: HashMap<String, VecDeque<Sample>>,
    breach_runs: HashMap<String, u32>,
}

impl RollingSeriesStore {
    pub fn new(capacity: usize) -> Self {
        RollingSeriesStore {
            capacity: capacity.max(1),
            windows: HashMap::new(),
            breach_runs: HashMap::new(),
        }
    }

    pub fn add_sample(&mut self, symbol: &str, price: f64, volume: f64, timestamp: DateTime<Utc>) {
        if !price.is_finite() || !volume.is_finite() || volume < 0.0 {
            return;
        }
        let window = self
            .windows
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        window.push_back(Sample {
            price,
            volume,
            timestamp,
        });
        if window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// Current window contents in insertion order (oldest first). Empty for
    /// unknown symbols.
    pub fn window(&self, symbol: &str) -> Vec<Sample> {
        self.windows
            .get(symbol)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.windows.get(symbol).map(|w| w.len()).unwrap_or(0)
    }

    /// Timestamp of the newest sample, used to append only fresh candles.
    pub fn last_timestamp(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.windows
            .get(symbol)
            .and_then(|w| w.back())
            .map(|s| s.timestamp)
    }

    /// Track consecutive cycles where the short-horizon change breached
    /// `threshold_pct`. Returns true once the breach held for two cycles in a
    /// row; a non-breaching cycle clears the run.
    pub fn record_change(&mut self, symbol: &str, change_pct: f64, threshold_pct: f64) -> bool {
        let run = self.breach_runs.entry(symbol.to_string()).or_insert(0);
        if change_pct.is_finite() && change_pct.abs() >= threshold_pct {
            *run = run.saturating_add(1);
        } else {
            *run = 0;
        }
        *run >= 2
    }
}
