//! Technical indicators computed fresh each cycle from a symbol's rolling
//! window. All functions are pure; insufficient history yields `None`
//! (momentum excepted, which reports 0.0 by convention).

use crate::types::Sample;

/// Volume samples needed ahead of the latest one for the spike ratio.
const VOLUME_BASELINE_LEN: usize = 10;
/// Price samples needed for breakout range detection (latest + 19 prior).
const BREAKOUT_LOOKBACK: usize = 20;

/// Indicator outputs for one symbol, one cycle. Not persisted.
#[derive(Clone, Copy, Debug, Default)]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub volume_spike: Option<f64>,
    /// Signed percent beyond the prior 19-sample range: positive above the
    /// prior high, negative below the prior low, 0.0 inside the range.
    pub breakout_pct: Option<f64>,
    pub momentum_pct: f64,
}

pub struct IndicatorEngine {
    rsi_period: usize,
    momentum_period: usize,
}

impl IndicatorEngine {
    pub fn new(rsi_period: usize, momentum_period: usize) -> Self {
        IndicatorEngine {
            rsi_period: rsi_period.max(1),
            momentum_period: momentum_period.max(1),
        }
    }

    pub fn compute(&self, window: &[Sample]) -> IndicatorSet {
        let prices: Vec<f64> = window.iter().map(|s| s.price).collect();
        let volumes: Vec<f64> = window.iter().map(|s| s.volume).collect();
        IndicatorSet {
            rsi: rsi(&prices, self.rsi_period),
            volume_spike: volume_spike(&volumes),
            breakout_pct: breakout_pct(&prices),
            momentum_pct: momentum_pct(&prices, self.momentum_period),
        }
    }
}

/// Simple-average RSI over the last `period` price deltas. Needs `period + 1`
/// prices. avg_loss == 0 maps to 100, or 50 when avg_gain is also 0 (flat
/// window). Always within [0, 100].
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }
    let recent = &prices[prices.len() - (period + 1)..];
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for pair in recent.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gain_sum += delta;
        } else {
            loss_sum -= delta;
        }
    }
    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    let value = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    Some(value.clamp(0.0, 100.0))
}

/// Latest volume relative to the mean of the 10 volumes preceding it.
pub fn volume_spike(volumes: &[f64]) -> Option<f64> {
    if volumes.len() < VOLUME_BASELINE_LEN + 1 {
        return None;
    }
    let latest = volumes[volumes.len() - 1];
    let baseline = &volumes[volumes.len() - 1 - VOLUME_BASELINE_LEN..volumes.len() - 1];
    let mean = baseline.iter().sum::<f64>() / VOLUME_BASELINE_LEN as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(latest / mean)
}

/// Latest price versus the high/low of the 19 prices preceding it, as a
/// signed percent beyond the range. 0.0 when the price stays inside it.
pub fn breakout_pct(prices: &[f64]) -> Option<f64> {
    if prices.len() < BREAKOUT_LOOKBACK {
        return None;
    }
    let latest = prices[prices.len() - 1];
    let prior = &prices[prices.len() - BREAKOUT_LOOKBACK..prices.len() - 1];
    let high = prior.iter().cloned().fold(f64::MIN, f64::max);
    let low = prior.iter().cloned().fold(f64::MAX, f64::min);

    if latest > high && high > 0.0 {
        Some((latest - high) / high * 100.0)
    } else if latest < low && low > 0.0 {
        Some((latest - low) / low * 100.0)
    } else {
        Some(0.0)
    }
}

/// Percent change between the latest price and the price `period` samples
/// back. Reports 0.0 (not undefined) on insufficient history.
pub fn momentum_pct(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 0.0;
    }
    let latest = prices[prices.len() - 1];
    let past = prices[prices.len() - 1 - period];
    if past <= 0.0 {
        return 0.0;
    }
    (latest - past) / past * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_needs_period_plus_one_samples() {
        let prices: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert!(rsi(&prices, 14).is_none());
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert!(rsi(&prices, 14).is_some());
    }

    #[test]
    fn rsi_monotone_sequences_hit_the_bounds() {
        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));
        let falling: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        assert_eq!(rsi(&falling, 14), Some(0.0));
    }

    #[test]
    fn rsi_flat_window_is_neutral() {
        let flat = vec![50.0; 20];
        assert_eq!(rsi(&flat, 14), Some(50.0));
    }

    #[test]
    fn rsi_stays_in_bounds_for_mixed_series() {
        let prices = vec![
            100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0, 85.0, 125.0, 80.0, 130.0, 75.0,
            135.0, 70.0, 140.0,
        ];
        let value = rsi(&prices, 14).unwrap();
        assert!((0.0..=100.0).contains(&value), "RSI out of bounds: {value}");
    }

    #[test]
    fn volume_spike_ratio() {
        let mut volumes = vec![100.0; 10];
        volumes.push(220.0);
        let spike = volume_spike(&volumes).unwrap();
        assert!((spike - 2.2).abs() < 1e-9);
    }

    #[test]
    fn volume_spike_insufficient_or_dead_baseline() {
        assert!(volume_spike(&[100.0; 10]).is_none());
        let mut dead = vec![0.0; 10];
        dead.push(100.0);
        assert!(volume_spike(&dead).is_none());
    }

    #[test]
    fn breakout_above_prior_high() {
        let mut prices = vec![100.0; 19];
        prices.push(102.0);
        let pct = breakout_pct(&prices).unwrap();
        assert!((pct - 2.0).abs() < 1e-9);
    }

    #[test]
    fn breakout_below_prior_low_is_negative() {
        let mut prices: Vec<f64> = (0..19).map(|i| 100.0 + i as f64).collect();
        prices.push(95.0);
        let pct = breakout_pct(&prices).unwrap();
        assert!((pct - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn breakout_inside_range_is_zero() {
        let mut prices: Vec<f64> = (0..19).map(|i| 100.0 + i as f64).collect();
        prices.push(110.0);
        assert_eq!(breakout_pct(&prices), Some(0.0));
        assert!(breakout_pct(&prices[..19]).is_none());
    }

    #[test]
    fn momentum_pct_change_over_period() {
        let prices = vec![
            100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0, 107.0, 108.0, 109.0, 98.0,
        ];
        // Latest 98.0 vs 100.0 ten samples back
        let m = momentum_pct(&prices, 10);
        assert!((m - (-2.0)).abs() < 1e-9);
    }

    #[test]
    fn momentum_insufficient_history_reports_zero() {
        assert_eq!(momentum_pct(&[100.0, 101.0], 10), 0.0);
        assert_eq!(momentum_pct(&[], 10), 0.0);
    }

    #[test]
    fn engine_bundles_all_indicators() {
        let engine = IndicatorEngine::new(14, 10);
        let samples: Vec<crate::types::Sample> = (0..30)
            .map(|i| crate::types::Sample {
                price: 100.0 + i as f64,
                volume: 1000.0,
                timestamp: chrono::Utc::now(),
            })
            .collect();
        let set = engine.compute(&samples);
        assert_eq!(set.rsi, Some(100.0));
        assert!(set.volume_spike.is_some());
        assert!(set.breakout_pct.is_some());
        assert!(set.momentum_pct > 0.0);
    }
}
