//! Entry, take-profit, and stop levels derived from the entry price and
//! signal type via a fixed multiplier table. Deterministic; no market state.

use crate::types::{Direction, SignalType};
use serde::Serialize;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TradingLevels {
    pub entry: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub stop_loss: f64,
    pub risk_reward: String,
}

/// Target/stop distances as fractions of the entry price.
struct LevelSpec {
    tp1: f64,
    tp2: f64,
    tp3: f64,
    stop: f64,
}

fn spec_for(signal_type: SignalType) -> LevelSpec {
    match signal_type {
        SignalType::RsiOversold | SignalType::RsiOverbought => LevelSpec {
            tp1: 0.015,
            tp2: 0.030,
            tp3: 0.050,
            stop: 0.020,
        },
        SignalType::Breakout => LevelSpec {
            tp1: 0.020,
            tp2: 0.040,
            tp3: 0.070,
            stop: 0.025,
        },
        SignalType::VolumeSpike => LevelSpec {
            tp1: 0.015,
            tp2: 0.030,
            tp3: 0.050,
            stop: 0.020,
        },
        SignalType::Momentum => LevelSpec {
            tp1: 0.020,
            tp2: 0.035,
            tp3: 0.060,
            stop: 0.025,
        },
        SignalType::MultiFactor => LevelSpec {
            tp1: 0.015,
            tp2: 0.025,
            tp3: 0.040,
            stop: 0.020,
        },
    }
}

impl TradingLevels {
    pub fn derive(entry: f64, signal_type: SignalType, direction: Direction) -> Self {
        let spec = spec_for(signal_type);
        let (tp1, tp2, tp3, stop_loss) = match direction {
            Direction::Long => (
                entry * (1.0 + spec.tp1),
                entry * (1.0 + spec.tp2),
                entry * (1.0 + spec.tp3),
                entry * (1.0 - spec.stop),
            ),
            Direction::Short => (
                entry * (1.0 - spec.tp1),
                entry * (1.0 - spec.tp2),
                entry * (1.0 - spec.tp3),
                entry * (1.0 + spec.stop),
            ),
        };
        let risk_reward = format!("1:{:.1}", spec.tp2 / spec.stop);
        TradingLevels {
            entry,
            tp1,
            tp2,
            tp3,
            stop_loss,
            risk_reward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_levels_sit_above_entry_and_stop_below() {
        let levels = TradingLevels::derive(100.0, SignalType::Breakout, Direction::Long);
        assert!((levels.tp1 - 102.0).abs() < 1e-9);
        assert!((levels.tp2 - 104.0).abs() < 1e-9);
        assert!((levels.tp3 - 107.0).abs() < 1e-9);
        assert!((levels.stop_loss - 97.5).abs() < 1e-9);
        assert_eq!(levels.risk_reward, "1:1.6");
    }

    #[test]
    fn short_levels_mirror_long() {
        let long = TradingLevels::derive(100.0, SignalType::RsiOversold, Direction::Long);
        let short = TradingLevels::derive(100.0, SignalType::RsiOverbought, Direction::Short);
        assert!(((long.tp1 - 100.0) - (100.0 - short.tp1)).abs() < 1e-9);
        assert!(short.tp1 < 100.0 && short.stop_loss > 100.0);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = TradingLevels::derive(42.0, SignalType::Momentum, Direction::Long);
        let b = TradingLevels::derive(42.0, SignalType::Momentum, Direction::Long);
        assert_eq!(a, b);
    }
}
