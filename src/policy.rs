//! Alert policy: decides whether a scored candidate becomes an emitted
//! signal. Four gates, checked in order: minimum confidence, composite
//! quality conditions, per-(symbol, type) cooldown, global hourly cap.
//! Acceptance is the only path that mutates policy state.

use crate::confidence::ConfidenceResult;
use crate::indicators::IndicatorSet;
use crate::types::{Direction, SignalType};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Composite quality thresholds. One of these must hold so a single
/// borderline factor never emits on its own.
pub mod quality {
    pub const EXTREME_RSI_MIN_VOLUME: f64 = 1.3;
    pub const BREAKOUT_MIN_PCT: f64 = 1.0;
    pub const BREAKOUT_MIN_VOLUME: f64 = 1.25;
    pub const BIG_MOVE_MIN_CHANGE_PCT: f64 = 3.0;
    pub const BIG_MOVE_MIN_VOLUME: f64 = 1.2;
    pub const MOMENTUM_MIN_PCT: f64 = 2.0;
    pub const NEUTRAL_RSI_LOW: f64 = 40.0;
    pub const NEUTRAL_RSI_HIGH: f64 = 60.0;
}

/// Signal-type resolution floors, aligned with the lowest scoring tiers.
const TYPE_BREAKOUT_MIN_PCT: f64 = 0.7;
const TYPE_VOLUME_MIN_SPIKE: f64 = 1.5;
const TYPE_MOMENTUM_MIN_PCT: f64 = 2.0;

/// A normal negative outcome, not an error condition.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RejectReason {
    #[error("confidence {score} below minimum {min}")]
    BelowMinConfidence { score: u8, min: u8 },
    #[error("no quality condition satisfied")]
    NoQualityCondition,
    #[error("cooldown active for another {remaining_secs}s")]
    CooldownActive { remaining_secs: i64 },
    #[error("hourly cap reached ({count}/{max})")]
    HourlyCapReached { count: u32, max: u32 },
}

#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub min_confidence: u8,
    pub cooldown_seconds: i64,
    pub max_hourly_signals: u32,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

/// A scored symbol awaiting the policy decision. Discarded on reject.
#[derive(Clone, Debug)]
pub struct SignalCandidate {
    pub symbol: String,
    pub indicators: IndicatorSet,
    pub confidence: ConfidenceResult,
    pub change_pct_24h: f64,
    pub signal_type: SignalType,
    pub direction: Direction,
    pub last_price: f64,
    pub sustained: bool,
}

pub struct SignalPolicy {
    config: PolicyConfig,
    last_emission: HashMap<(String, SignalType), DateTime<Utc>>,
    hour_key: Option<(NaiveDate, u32)>,
    hourly_count: u32,
}

impl SignalPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        SignalPolicy {
            config,
            last_emission: HashMap::new(),
            hour_key: None,
            hourly_count: 0,
        }
    }

    /// Remaining emissions in the current hour bucket. Rolls the bucket
    /// lazily, like `evaluate`.
    pub fn hourly_remaining(&mut self, now: DateTime<Utc>) -> u32 {
        self.roll_hour(now);
        self.config.max_hourly_signals.saturating_sub(self.hourly_count)
    }

    pub fn evaluate(
        &mut self,
        candidate: &SignalCandidate,
        now: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        // Gate 1: confidence floor
        let score = candidate.confidence.score;
        if score < self.config.min_confidence {
            return Err(RejectReason::BelowMinConfidence {
                score,
                min: self.config.min_confidence,
            });
        }

        // Gate 2: at least one composite quality condition
        if !self.quality_satisfied(&candidate.indicators, candidate.change_pct_24h) {
            return Err(RejectReason::NoQualityCondition);
        }

        // Gate 3: per-(symbol, type) cooldown
        let key = (candidate.symbol.clone(), candidate.signal_type);
        if let Some(last) = self.last_emission.get(&key) {
            let elapsed = (now - *last).num_seconds();
            if elapsed < self.config.cooldown_seconds {
                return Err(RejectReason::CooldownActive {
                    remaining_secs: self.config.cooldown_seconds - elapsed,
                });
            }
        }

        // Gate 4: hourly cap, bucket reset on wall-clock hour change
        self.roll_hour(now);
        if self.hourly_count >= self.config.max_hourly_signals {
            return Err(RejectReason::HourlyCapReached {
                count: self.hourly_count,
                max: self.config.max_hourly_signals,
            });
        }

        // Accept: the only path that mutates cooldown and counter state
        self.last_emission.insert(key, now);
        self.hourly_count += 1;
        debug!(
            symbol = %candidate.symbol,
            signal_type = candidate.signal_type.label(),
            score,
            "candidate accepted"
        );
        Ok(())
    }

    fn roll_hour(&mut self, now: DateTime<Utc>) {
        let key = (now.date_naive(), now.hour());
        if self.hour_key != Some(key) {
            self.hour_key = Some(key);
            self.hourly_count = 0;
        }
    }

    fn quality_satisfied(&self, ind: &IndicatorSet, change_pct_24h: f64) -> bool {
        let volume = ind.volume_spike;

        // Extreme RSI backed by volume
        if let (Some(rsi), Some(v)) = (ind.rsi, volume) {
            let extreme = rsi <= self.config.rsi_oversold || rsi >= self.config.rsi_overbought;
            if extreme && v >= quality::EXTREME_RSI_MIN_VOLUME {
                return true;
            }
        }

        // Range breakout backed by volume
        if let (Some(breakout), Some(v)) = (ind.breakout_pct, volume) {
            if breakout.abs() >= quality::BREAKOUT_MIN_PCT && v >= quality::BREAKOUT_MIN_VOLUME {
                return true;
            }
        }

        // Large 24h move backed by volume
        if let Some(v) = volume {
            if change_pct_24h.abs() >= quality::BIG_MOVE_MIN_CHANGE_PCT
                && v >= quality::BIG_MOVE_MIN_VOLUME
            {
                return true;
            }
        }

        // Momentum support with neutral RSI
        if let Some(rsi) = ind.rsi {
            if ind.momentum_pct.abs() >= quality::MOMENTUM_MIN_PCT
                && (quality::NEUTRAL_RSI_LOW..=quality::NEUTRAL_RSI_HIGH).contains(&rsi)
            {
                return true;
            }
        }

        false
    }

    /// Priority order: RSI extreme > breakout > volume spike > momentum >
    /// multi-factor fallback.
    pub fn resolve_signal_type(&self, ind: &IndicatorSet) -> SignalType {
        if let Some(rsi) = ind.rsi {
            if rsi <= self.config.rsi_oversold {
                return SignalType::RsiOversold;
            }
            if rsi >= self.config.rsi_overbought {
                return SignalType::RsiOverbought;
            }
        }
        if let Some(breakout) = ind.breakout_pct {
            if breakout.abs() >= TYPE_BREAKOUT_MIN_PCT {
                return SignalType::Breakout;
            }
        }
        if let Some(spike) = ind.volume_spike {
            if spike >= TYPE_VOLUME_MIN_SPIKE {
                return SignalType::VolumeSpike;
            }
        }
        if ind.momentum_pct.abs() >= TYPE_MOMENTUM_MIN_PCT {
            return SignalType::Momentum;
        }
        SignalType::MultiFactor
    }

    pub fn resolve_direction(
        &self,
        signal_type: SignalType,
        ind: &IndicatorSet,
        change_pct_24h: f64,
    ) -> Direction {
        match signal_type {
            SignalType::RsiOversold => Direction::Long,
            SignalType::RsiOverbought => Direction::Short,
            SignalType::Breakout => {
                if ind.breakout_pct.unwrap_or(0.0) >= 0.0 {
                    Direction::Long
                } else {
                    Direction::Short
                }
            }
            SignalType::Momentum => {
                if ind.momentum_pct >= 0.0 {
                    Direction::Long
                } else {
                    Direction::Short
                }
            }
            SignalType::VolumeSpike | SignalType::MultiFactor => {
                if change_pct_24h >= 0.0 {
                    Direction::Long
                } else {
                    Direction::Short
                }
            }
        }
    }
}
