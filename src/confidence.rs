//! Multi-factor confidence scoring.
//!
//! Weighted additive model over five factors, each contributing 0 to a fixed
//! maximum, summed and capped at 100. Thresholds live in a `ScoreProfile` so
//! deployments can tune them without code changes.

use crate::types::ConfidenceLevel;

/// One scoring tier: `value >= threshold` awards `points`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreTier {
    pub threshold: f64,
    pub points: u8,
}

impl ScoreTier {
    pub fn new(threshold: f64, points: u8) -> Self {
        ScoreTier { threshold, points }
    }
}

/// Tunable thresholds for the five factors. Tier lists are ordered from the
/// strongest tier down; the first tier the value clears wins.
#[derive(Clone, Debug)]
pub struct ScoreProfile {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_points: u8,
    pub volume_tiers: Vec<ScoreTier>,
    pub change_tiers: Vec<ScoreTier>,
    pub breakout_tiers: Vec<ScoreTier>,
    pub momentum_tiers: Vec<ScoreTier>,
}

impl Default for ScoreProfile {
    fn default() -> Self {
        ScoreProfile {
            rsi_oversold: 25.0,
            rsi_overbought: 80.0,
            rsi_points: 25,
            volume_tiers: vec![
                ScoreTier::new(2.0, 25),
                ScoreTier::new(1.5, 18),
                ScoreTier::new(1.2, 10),
            ],
            change_tiers: vec![
                ScoreTier::new(4.0, 20),
                ScoreTier::new(2.5, 12),
                ScoreTier::new(1.5, 8),
            ],
            breakout_tiers: vec![
                ScoreTier::new(1.5, 15),
                ScoreTier::new(1.0, 10),
                ScoreTier::new(0.7, 6),
            ],
            momentum_tiers: vec![
                ScoreTier::new(3.5, 15),
                ScoreTier::new(2.0, 10),
                ScoreTier::new(1.2, 5),
            ],
        }
    }
}

fn tier_points(tiers: &[ScoreTier], value: f64) -> u8 {
    tiers
        .iter()
        .find(|t| value >= t.threshold)
        .map(|t| t.points)
        .unwrap_or(0)
}

/// Score, qualitative level, and one human-readable line per non-zero factor
/// (table order), for audit and alert bodies.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfidenceResult {
    pub score: u8,
    pub level: ConfidenceLevel,
    pub factors: Vec<String>,
}

pub struct ConfidenceScorer {
    profile: ScoreProfile,
}

impl ConfidenceScorer {
    pub fn new(profile: ScoreProfile) -> Self {
        ConfidenceScorer { profile }
    }

    /// Pure function of its inputs: identical arguments always produce the
    /// identical result. Undefined indicators contribute 0 and are omitted
    /// from the factor list.
    pub fn score(
        &self,
        rsi: Option<f64>,
        volume_spike: Option<f64>,
        change_pct: f64,
        breakout_pct: Option<f64>,
        momentum_pct: f64,
    ) -> ConfidenceResult {
        let p = &self.profile;
        let mut total: u32 = 0;
        let mut factors = Vec::new();

        if let Some(rsi) = rsi {
            if rsi <= p.rsi_oversold {
                total += p.rsi_points as u32;
                factors.push(format!("RSI oversold at {rsi:.1}"));
            } else if rsi >= p.rsi_overbought {
                total += p.rsi_points as u32;
                factors.push(format!("RSI overbought at {rsi:.1}"));
            }
        }

        if let Some(spike) = volume_spike {
            let pts = tier_points(&p.volume_tiers, spike);
            if pts > 0 {
                total += pts as u32;
                factors.push(format!("Volume {spike:.1}x the trailing average"));
            }
        }

        let change_pts = tier_points(&p.change_tiers, change_pct.abs());
        if change_pts > 0 {
            total += change_pts as u32;
            factors.push(format!("24h move of {change_pct:+.1}%"));
        }

        if let Some(breakout) = breakout_pct {
            let pts = tier_points(&p.breakout_tiers, breakout.abs());
            if pts > 0 {
                total += pts as u32;
                factors.push(format!("Price {breakout:+.2}% beyond 19-sample range"));
            }
        }

        let momentum_pts = tier_points(&p.momentum_tiers, momentum_pct.abs());
        if momentum_pts > 0 {
            total += momentum_pts as u32;
            factors.push(format!("Momentum {momentum_pct:+.1}% over lookback"));
        }

        let score = total.min(100) as u8;
        ConfidenceResult {
            score,
            level: level_for(score),
            factors,
        }
    }
}

pub fn level_for(score: u8) -> ConfidenceLevel {
    match score {
        75.. => ConfidenceLevel::VeryHigh,
        60..=74 => ConfidenceLevel::High,
        45..=59 => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}
