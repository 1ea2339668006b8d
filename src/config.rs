//! Scanner configuration from environment variables (a `.env` file is loaded
//! in `main` first). Every knob has a default; an unparseable value is a hard
//! startup error rather than a silent fallback.

use crate::confidence::{ScoreProfile, ScoreTier};
use crate::policy::PolicyConfig;
use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;
use tracing::info;

#[derive(Clone, Debug)]
pub struct ScannerConfig {
    pub min_confidence: u8,
    pub min_volume_usd: f64,
    pub min_trade_flow_usd: f64,
    pub max_hourly_signals: u32,
    pub cooldown_seconds: u64,
    pub scan_interval_minutes: u64,
    pub rsi_period: usize,
    pub momentum_period: usize,
    pub window_capacity: usize,
    pub sustained_change_pct: f64,
    pub candle_interval_minutes: u32,
    pub candle_limit: u32,
    /// 0 = no limit.
    pub max_symbols_per_cycle: usize,
    pub alert_webhook_url: Option<String>,
    pub profile: ScoreProfile,
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self> {
        let profile = ScoreProfile {
            rsi_oversold: parse_var("RSI_OVERSOLD", "25")?,
            rsi_overbought: parse_var("RSI_OVERBOUGHT", "80")?,
            volume_tiers: tiers_var("VOLUME_SPIKE_TIERS", "2.0:25,1.5:18,1.2:10")?,
            change_tiers: tiers_var("CHANGE_TIERS", "4.0:20,2.5:12,1.5:8")?,
            breakout_tiers: tiers_var("BREAKOUT_TIERS", "1.5:15,1.0:10,0.7:6")?,
            momentum_tiers: tiers_var("MOMENTUM_TIERS", "3.5:15,2.0:10,1.2:5")?,
            ..ScoreProfile::default()
        };

        Ok(ScannerConfig {
            min_confidence: parse_var("MIN_CONFIDENCE", "45")?,
            min_volume_usd: parse_var("MIN_VOLUME_USD", "250000")?,
            min_trade_flow_usd: parse_var("MIN_TRADE_FLOW_USD", "250")?,
            max_hourly_signals: parse_var("MAX_HOURLY_SIGNALS", "6")?,
            cooldown_seconds: parse_var("COOLDOWN_SECONDS", "900")?,
            scan_interval_minutes: parse_var("SCAN_INTERVAL_MINUTES", "5")?,
            rsi_period: parse_var("RSI_PERIOD", "14")?,
            momentum_period: parse_var("MOMENTUM_PERIOD", "10")?,
            window_capacity: parse_var("WINDOW_CAPACITY", "100")?,
            sustained_change_pct: parse_var("SUSTAINED_CHANGE_PCT", "10")?,
            candle_interval_minutes: parse_var("CANDLE_INTERVAL_MINUTES", "5")?,
            candle_limit: parse_var("CANDLE_LIMIT", "30")?,
            max_symbols_per_cycle: parse_var("MAX_SYMBOLS_PER_CYCLE", "0")?,
            alert_webhook_url: env::var("ALERT_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
            profile,
        })
    }

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            min_confidence: self.min_confidence,
            cooldown_seconds: self.cooldown_seconds as i64,
            max_hourly_signals: self.max_hourly_signals,
            rsi_oversold: self.profile.rsi_oversold,
            rsi_overbought: self.profile.rsi_overbought,
        }
    }

    pub fn display(&self) {
        info!("scanner config:");
        info!("  min confidence: {}", self.min_confidence);
        info!("  liquidity floor: ${:.0} 24h quote volume", self.min_volume_usd);
        info!(
            "  cooldown: {}s, hourly cap: {}",
            self.cooldown_seconds, self.max_hourly_signals
        );
        info!(
            "  scan every {}m, candles {}x{}m, window {}",
            self.scan_interval_minutes,
            self.candle_limit,
            self.candle_interval_minutes,
            self.window_capacity
        );
        info!(
            "  RSI period {} ({}/{}), momentum period {}",
            self.rsi_period,
            self.profile.rsi_oversold,
            self.profile.rsi_overbought,
            self.momentum_period
        );
        info!(
            "  delivery: {}",
            if self.alert_webhook_url.is_some() {
                "webhook"
            } else {
                "disabled (log only)"
            }
        );
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|_| anyhow!("invalid {name}"))
}

fn tiers_var(name: &str, default: &str) -> Result<Vec<ScoreTier>> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_tiers(&raw).map_err(|e| anyhow!("invalid {name}: {e}"))
}

/// Parse a tier table of the form "2.0:25,1.5:18,1.2:10"
/// (threshold:points pairs, strongest tier first).
pub fn parse_tiers(raw: &str) -> Result<Vec<ScoreTier>> {
    let mut tiers = Vec::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (threshold, points) = pair
            .split_once(':')
            .ok_or_else(|| anyhow!("expected threshold:points, got {pair:?}"))?;
        let threshold: f64 = threshold
            .trim()
            .parse()
            .map_err(|_| anyhow!("bad threshold in {pair:?}"))?;
        let points: u8 = points
            .trim()
            .parse()
            .map_err(|_| anyhow!("bad points in {pair:?}"))?;
        tiers.push(ScoreTier::new(threshold, points));
    }
    if tiers.is_empty() {
        return Err(anyhow!("empty tier table"));
    }
    // Strongest tier must be checked first
    tiers.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
    Ok(tiers)
}
