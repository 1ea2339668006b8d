//! One scan cycle: symbol universe -> fresh samples -> indicators ->
//! confidence -> policy -> delivery. A cycle either runs to completion or is
//! refused outright when one is already in flight; a single symbol's failure
//! never aborts the cycle.

use crate::alerts::AlertSink;
use crate::config::ScannerConfig;
use crate::confidence::ConfidenceScorer;
use crate::history::RollingSeriesStore;
use crate::indicators::IndicatorEngine;
use crate::levels::TradingLevels;
use crate::market_data::MarketFeed;
use crate::metrics;
use crate::policy::{SignalCandidate, SignalPolicy};
use crate::types::{SignalAlert, Ticker, TradeFlow};
use anyhow::{bail, Result};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Trade-flow lookback for accepted signals, matching the short scan horizon.
const TRADE_FLOW_WINDOW_SECS: i64 = 300;
const TRADE_FETCH_LIMIT: u32 = 1000;

#[derive(Clone, Copy, Debug, Default)]
pub struct CycleSummary {
    /// False when the cycle was refused because another one was running.
    pub ran: bool,
    pub scanned: u32,
    pub skipped: u32,
    pub emitted: u32,
    pub rejected: u32,
    pub stopped_early: bool,
}

pub struct ScanPipeline {
    config: ScannerConfig,
    feed: Arc<dyn MarketFeed>,
    sink: Arc<dyn AlertSink>,
    engine: IndicatorEngine,
    scorer: ConfidenceScorer,
    store: Mutex<RollingSeriesStore>,
    policy: Mutex<SignalPolicy>,
    running: AtomicBool,
}

impl ScanPipeline {
    pub fn new(config: ScannerConfig, feed: Arc<dyn MarketFeed>, sink: Arc<dyn AlertSink>) -> Self {
        let engine = IndicatorEngine::new(config.rsi_period, config.momentum_period);
        let scorer = ConfidenceScorer::new(config.profile.clone());
        let store = Mutex::new(RollingSeriesStore::new(config.window_capacity));
        let policy = Mutex::new(SignalPolicy::new(config.policy_config()));
        ScanPipeline {
            config,
            feed,
            sink,
            engine,
            scorer,
            store,
            policy,
            running: AtomicBool::new(false),
        }
    }

    /// Single entry point for the external trigger. Refuses to overlap with a
    /// cycle already in flight; the Running flag clears unconditionally.
    pub async fn run_cycle(&self) -> CycleSummary {
        if self
            .running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            warn!("scan cycle already running, trigger ignored");
            metrics::CYCLES_OVERLAP_SKIPPED.inc();
            return CycleSummary::default();
        }

        let summary = self.scan().await;
        self.running.store(false, Ordering::Release);
        metrics::CYCLES_RUN.inc();
        info!(
            scanned = summary.scanned,
            skipped = summary.skipped,
            emitted = summary.emitted,
            rejected = summary.rejected,
            stopped_early = summary.stopped_early,
            "scan cycle finished"
        );
        summary
    }

    async fn scan(&self) -> CycleSummary {
        let mut summary = CycleSummary {
            ran: true,
            ..CycleSummary::default()
        };

        let tickers = match self.feed.list_tickers().await {
            Ok(t) => t,
            Err(e) => {
                warn!("symbol universe fetch failed, ending cycle: {e}");
                return summary;
            }
        };

        let total = tickers.len();
        let mut universe: Vec<Ticker> = tickers
            .into_iter()
            .filter(|t| t.quote_volume_24h >= self.config.min_volume_usd)
            .collect();
        // Busiest pairs first, so a capped cycle spends its budget well
        universe.sort_by(|a, b| b.quote_volume_24h.total_cmp(&a.quote_volume_24h));
        if self.config.max_symbols_per_cycle > 0 {
            universe.truncate(self.config.max_symbols_per_cycle);
        }

        let floored = (total - universe.len()) as u32;
        summary.skipped += floored;
        if floored > 0 {
            metrics::SYMBOLS_SKIPPED.inc_by(floored as u64);
        }

        for ticker in &universe {
            let now = Utc::now();
            if self.policy.lock().await.hourly_remaining(now) == 0 {
                info!("hourly signal cap reached, stopping cycle early");
                summary.stopped_early = true;
                break;
            }

            match self.scan_symbol(ticker, &mut summary).await {
                Ok(()) => summary.scanned += 1,
                Err(e) => {
                    warn!(symbol = %ticker.symbol, "symbol skipped this cycle: {e}");
                    metrics::SYMBOLS_SKIPPED.inc();
                    summary.skipped += 1;
                }
            }
        }
        summary
    }

    async fn scan_symbol(&self, ticker: &Ticker, summary: &mut CycleSummary) -> Result<()> {
        if ticker.last <= 0.0 {
            bail!("no usable last price");
        }

        let candles = self
            .feed
            .candles(
                &ticker.symbol,
                self.config.candle_interval_minutes,
                self.config.candle_limit,
            )
            .await?;

        let now = Utc::now();
        let (window, sustained) = {
            let mut store = self.store.lock().await;
            let last_seen = store.last_timestamp(&ticker.symbol);
            for candle in &candles {
                if last_seen.map_or(true, |t| candle.timestamp > t) {
                    store.add_sample(&ticker.symbol, candle.close, candle.volume, candle.timestamp);
                }
            }
            let window = store.window(&ticker.symbol);
            let cycle_change = match window.len() {
                0 | 1 => 0.0,
                n => {
                    let prev = window[n - 2].price;
                    let last = window[n - 1].price;
                    if prev > 0.0 {
                        (last - prev) / prev * 100.0
                    } else {
                        0.0
                    }
                }
            };
            let sustained = store.record_change(
                &ticker.symbol,
                cycle_change,
                self.config.sustained_change_pct,
            );
            (window, sustained)
        };
        metrics::SYMBOLS_SCANNED.inc();

        let indicators = self.engine.compute(&window);
        let confidence = self.scorer.score(
            indicators.rsi,
            indicators.volume_spike,
            ticker.change_pct_24h,
            indicators.breakout_pct,
            indicators.momentum_pct,
        );

        let (signal_type, direction, decision) = {
            let mut policy = self.policy.lock().await;
            let signal_type = policy.resolve_signal_type(&indicators);
            let direction =
                policy.resolve_direction(signal_type, &indicators, ticker.change_pct_24h);
            let candidate = SignalCandidate {
                symbol: ticker.symbol.clone(),
                indicators,
                confidence: confidence.clone(),
                change_pct_24h: ticker.change_pct_24h,
                signal_type,
                direction,
                last_price: ticker.last,
                sustained,
            };
            (signal_type, direction, policy.evaluate(&candidate, now))
        };

        match decision {
            Err(reason) => {
                debug!(symbol = %ticker.symbol, %reason, "candidate rejected");
                metrics::SIGNALS_REJECTED.inc();
                summary.rejected += 1;
            }
            Ok(()) => {
                let levels = TradingLevels::derive(ticker.last, signal_type, direction);
                let trade_flow = self.trade_flow(&ticker.symbol).await;
                let alert = SignalAlert {
                    symbol: ticker.symbol.clone(),
                    signal_type,
                    direction,
                    confidence: confidence.score,
                    level: confidence.level,
                    factors: confidence.factors,
                    last_price: ticker.last,
                    change_pct_24h: ticker.change_pct_24h,
                    rsi: indicators.rsi,
                    volume_spike: indicators.volume_spike,
                    breakout_pct: indicators.breakout_pct,
                    momentum_pct: indicators.momentum_pct,
                    levels,
                    trade_flow,
                    sustained,
                    timestamp: now,
                };
                info!(
                    symbol = %ticker.symbol,
                    signal_type = signal_type.label(),
                    confidence = alert.confidence,
                    "signal emitted"
                );
                metrics::SIGNALS_EMITTED.inc();
                summary.emitted += 1;
                if let Err(e) = self.sink.deliver(&alert).await {
                    warn!(symbol = %ticker.symbol, "alert delivery failed: {e}");
                }
            }
        }
        Ok(())
    }

    /// Buy/sell split of the last few minutes of trades, attached to accepted
    /// signals only. Degrades to zeros on feed failure.
    async fn trade_flow(&self, symbol: &str) -> TradeFlow {
        match self.feed.recent_trades(symbol, TRADE_FETCH_LIMIT).await {
            Ok(trades) => TradeFlow::from_trades(
                &trades,
                Utc::now() - ChronoDuration::seconds(TRADE_FLOW_WINDOW_SECS),
                self.config.min_trade_flow_usd,
            ),
            Err(e) => {
                debug!(symbol, "trade flow unavailable: {e}");
                TradeFlow::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::FeedError;
    use crate::types::{Candle, Direction, SignalType, Trade, TradeSide};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    struct MockFeed {
        tickers: Vec<Ticker>,
        candles: HashMap<String, Vec<Candle>>,
        trades: Vec<Trade>,
        fail_candles: HashSet<String>,
        list_delay: Option<Duration>,
    }

    impl MockFeed {
        fn new() -> Self {
            MockFeed {
                tickers: Vec::new(),
                candles: HashMap::new(),
                trades: Vec::new(),
                fail_candles: HashSet::new(),
                list_delay: None,
            }
        }
    }

    #[async_trait]
    impl MarketFeed for MockFeed {
        async fn list_tickers(&self) -> Result<Vec<Ticker>, FeedError> {
            if let Some(delay) = self.list_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.tickers.clone())
        }

        async fn candles(
            &self,
            symbol: &str,
            _interval_minutes: u32,
            _limit: u32,
        ) -> Result<Vec<Candle>, FeedError> {
            if self.fail_candles.contains(symbol) {
                return Err(FeedError::Status {
                    endpoint: "/spot/candlesticks".to_string(),
                    status: 500,
                });
            }
            Ok(self.candles.get(symbol).cloned().unwrap_or_default())
        }

        async fn recent_trades(&self, _symbol: &str, _limit: u32) -> Result<Vec<Trade>, FeedError> {
            Ok(self.trades.clone())
        }
    }

    struct CollectingSink {
        alerts: std::sync::Mutex<Vec<SignalAlert>>,
    }

    #[async_trait]
    impl AlertSink for CollectingSink {
        async fn deliver(&self, alert: &SignalAlert) -> Result<()> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn test_config() -> ScannerConfig {
        ScannerConfig {
            min_confidence: 45,
            min_volume_usd: 250_000.0,
            min_trade_flow_usd: 250.0,
            max_hourly_signals: 6,
            cooldown_seconds: 900,
            scan_interval_minutes: 5,
            rsi_period: 14,
            momentum_period: 10,
            window_capacity: 100,
            sustained_change_pct: 10.0,
            candle_interval_minutes: 5,
            candle_limit: 30,
            max_symbols_per_cycle: 0,
            alert_webhook_url: None,
            profile: crate::confidence::ScoreProfile::default(),
        }
    }

    fn ticker(symbol: &str, last: f64, change: f64, volume: f64) -> Ticker {
        Ticker {
            symbol: symbol.to_string(),
            last,
            change_pct_24h: change,
            quote_volume_24h: volume,
        }
    }

    fn candle(ts: DateTime<Utc>, close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    /// 15 declining closes with a volume spike on the last candle: deeply
    /// oversold RSI, momentum about -2%, spike 2.2x, too short for breakout.
    fn oversold_candles() -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        (0..15)
            .map(|i| {
                let ts = t0 + ChronoDuration::minutes(5 * i as i64);
                let close = 100.0 - 0.2 * i as f64;
                let volume = if i == 14 { 2200.0 } else { 1000.0 };
                candle(ts, close, volume)
            })
            .collect()
    }

    fn pipeline_with(feed: MockFeed, config: ScannerConfig) -> (Arc<ScanPipeline>, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink {
            alerts: std::sync::Mutex::new(Vec::new()),
        });
        let dyn_sink: Arc<dyn AlertSink> = sink.clone();
        let pipeline = Arc::new(ScanPipeline::new(config, Arc::new(feed), dyn_sink));
        (pipeline, sink)
    }

    #[tokio::test]
    async fn oversold_scenario_emits_a_long_signal() {
        let mut feed = MockFeed::new();
        feed.tickers = vec![ticker("AAA_USDT", 0.972, -3.0, 500_000.0)];
        feed.candles
            .insert("AAA_USDT".to_string(), oversold_candles());
        let now = Utc::now();
        feed.trades = vec![
            Trade {
                price: 1.0,
                amount: 600.0,
                side: TradeSide::Buy,
                timestamp: now,
            },
            Trade {
                price: 1.0,
                amount: 200.0,
                side: TradeSide::Sell,
                timestamp: now,
            },
        ];

        let (pipeline, sink) = pipeline_with(feed, test_config());
        let summary = pipeline.run_cycle().await;

        assert!(summary.ran);
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.emitted, 1);

        let alerts = sink.alerts.lock().unwrap();
        let alert = &alerts[0];
        assert_eq!(alert.signal_type, SignalType::RsiOversold);
        assert_eq!(alert.direction, Direction::Long);
        assert!(alert.confidence >= 51, "confidence {}", alert.confidence);
        assert!(alert.rsi.unwrap() <= 25.0);
        assert!((alert.volume_spike.unwrap() - 2.2).abs() < 0.05);
        assert!(alert.breakout_pct.is_none()); // only 15 samples
        assert_eq!(alert.levels.entry, 0.972);
        assert!(alert.levels.tp1 > alert.levels.entry);
        assert!((alert.trade_flow.buy_pct - 75.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn insufficient_history_yields_no_signal_and_no_crash() {
        let mut feed = MockFeed::new();
        feed.tickers = vec![ticker("NEW_USDT", 1.0, -3.0, 500_000.0)];
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        feed.candles.insert(
            "NEW_USDT".to_string(),
            (0..5)
                .map(|i| candle(t0 + ChronoDuration::minutes(5 * i), 1.0, 100.0))
                .collect(),
        );

        let (pipeline, sink) = pipeline_with(feed, test_config());
        let summary = pipeline.run_cycle().await;

        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.emitted, 0);
        assert_eq!(summary.rejected, 1);
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn liquidity_floor_filters_thin_pairs() {
        let mut feed = MockFeed::new();
        feed.tickers = vec![
            ticker("THIN_USDT", 1.0, 5.0, 10_000.0),
            ticker("AAA_USDT", 0.972, -3.0, 500_000.0),
        ];
        feed.candles
            .insert("AAA_USDT".to_string(), oversold_candles());

        let (pipeline, _sink) = pipeline_with(feed, test_config());
        let summary = pipeline.run_cycle().await;

        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn one_failing_symbol_does_not_abort_the_cycle() {
        let mut feed = MockFeed::new();
        feed.tickers = vec![
            ticker("BAD_USDT", 1.0, 0.0, 900_000.0),
            ticker("AAA_USDT", 0.972, -3.0, 500_000.0),
        ];
        feed.fail_candles.insert("BAD_USDT".to_string());
        feed.candles
            .insert("AAA_USDT".to_string(), oversold_candles());

        let (pipeline, sink) = pipeline_with(feed, test_config());
        let summary = pipeline.run_cycle().await;

        assert!(summary.ran);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.scanned, 1);
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hourly_cap_stops_the_cycle_early() {
        let mut feed = MockFeed::new();
        // Two emit-worthy symbols, cap of one
        feed.tickers = vec![
            ticker("AAA_USDT", 0.972, -3.0, 600_000.0),
            ticker("BBB_USDT", 0.972, -3.0, 500_000.0),
        ];
        feed.candles
            .insert("AAA_USDT".to_string(), oversold_candles());
        feed.candles
            .insert("BBB_USDT".to_string(), oversold_candles());

        let mut config = test_config();
        config.max_hourly_signals = 1;
        let (pipeline, sink) = pipeline_with(feed, config);
        let summary = pipeline.run_cycle().await;

        assert_eq!(summary.emitted, 1);
        assert!(summary.stopped_early);
        assert_eq!(summary.scanned, 1);
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_cycles_are_refused() {
        let mut feed = MockFeed::new();
        feed.list_delay = Some(Duration::from_millis(100));

        let (pipeline, _sink) = pipeline_with(feed, test_config());
        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run_cycle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = pipeline.run_cycle().await;

        assert!(!second.ran, "second cycle should have been refused");
        assert!(first.await.unwrap().ran);
    }

    #[tokio::test]
    async fn repeat_candles_are_not_double_counted() {
        let mut feed = MockFeed::new();
        feed.tickers = vec![ticker("AAA_USDT", 0.972, -3.0, 500_000.0)];
        feed.candles
            .insert("AAA_USDT".to_string(), oversold_candles());

        let mut config = test_config();
        config.cooldown_seconds = 0;
        let (pipeline, _sink) = pipeline_with(feed, config);

        pipeline.run_cycle().await;
        pipeline.run_cycle().await;

        let store = pipeline.store.lock().await;
        assert_eq!(store.len("AAA_USDT"), 15);
    }
}
