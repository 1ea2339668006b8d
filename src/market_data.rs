//! Market-data collaborator: the trait seam the pipeline consumes and the
//! Gate.io v4 spot REST implementation behind it.
//!
//! Every method can fail per call; callers treat a failure as "skip this
//! symbol this cycle". Numeric fields arrive as JSON strings and are coerced
//! to 0.0 when malformed rather than failing the whole payload.

use crate::types::{Candle, Ticker, Trade, TradeSide};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },
}

#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// All spot tickers, with enough metadata for the liquidity floor.
    async fn list_tickers(&self) -> Result<Vec<Ticker>, FeedError>;

    /// Recent OHLCV candles for one pair, oldest first.
    async fn candles(
        &self,
        symbol: &str,
        interval_minutes: u32,
        limit: u32,
    ) -> Result<Vec<Candle>, FeedError>;

    /// Most recent executed trades for one pair.
    async fn recent_trades(&self, symbol: &str, limit: u32) -> Result<Vec<Trade>, FeedError>;
}

pub struct GateFeed {
    client: reqwest::Client,
    base_url: String,
}

impl GateFeed {
    pub fn new(base_url: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(GateFeed {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct RawTicker {
    #[serde(default)]
    currency_pair: String,
    #[serde(default)]
    last: String,
    #[serde(default)]
    change_percentage: String,
    #[serde(default)]
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct RawTrade {
    #[serde(default)]
    create_time: String,
    #[serde(default)]
    side: String,
    #[serde(default)]
    amount: String,
    #[serde(default)]
    price: String,
}

#[async_trait]
impl MarketFeed for GateFeed {
    async fn list_tickers(&self) -> Result<Vec<Ticker>, FeedError> {
        let raw: Vec<RawTicker> = self.get_json("/spot/tickers").await?;
        Ok(raw
            .into_iter()
            .filter(|t| !t.currency_pair.is_empty())
            .map(|t| Ticker {
                symbol: t.currency_pair,
                last: num(&t.last),
                change_pct_24h: num(&t.change_percentage),
                quote_volume_24h: num(&t.quote_volume),
            })
            .collect())
    }

    async fn candles(
        &self,
        symbol: &str,
        interval_minutes: u32,
        limit: u32,
    ) -> Result<Vec<Candle>, FeedError> {
        let path = format!(
            "/spot/candlesticks?currency_pair={symbol}&interval={}&limit={limit}",
            interval_label(interval_minutes)
        );
        let raw: Vec<Vec<Value>> = self.get_json(&path).await?;
        let mut candles: Vec<Candle> = raw.iter().filter_map(|row| parse_candle_row(row)).collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    async fn recent_trades(&self, symbol: &str, limit: u32) -> Result<Vec<Trade>, FeedError> {
        let path = format!("/spot/trades?currency_pair={symbol}&limit={limit}");
        let raw: Vec<RawTrade> = self.get_json(&path).await?;
        Ok(raw
            .into_iter()
            .map(|t| Trade {
                price: num(&t.price),
                amount: num(&t.amount),
                side: if t.side.eq_ignore_ascii_case("buy") {
                    TradeSide::Buy
                } else {
                    TradeSide::Sell
                },
                timestamp: epoch(num(&t.create_time) as i64),
            })
            .collect())
    }
}

fn num(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}

fn epoch(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}

fn value_num(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::String(s)) => num(s),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Gate candlestick rows: [timestamp, quote_volume, close, high, low, open, ...]
fn parse_candle_row(row: &[Value]) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    Some(Candle {
        timestamp: epoch(value_num(row.first()) as i64),
        volume: value_num(row.get(1)),
        close: value_num(row.get(2)),
        high: value_num(row.get(3)),
        low: value_num(row.get(4)),
        open: value_num(row.get(5)),
    })
}

fn interval_label(minutes: u32) -> String {
    if minutes >= 60 && minutes % 60 == 0 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}m", minutes.max(1))
    }
}
