use chrono::{DateTime, Utc};
use serde::Serialize;

/// One price/volume observation for a symbol. Volume is quote-denominated
/// (USDT for *_USDT pairs) so it is comparable across symbols.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// 24h ticker snapshot for one spot pair.
#[derive(Clone, Debug)]
pub struct Ticker {
    pub symbol: String,
    pub last: f64,
    pub change_pct_24h: f64,
    pub quote_volume_24h: f64,
}

/// One OHLCV candle, volume quote-denominated.
#[derive(Clone, Copy, Debug)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One executed spot trade.
#[derive(Clone, Debug)]
pub struct Trade {
    pub price: f64,
    pub amount: f64,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

/// Buy/sell quote-volume split over a recent window of trades.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct TradeFlow {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_pct: f64,
    pub sell_pct: f64,
}

impl TradeFlow {
    /// Aggregate trades newer than `cutoff`. Totals below `min_total` are
    /// reported as all-zero, matching the liquidity floor on raw trade flow.
    pub fn from_trades(trades: &[Trade], cutoff: DateTime<Utc>, min_total: f64) -> Self {
        let mut buy_volume = 0.0;
        let mut sell_volume = 0.0;
        for t in trades {
            if t.timestamp < cutoff {
                continue;
            }
            let quote = t.price * t.amount;
            match t.side {
                TradeSide::Buy => buy_volume += quote,
                TradeSide::Sell => sell_volume += quote,
            }
        }
        let total = buy_volume + sell_volume;
        if total < min_total || total <= 0.0 {
            return TradeFlow::default();
        }
        TradeFlow {
            buy_volume,
            sell_volume,
            buy_pct: buy_volume / total * 100.0,
            sell_pct: sell_volume / total * 100.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    RsiOversold,
    RsiOverbought,
    Breakout,
    VolumeSpike,
    Momentum,
    MultiFactor,
}

impl SignalType {
    pub fn label(&self) -> &'static str {
        match self {
            SignalType::RsiOversold => "RSI_OVERSOLD",
            SignalType::RsiOverbought => "RSI_OVERBOUGHT",
            SignalType::Breakout => "BREAKOUT",
            SignalType::VolumeSpike => "VOLUME_SPIKE",
            SignalType::Momentum => "MOMENTUM",
            SignalType::MultiFactor => "MULTI_FACTOR",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// The finished record handed to the alert-delivery sink. Fixed schema;
/// delivery formatting (HTML, subject lines) is the sink's concern.
#[derive(Clone, Debug, Serialize)]
pub struct SignalAlert {
    pub symbol: String,
    pub signal_type: SignalType,
    pub direction: Direction,
    pub confidence: u8,
    pub level: ConfidenceLevel,
    pub factors: Vec<String>,
    pub last_price: f64,
    pub change_pct_24h: f64,
    pub rsi: Option<f64>,
    pub volume_spike: Option<f64>,
    pub breakout_pct: Option<f64>,
    pub momentum_pct: f64,
    pub levels: crate::levels::TradingLevels,
    pub trade_flow: TradeFlow,
    pub sustained: bool,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(price: f64, amount: f64, side: TradeSide, secs: i64) -> Trade {
        Trade {
            price,
            amount,
            side,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn trade_flow_splits_buy_and_sell_volume() {
        let cutoff = Utc.timestamp_opt(100, 0).unwrap();
        let trades = vec![
            trade(2.0, 300.0, TradeSide::Buy, 150),  // 600 quote
            trade(2.0, 100.0, TradeSide::Sell, 150), // 200 quote
            trade(2.0, 500.0, TradeSide::Buy, 50),   // before cutoff, ignored
        ];
        let flow = TradeFlow::from_trades(&trades, cutoff, 250.0);
        assert_eq!(flow.buy_volume, 600.0);
        assert_eq!(flow.sell_volume, 200.0);
        assert!((flow.buy_pct - 75.0).abs() < 1e-9);
        assert!((flow.sell_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn trade_flow_below_floor_is_zeroed() {
        let cutoff = Utc.timestamp_opt(0, 0).unwrap();
        let trades = vec![trade(1.0, 100.0, TradeSide::Buy, 10)];
        let flow = TradeFlow::from_trades(&trades, cutoff, 250.0);
        assert_eq!(flow.buy_volume, 0.0);
        assert_eq!(flow.buy_pct, 0.0);
    }
}
