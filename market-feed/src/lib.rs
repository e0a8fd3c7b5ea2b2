use serde::{Deserialize, Serialize};
use std::pin::Pin;

use futures_core::Stream;
use thiserror::Error;
use ticker_core::{DayResetPolicy, PriceDelta, PricedRow, SeriesStore, Timestamp};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("history fetch failed: {0}")]
    Fetch(String),
    #[error("history decode failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed {field} in history row {line}: {value:?}")]
    Parse {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// One record of the `/market-history` CSV body, untouched wire strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub timestamp: String,
    pub ticker: String,
    pub price: String,
}

/// Parse the historical CSV body into numeric rows.
pub fn parse_history(body: &str) -> Result<Vec<PricedRow>, FeedError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<HistoryRow>().enumerate() {
        let line = i + 2; // header occupies line 1
        let raw = record?;
        let ts: Timestamp = raw.timestamp.trim().parse().map_err(|_| FeedError::Parse {
            line,
            field: "timestamp",
            value: raw.timestamp.clone(),
        })?;
        let price: f64 = raw.price.trim().parse().map_err(|_| FeedError::Parse {
            line,
            field: "price",
            value: raw.price.clone(),
        })?;
        rows.push(PricedRow {
            ts,
            ticker: raw.ticker,
            price,
        });
    }
    Ok(rows)
}

/// One per-ticker delta of a `"market events"` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerChange {
    pub ticker: String,
    pub change: f64,
}

impl From<TickerChange> for PriceDelta {
    fn from(c: TickerChange) -> Self {
        PriceDelta {
            ticker: c.ticker,
            change: c.change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickBatch {
    pub timestamp: Timestamp,
    pub changes: Vec<TickerChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMarker {
    pub timestamp: Timestamp,
    #[serde(rename = "newDay")]
    pub new_day: bool,
}

/// The push connection's message envelope. Event names are part of the
/// wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PushMessage {
    #[serde(rename = "market events")]
    MarketEvents(TickBatch),
    #[serde(rename = "start new day")]
    StartNewDay(DayMarker),
}

/// Reduced event alphabet consumed by a `DataSink`.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// Historical rows (HTTP backfill).
    History(Vec<PricedRow>),
    /// Incremental per-ticker price deltas.
    PriceTick(TickBatch),
    /// A new trading day has begun.
    NewDay(DayMarker),
}

impl From<PushMessage> for MarketEvent {
    fn from(msg: PushMessage) -> Self {
        match msg {
            PushMessage::MarketEvents(batch) => MarketEvent::PriceTick(batch),
            PushMessage::StartNewDay(marker) => MarketEvent::NewDay(marker),
        }
    }
}

/// Consumer interface for feed events. Events must be applied strictly in
/// arrival order; a tick prices off the previous tick's last price.
pub trait DataSink {
    fn on_event(&mut self, event: MarketEvent);
}

/// A `SeriesStore` driven by `MarketEvent`s over a fixed ticker set.
pub struct FeedStore {
    store: SeriesStore,
}

impl FeedStore {
    pub fn new<I, S>(tickers: I, policy: DayResetPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store: SeriesStore::new(tickers, policy),
        }
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SeriesStore {
        &mut self.store
    }
}

impl DataSink for FeedStore {
    fn on_event(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::History(rows) => {
                self.store.load(&rows);
            }
            MarketEvent::PriceTick(batch) => {
                let deltas: Vec<PriceDelta> =
                    batch.changes.into_iter().map(Into::into).collect();
                self.store.apply_tick(batch.timestamp, &deltas);
            }
            MarketEvent::NewDay(marker) => {
                self.store.reset_day(marker.timestamp);
            }
        }
    }
}

/// Abstract event source: concrete implementations live in platform
/// crates (the browser frontend wires a websocket to this shape).
pub type DataStream<E> = Pin<Box<dyn Stream<Item = Result<MarketEvent, E>> + 'static>>;

pub trait DataSource {
    type Error;

    fn subscribe(&self) -> DataStream<Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticker_core::MINUTE_MS;

    const TICKERS: [&str; 4] = ["AAPL", "GOOGL", "FB", "MSFT"];

    const HISTORY: &str = "timestamp,ticker,price\n\
        1638351000000,AAPL,119.25\n\
        1638351000000,GOOGL,2840.50\n\
        1638351060000,AAPL,119.75\n\
        1638351060000,GOOGL,2838.00\n";

    #[test]
    fn parses_history_csv() {
        let rows = parse_history(HISTORY).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].ticker, "AAPL");
        assert_eq!(rows[0].ts, 1_638_351_000_000);
        assert!((rows[0].price - 119.25).abs() < 1e-9);
    }

    #[test]
    fn history_parse_error_names_line_and_field() {
        let body = "timestamp,ticker,price\n1638351000000,AAPL,not-a-price\n";
        match parse_history(body) {
            Err(FeedError::Parse { line, field, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "price");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn decodes_market_events_envelope() {
        let raw = r#"{
            "event": "market events",
            "data": {
                "timestamp": 1638351120000,
                "changes": [
                    {"ticker": "AAPL", "change": 0.25},
                    {"ticker": "FB", "change": -1.5}
                ]
            }
        }"#;
        let msg: PushMessage = serde_json::from_str(raw).unwrap();
        let PushMessage::MarketEvents(batch) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(batch.timestamp, 1_638_351_120_000);
        assert_eq!(batch.changes.len(), 2);
        assert_eq!(batch.changes[1].ticker, "FB");
    }

    #[test]
    fn decodes_start_new_day_envelope() {
        let raw = r#"{"event": "start new day", "data": {"timestamp": 1638397800000, "newDay": true}}"#;
        let msg: PushMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            PushMessage::StartNewDay(DayMarker {
                timestamp: 1_638_397_800_000,
                new_day: true,
            })
        );
    }

    #[test]
    fn reducer_advances_every_ticker_per_tick() {
        let mut feed = FeedStore::new(TICKERS, DayResetPolicy::Clear);
        feed.on_event(MarketEvent::History(parse_history(HISTORY).unwrap()));
        // FB and MSFT have no history: no price basis yet, so only the two
        // loaded tickers advance.
        feed.on_event(MarketEvent::PriceTick(TickBatch {
            timestamp: 1_638_351_120_000,
            changes: vec![TickerChange {
                ticker: "AAPL".to_string(),
                change: 0.25,
            }],
        }));
        assert_eq!(feed.store().by_ticker("AAPL").unwrap().len(), 3);
        assert_eq!(feed.store().by_ticker("GOOGL").unwrap().len(), 3);
        assert_eq!(feed.store().by_ticker("FB").unwrap().len(), 0);
        // GOOGL was absent from the batch but still advanced, unchanged.
        let googl = feed.store().by_ticker("GOOGL").unwrap();
        assert_eq!(googl.last().unwrap().price, 2838.00);
    }

    #[test]
    fn day_reset_event_rebases_following_ticks() {
        let mut feed = FeedStore::new(["AAPL"], DayResetPolicy::Clear);
        feed.on_event(MarketEvent::History(
            parse_history("timestamp,ticker,price\n0,AAPL,100.00\n60000,AAPL,101.00\n").unwrap(),
        ));
        feed.on_event(MarketEvent::PriceTick(TickBatch {
            timestamp: 2 * MINUTE_MS,
            changes: vec![TickerChange {
                ticker: "AAPL".to_string(),
                change: 2.0,
            }],
        }));
        feed.on_event(MarketEvent::NewDay(DayMarker {
            timestamp: 3 * MINUTE_MS,
            new_day: true,
        }));

        assert_eq!(feed.store().by_ticker("AAPL").unwrap().len(), 0);
        assert_eq!(feed.store().prev_close("AAPL"), Some(103.0));

        feed.on_event(MarketEvent::PriceTick(TickBatch {
            timestamp: 4 * MINUTE_MS,
            changes: vec![],
        }));
        let first = feed
            .store()
            .by_ticker("AAPL")
            .unwrap()
            .first()
            .copied()
            .unwrap();
        assert_eq!(first.price, 103.0);
        assert_eq!(first.percent_change, 0.0);
    }
}
