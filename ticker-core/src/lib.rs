use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Milliseconds since Unix epoch.
pub type Timestamp = i64;

/// Number of milliseconds in common units.
pub const MS: i64 = 1_000;
pub const MINUTE_MS: i64 = 60 * MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// One observation of a ticker's price, with columns derived against the
/// day-open (the first sample of the current trading day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ts: Timestamp,
    pub price: f64,
    /// `price - day_open`.
    pub price_change: f64,
    /// `100 * price_change / day_open`.
    pub percent_change: f64,
}

impl Sample {
    /// Build a sample with derived columns computed against `day_open`.
    pub fn rebased(ts: Timestamp, price: f64, day_open: f64) -> Self {
        let price_change = price - day_open;
        let percent_change = if day_open != 0.0 {
            100.0 * price_change / day_open
        } else {
            0.0
        };
        Self {
            ts,
            price,
            price_change,
            percent_change,
        }
    }
}

/// One raw historical row after numeric parsing (wire parsing lives in the
/// feed layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedRow {
    pub ts: Timestamp,
    pub ticker: String,
    pub price: f64,
}

/// A per-ticker price delta from one tick batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDelta {
    pub ticker: String,
    pub change: f64,
}

pub trait HasTimestamp {
    fn ts(&self) -> Timestamp;
}

impl HasTimestamp for Sample {
    fn ts(&self) -> Timestamp {
        self.ts
    }
}

/// Append-only time-series with binary-searchable timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    data: Vec<T>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: HasTimestamp> TimeSeries<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.data.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.data.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn append(&mut self, sample: T) {
        if let Some(last) = self.data.last() {
            assert!(
                sample.ts() >= last.ts(),
                "append expects non-decreasing timestamps"
            );
        }
        self.data.push(sample);
    }

    /// Returns a slice of samples whose timestamps are in [start_ts, end_ts).
    pub fn range(&self, start_ts: Timestamp, end_ts: Timestamp) -> &[T] {
        let start_idx = self.lower_bound(start_ts);
        let end_idx = self.lower_bound(end_ts);
        &self.data[start_idx..end_idx]
    }

    fn lower_bound(&self, ts: Timestamp) -> usize {
        let mut left = 0usize;
        let mut right = self.data.len();
        while left < right {
            let mid = (left + right) / 2;
            match self.data[mid].ts().cmp(&ts) {
                Ordering::Less => left = mid + 1,
                Ordering::Equal | Ordering::Greater => right = mid,
            }
        }
        left
    }

    /// Index of the sample whose timestamp is center-nearest to `ts`.
    /// An exact midpoint resolves to the earlier sample.
    pub fn nearest(&self, ts: Timestamp) -> Option<usize> {
        if self.data.is_empty() {
            return None;
        }
        let idx = self.lower_bound(ts);
        if idx == 0 {
            return Some(0);
        }
        if idx == self.data.len() {
            return Some(idx - 1);
        }
        let before = self.data[idx - 1].ts();
        let after = self.data[idx].ts();
        if after - ts < ts - before {
            Some(idx)
        } else {
            Some(idx - 1)
        }
    }
}

/// What happens to each ticker's sequence when a new trading day starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DayResetPolicy {
    /// Drop the sequence; the first post-reset sample becomes the day-open.
    #[default]
    Clear,
    /// Keep the trailing `n` samples, shift their timestamps so the newest
    /// lands on the day marker, and rebase derived columns so the first
    /// retained sample is the new day-open.
    RetainTrailing(usize),
}

#[derive(Debug, Default)]
struct TickerState {
    samples: TimeSeries<Sample>,
    day_open: Option<f64>,
    prev_close: Option<f64>,
}

/// In-memory store of per-ticker intraday series over a fixed ticker set.
///
/// The set is fixed at construction; insertion order is display order.
/// Per-ticker groupings are never cached by consumers: `by_ticker` always
/// reads the live sequence.
#[derive(Debug)]
pub struct SeriesStore {
    tickers: Vec<String>,
    series: HashMap<String, TickerState>,
    policy: DayResetPolicy,
}

impl SeriesStore {
    pub fn new<I, S>(tickers: I, policy: DayResetPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tickers: Vec<String> = tickers.into_iter().map(Into::into).collect();
        let series = tickers
            .iter()
            .map(|t| (t.clone(), TickerState::default()))
            .collect();
        Self {
            tickers,
            series,
            policy,
        }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn policy(&self) -> DayResetPolicy {
        self.policy
    }

    /// Ingest historical rows. Rows are sorted by timestamp before grouping;
    /// rows naming a ticker outside the fixed set are dropped. Day-open per
    /// ticker is its first sample's price, and every sample's derived
    /// columns are rebased against it.
    pub fn load(&mut self, rows: &[PricedRow]) {
        let mut ordered: Vec<&PricedRow> = rows.iter().collect();
        ordered.sort_by_key(|r| r.ts);
        for row in ordered {
            let Some(state) = self.series.get_mut(&row.ticker) else {
                continue;
            };
            let day_open = *state.day_open.get_or_insert(row.price);
            state
                .samples
                .append(Sample::rebased(row.ts, row.price, day_open));
        }
    }

    /// Apply one tick batch: every ticker in the fixed set gets exactly one
    /// new sample, whether or not it appears in `changes`. The new price is
    /// the last sample's price (or the cached previous-day close when the
    /// day's sequence is empty) plus the matching delta, if any. A ticker
    /// with no price basis at all is skipped; deltas for unknown tickers
    /// are dropped.
    pub fn apply_tick(&mut self, ts: Timestamp, changes: &[PriceDelta]) {
        let deltas: HashMap<&str, f64> = changes
            .iter()
            .map(|c| (c.ticker.as_str(), c.change))
            .collect();
        for ticker in &self.tickers {
            let Some(state) = self.series.get_mut(ticker) else {
                continue;
            };
            let last_price = state
                .samples
                .last()
                .map(|s| s.price)
                .or(state.prev_close);
            let Some(last_price) = last_price else {
                continue;
            };
            let price = last_price + deltas.get(ticker.as_str()).copied().unwrap_or(0.0);
            let day_open = *state.day_open.get_or_insert(price);
            state.samples.append(Sample::rebased(ts, price, day_open));
        }
    }

    /// Start a new trading day: each ticker's last sample becomes its cached
    /// previous-day close, then the configured `DayResetPolicy` is applied.
    pub fn reset_day(&mut self, marker_ts: Timestamp) {
        for state in self.series.values_mut() {
            if let Some(last) = state.samples.last() {
                state.prev_close = Some(last.price);
            }
            match self.policy {
                DayResetPolicy::Clear => {
                    state.samples = TimeSeries::new();
                    state.day_open = None;
                }
                DayResetPolicy::RetainTrailing(n) => {
                    let slice = state.samples.as_slice();
                    let tail_start = slice.len().saturating_sub(n);
                    let tail = &slice[tail_start..];
                    let mut rebased = TimeSeries::new();
                    if let (Some(first), Some(last)) = (tail.first(), tail.last()) {
                        let day_open = first.price;
                        let shift = marker_ts - last.ts;
                        for s in tail {
                            rebased.append(Sample::rebased(s.ts + shift, s.price, day_open));
                        }
                        state.day_open = Some(day_open);
                    } else {
                        state.day_open = None;
                    }
                    state.samples = rebased;
                }
            }
        }
    }

    /// The live per-ticker sequence; `None` for tickers outside the set.
    pub fn by_ticker(&self, ticker: &str) -> Option<&TimeSeries<Sample>> {
        self.series.get(ticker).map(|s| &s.samples)
    }

    pub fn day_open(&self, ticker: &str) -> Option<f64> {
        self.series.get(ticker).and_then(|s| s.day_open)
    }

    pub fn prev_close(&self, ticker: &str) -> Option<f64> {
        self.series.get(ticker).and_then(|s| s.prev_close)
    }
}
