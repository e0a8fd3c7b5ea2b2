//! Selection state, view-mode dispatch, and display formatting.

use chrono::{TimeZone, Utc};
use serde::Serialize;
use ticker_core::{Sample, SeriesStore, Timestamp};

/// Tickers the user has checked, in insertion order (= display order for
/// the comparison view).
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    tickers: Vec<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check or uncheck one ticker. Returns whether the set changed.
    pub fn set(&mut self, ticker: &str, checked: bool) -> bool {
        let present = self.tickers.iter().any(|t| t == ticker);
        match (present, checked) {
            (false, true) => {
                self.tickers.push(ticker.to_string());
                true
            }
            (true, false) => {
                self.tickers.retain(|t| t != ticker);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// What the chart plots. Single-selection charts plot price in dollars;
/// multi-selection charts plot percent change from the day-open so series
/// with different price levels are comparable. No selection hides the
/// chart entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewMode {
    Hidden,
    Single(String),
    Comparison(Vec<String>),
}

impl ViewMode {
    pub fn from_selection(selection: &SelectionSet) -> Self {
        match selection.as_slice() {
            [] => ViewMode::Hidden,
            [one] => ViewMode::Single(one.clone()),
            many => ViewMode::Comparison(many.to_vec()),
        }
    }

    pub fn tickers(&self) -> &[String] {
        match self {
            ViewMode::Hidden => &[],
            ViewMode::Single(t) => std::slice::from_ref(t),
            ViewMode::Comparison(ts) => ts,
        }
    }

    /// The plotted value of one sample under this mode.
    pub fn value_of(&self, sample: &Sample) -> f64 {
        match self {
            ViewMode::Comparison(_) => sample.percent_change,
            _ => sample.price,
        }
    }

    /// Min/max of the plotted value over every sample of the mode's
    /// tickers. `None` until at least one selected ticker has a sample
    /// (the domain of an empty series is undefined).
    pub fn value_domain(&self, store: &SeriesStore) -> Option<(f64, f64)> {
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut any = false;
        for ticker in self.tickers() {
            let Some(series) = store.by_ticker(ticker) else {
                continue;
            };
            for sample in series.as_slice() {
                let v = self.value_of(sample);
                min = min.min(v);
                max = max.max(v);
                any = true;
            }
        }
        any.then_some((min, max))
    }

    /// Extent of timestamps over the mode's tickers.
    pub fn time_domain(&self, store: &SeriesStore) -> Option<(Timestamp, Timestamp)> {
        let mut min = Timestamp::MAX;
        let mut max = Timestamp::MIN;
        let mut any = false;
        for ticker in self.tickers() {
            let Some(series) = store.by_ticker(ticker) else {
                continue;
            };
            if let (Some(first), Some(last)) = (series.first(), series.last()) {
                min = min.min(first.ts);
                max = max.max(last.ts);
                any = true;
            }
        }
        any.then_some((min, max))
    }

    /// Value-axis tick label under this mode: currency in single mode,
    /// signed percent in comparison mode.
    pub fn format_value(&self, v: f64) -> String {
        match self {
            ViewMode::Comparison(_) => format!("{v:+.2}%"),
            _ => format!("${v:.2}"),
        }
    }
}

/// Time-axis tick label, `HH:MM` UTC.
pub fn format_clock(ts: Timestamp) -> String {
    Utc.timestamp_millis_opt(ts)
        .single()
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

/// Signed dollar delta for the indication panel; zero renders unsigned.
pub fn signed_dollars(v: f64) -> String {
    if v > 0.0 {
        format!("+${v:.2}")
    } else if v < 0.0 {
        format!("-${:.2}", -v)
    } else {
        format!("${v:.2}")
    }
}

/// Signed percent delta for the indication panel; zero renders unsigned.
pub fn signed_percent(v: f64) -> String {
    if v > 0.0 {
        format!("+{v:.2}%")
    } else if v < 0.0 {
        format!("-{:.2}%", -v)
    } else {
        format!("{v:.2}%")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(change: f64) -> Self {
        if change > 0.0 {
            Direction::Up
        } else if change < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    /// Styling class of the indication panel.
    pub fn css_class(&self) -> &'static str {
        match self {
            Direction::Down => "down",
            _ => "up",
        }
    }
}

/// Day-change summary of one ticker for the indication panel, with the
/// panel's display strings precomputed.
#[derive(Debug, Clone, Serialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub last_price: f64,
    pub price_change: f64,
    pub percent_change: f64,
    pub direction: Direction,
    pub css_class: &'static str,
    pub display_price: String,
    pub display_change: String,
    pub display_percent: String,
}

/// Summaries for the given tickers; tickers with no samples yet are
/// skipped.
pub fn summaries(store: &SeriesStore, tickers: &[String]) -> Vec<TickerSummary> {
    tickers
        .iter()
        .filter_map(|ticker| {
            let last = store.by_ticker(ticker)?.last()?;
            let direction = Direction::of(last.price_change);
            Some(TickerSummary {
                ticker: ticker.clone(),
                last_price: last.price,
                price_change: last.price_change,
                percent_change: last.percent_change,
                direction,
                css_class: direction.css_class(),
                display_price: format!("${:.2}", last.price),
                display_change: signed_dollars(last.price_change),
                display_percent: signed_percent(last.percent_change),
            })
        })
        .collect()
}
