use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_FETCH_WINDOWS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// Instrument whose display name is its ticker without the exchange suffix.
    pub fn from_symbol(symbol: &str) -> Self {
        let name = symbol.strip_suffix(".SA").unwrap_or(symbol);
        Self::new(symbol, name)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.symbol)
    }
}

/// Most traded B3 equities.
pub fn default_roster() -> Vec<Instrument> {
    const ROSTER: [(&str, &str); 9] = [
        ("PETR4.SA", "Petrobras"),
        ("VALE3.SA", "Vale"),
        ("ITUB4.SA", "Itaú Unibanco"),
        ("BBDC4.SA", "Bradesco"),
        ("B3SA3.SA", "B3"),
        ("WEGE3.SA", "Weg"),
        ("ABEV3.SA", "Ambev"),
        ("BBAS3.SA", "Banco do Brasil"),
        ("PETR3.SA", "Petrobras PN"),
    ];

    ROSTER
        .iter()
        .map(|(symbol, name)| Instrument::new(*symbol, *name))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub interval: String,
    pub range: String,
}

impl FetchWindow {
    pub fn new(interval: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            range: range.into(),
        }
    }

    /// Approximate bar length in minutes, `None` for intervals the provider
    /// expresses in calendar units or that are zero or overflow.
    pub fn interval_minutes(&self) -> Option<u32> {
        let value = self.interval.as_str();
        let (digits, scale) = if let Some(digits) = value.strip_suffix('m') {
            (digits, 1)
        } else if let Some(digits) = value.strip_suffix('h') {
            (digits, 60)
        } else if let Some(digits) = value.strip_suffix('d') {
            (digits, 24 * 60)
        } else {
            return None;
        };
        digits
            .parse::<u32>()
            .ok()
            .and_then(|count| count.checked_mul(scale))
            .filter(|minutes| *minutes > 0)
    }

    /// Approximate lookback length in days.
    pub fn range_days(&self) -> Option<u32> {
        let digits = self.range.strip_suffix('d')?;
        digits.parse().ok()
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.interval, self.range)
    }
}

pub fn default_fetch_windows() -> Vec<FetchWindow> {
    DEFAULT_FETCH_WINDOWS
        .iter()
        .map(|(interval, range)| FetchWindow::new(*interval, *range))
        .collect()
}

/// Columnar history as returned by a provider. Absent columns are `None`;
/// individual cells may be null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHistory {
    pub timestamps: Vec<i64>,
    pub open: Option<Vec<Option<f64>>>,
    pub high: Option<Vec<Option<f64>>>,
    pub low: Option<Vec<Option<f64>>>,
    pub close: Option<Vec<Option<f64>>>,
    pub volume: Option<Vec<Option<u64>>>,
}

impl RawHistory {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Normalized recent history for one symbol: ascending, at least two bars,
/// every close strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSeries {
    pub symbol: String,
    pub bars: Vec<QuoteBar>,
}

impl QuoteSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&QuoteBar> {
        self.bars.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.last().map(|bar| bar.close)
    }

    pub fn previous_close(&self) -> Option<f64> {
        let len = self.bars.len();
        if len < 2 {
            return None;
        }
        Some(self.bars[len - 2].close)
    }

    /// Percentage change between the last two closes.
    pub fn change_pct(&self) -> Option<f64> {
        let last = self.last_close()?;
        let previous = self.previous_close()?;
        if previous <= 0.0 {
            return None;
        }
        Some((last - previous) / previous * 100.0)
    }

    pub fn period_low(&self) -> Option<f64> {
        self.bars.iter().map(|bar| bar.low).reduce(f64::min)
    }

    pub fn period_high(&self) -> Option<f64> {
        self.bars.iter().map(|bar| bar.high).reduce(f64::max)
    }

    pub fn closes(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.bars.iter().map(|bar| (bar.timestamp, bar.close))
    }
}
