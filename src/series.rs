use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{QuoteBar, QuoteSeries, RawHistory};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("response has no close column")]
    MissingClose,
    #[error("column {column} has {found} cells, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
    #[error("only {usable} usable rows after cleaning")]
    TooFewRows { usable: usize },
}

struct Row {
    timestamp: i64,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
}

/// Clean a provider response into a [`QuoteSeries`] holding at most `limit`
/// of the most recent bars.
///
/// Rows are sorted by timestamp, null closes are forward-filled, missing
/// open/high/low fall back to the close and rows without a strictly positive
/// close are dropped. Fewer than two surviving rows is an error.
pub fn normalize(
    symbol: &str,
    raw: &RawHistory,
    limit: usize,
) -> Result<QuoteSeries, NormalizeError> {
    let close = raw.close.as_ref().ok_or(NormalizeError::MissingClose)?;
    let expected = raw.timestamps.len();
    check_len("close", close.len(), expected)?;
    for (column, len) in [
        ("open", raw.open.as_ref().map(Vec::len)),
        ("high", raw.high.as_ref().map(Vec::len)),
        ("low", raw.low.as_ref().map(Vec::len)),
        ("volume", raw.volume.as_ref().map(Vec::len)),
    ] {
        if let Some(len) = len {
            check_len(column, len, expected)?;
        }
    }

    let cell = |column: &Option<Vec<Option<f64>>>, idx: usize| {
        column.as_ref().and_then(|values| values[idx])
    };

    let mut rows: Vec<Row> = raw
        .timestamps
        .iter()
        .enumerate()
        .map(|(idx, &timestamp)| Row {
            timestamp,
            open: cell(&raw.open, idx),
            high: cell(&raw.high, idx),
            low: cell(&raw.low, idx),
            close: close[idx],
            volume: raw.volume.as_ref().and_then(|values| values[idx]),
        })
        .collect();

    rows.sort_by_key(|row| row.timestamp);

    let mut carried: Option<f64> = None;
    for row in rows.iter_mut() {
        match row.close.filter(|value| !value.is_nan()) {
            Some(value) => carried = Some(value),
            None => row.close = carried,
        }
    }

    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(close) = row.close.filter(|value| *value > 0.0 && value.is_finite()) else {
            continue;
        };
        bars.push(QuoteBar {
            timestamp: to_datetime(row.timestamp)?,
            open: row.open.filter(|v| v.is_finite()).unwrap_or(close),
            high: row.high.filter(|v| v.is_finite()).unwrap_or(close),
            low: row.low.filter(|v| v.is_finite()).unwrap_or(close),
            close,
            volume: row.volume.unwrap_or(0),
        });
    }

    if bars.len() < 2 {
        return Err(NormalizeError::TooFewRows { usable: bars.len() });
    }

    if bars.len() > limit {
        bars.drain(..bars.len() - limit);
    }

    Ok(QuoteSeries {
        symbol: symbol.to_string(),
        bars,
    })
}

fn check_len(column: &'static str, found: usize, expected: usize) -> Result<(), NormalizeError> {
    if found == expected {
        Ok(())
    } else {
        Err(NormalizeError::LengthMismatch {
            column,
            expected,
            found,
        })
    }
}

fn to_datetime(secs: i64) -> Result<DateTime<Utc>, NormalizeError> {
    DateTime::from_timestamp(secs, 0).ok_or(NormalizeError::InvalidTimestamp(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes(values: &[Option<f64>]) -> RawHistory {
        RawHistory {
            timestamps: (0..values.len() as i64).map(|i| 1_700_000_000 + i * 900).collect(),
            close: Some(values.to_vec()),
            ..RawHistory::default()
        }
    }

    #[test]
    fn forward_fills_single_gap() {
        let raw = closes(&[Some(10.0), None, Some(12.0)]);
        let series = normalize("PETR4.SA", &raw, 50).expect("normalized");
        let values: Vec<f64> = series.bars.iter().map(|bar| bar.close).collect();
        assert_eq!(values, vec![10.0, 10.0, 12.0]);
    }

    #[test]
    fn leading_gap_is_dropped() {
        let raw = closes(&[None, Some(11.0), Some(12.0)]);
        let series = normalize("PETR4.SA", &raw, 50).expect("normalized");
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].close, 11.0);
    }

    #[test]
    fn sorts_rows_by_timestamp() {
        let raw = RawHistory {
            timestamps: vec![300, 100, 200],
            close: Some(vec![Some(3.0), Some(1.0), Some(2.0)]),
            volume: Some(vec![Some(30), None, Some(20)]),
            ..RawHistory::default()
        };
        let series = normalize("VALE3.SA", &raw, 50).expect("normalized");
        let values: Vec<f64> = series.bars.iter().map(|bar| bar.close).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(series.bars[0].volume, 0);
        assert_eq!(series.bars[2].volume, 30);
    }

    #[test]
    fn missing_columns_default_to_close() {
        let mut raw = closes(&[Some(5.0), Some(6.0)]);
        raw.high = Some(vec![Some(7.0), None]);
        let series = normalize("WEGE3.SA", &raw, 50).expect("normalized");
        let first = series.bars[0];
        assert_eq!((first.open, first.high, first.low), (5.0, 7.0, 5.0));
        let second = series.bars[1];
        assert_eq!((second.open, second.high, second.low), (6.0, 6.0, 6.0));
    }

    #[test]
    fn drops_non_positive_closes() {
        let raw = closes(&[Some(0.0), Some(-1.0), Some(4.0), Some(5.0)]);
        let series = normalize("ABEV3.SA", &raw, 50).expect("normalized");
        assert!(series.bars.iter().all(|bar| bar.close > 0.0));
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn keeps_most_recent_observations() {
        let values: Vec<Option<f64>> = (1..=80).map(|i| Some(i as f64)).collect();
        let series = normalize("ITUB4.SA", &closes(&values), 50).expect("normalized");
        assert_eq!(series.len(), 50);
        assert_eq!(series.bars.first().unwrap().close, 31.0);
        assert_eq!(series.bars.last().unwrap().close, 80.0);
        assert!(series
            .bars
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn rejects_too_few_rows() {
        let raw = closes(&[None, Some(3.0), Some(0.0)]);
        assert_eq!(
            normalize("B3SA3.SA", &raw, 50),
            Err(NormalizeError::TooFewRows { usable: 1 })
        );
    }

    #[test]
    fn rejects_missing_close_column() {
        let raw = RawHistory {
            timestamps: vec![1, 2, 3],
            open: Some(vec![Some(1.0); 3]),
            ..RawHistory::default()
        };
        assert_eq!(
            normalize("BBAS3.SA", &raw, 50),
            Err(NormalizeError::MissingClose)
        );
    }

    #[test]
    fn rejects_ragged_columns() {
        let mut raw = closes(&[Some(1.0), Some(2.0), Some(3.0)]);
        raw.low = Some(vec![Some(1.0)]);
        assert!(matches!(
            normalize("BBDC4.SA", &raw, 50),
            Err(NormalizeError::LengthMismatch { column: "low", .. })
        ));
    }
}
