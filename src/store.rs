use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::model::QuoteSeries;

#[derive(Debug, Default)]
struct StoreState {
    series: HashMap<String, QuoteSeries>,
    last_refresh: Option<DateTime<Utc>>,
}

/// Latest normalized series per symbol, shared between the refresh worker and
/// the presentation layer. Series are only ever replaced whole.
#[derive(Debug, Clone, Default)]
pub struct QuoteStore {
    inner: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub last_refresh: Option<DateTime<Utc>>,
    pub series: HashMap<String, QuoteSeries>,
}

impl StoreSnapshot {
    pub fn get(&self, symbol: &str) -> Option<&QuoteSeries> {
        self.series.get(symbol)
    }
}

impl QuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, series: QuoteSeries) {
        let mut guard = self.inner.write().await;
        guard.series.insert(series.symbol.clone(), series);
    }

    pub async fn get(&self, symbol: &str) -> Option<QuoteSeries> {
        self.inner.read().await.series.get(symbol).cloned()
    }

    pub async fn contains(&self, symbol: &str) -> bool {
        self.inner.read().await.series.contains_key(symbol)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.series.len()
    }

    pub async fn mark_refreshed(&self, at: DateTime<Utc>) {
        self.inner.write().await.last_refresh = Some(at);
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_refresh
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let guard = self.inner.read().await;
        StoreSnapshot {
            last_refresh: guard.last_refresh,
            series: guard.series.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuoteBar;

    fn series(symbol: &str, close: f64) -> QuoteSeries {
        let bar = |secs: i64| QuoteBar {
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        };
        QuoteSeries {
            symbol: symbol.to_string(),
            bars: vec![bar(0), bar(60)],
        }
    }

    #[tokio::test]
    async fn replace_swaps_whole_series() {
        let store = QuoteStore::new();
        store.replace(series("PETR4.SA", 30.0)).await;
        store.replace(series("PETR4.SA", 31.0)).await;
        store.replace(series("VALE3.SA", 60.0)).await;

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("PETR4.SA").await.unwrap().last_close(), Some(31.0));
        assert!(store.get("ITUB4.SA").await.is_none());
    }

    #[tokio::test]
    async fn snapshot_carries_refresh_time() {
        let store = QuoteStore::new();
        assert!(store.last_refresh().await.is_none());
        let at = Utc::now();
        store.mark_refreshed(at).await;
        store.replace(series("WEGE3.SA", 40.0)).await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.last_refresh, Some(at));
        assert!(snapshot.get("WEGE3.SA").is_some());
    }
}
