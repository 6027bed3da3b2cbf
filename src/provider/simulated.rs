use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::model::{FetchWindow, RawHistory};

use super::{MarketDataProvider, ProviderError};

const SESSION_MINUTES: u32 = 7 * 60;
const GAP_PROBABILITY: f64 = 0.03;
const VOLATILITY: f64 = 0.004;

/// Offline provider producing a geometric random walk per symbol.
///
/// Each symbol keeps its own walk between calls so consecutive refresh cycles
/// continue from the last simulated price.
pub struct SimulatedProvider {
    rng: Mutex<StdRng>,
    last_prices: Mutex<HashMap<String, f64>>,
    anchor: DateTime<Utc>,
}

impl SimulatedProvider {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let anchor = Utc::now()
            .duration_trunc(ChronoDuration::minutes(1))
            .unwrap_or_else(|_| Utc::now());
        Self {
            rng: Mutex::new(rng),
            last_prices: Mutex::new(HashMap::new()),
            anchor,
        }
    }

    fn bar_count(window: &FetchWindow) -> usize {
        let minutes = window.interval_minutes().unwrap_or(24 * 60).max(1);
        let days = window.range_days().unwrap_or(1).max(1);
        if minutes >= 24 * 60 {
            return days as usize;
        }
        (days * SESSION_MINUTES / minutes).max(1) as usize
    }

    fn generate(&self, symbol: &str, window: &FetchWindow) -> RawHistory {
        let count = Self::bar_count(window);
        let step_secs = i64::from(window.interval_minutes().unwrap_or(24 * 60)) * 60;

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut prices = self
            .last_prices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut price = *prices
            .entry(symbol.to_string())
            .or_insert_with(|| rng.gen_range(10.0..80.0));

        let start = self.anchor.timestamp() - step_secs * count as i64;
        let mut history = RawHistory {
            timestamps: Vec::with_capacity(count),
            open: Some(Vec::with_capacity(count)),
            high: Some(Vec::with_capacity(count)),
            low: Some(Vec::with_capacity(count)),
            close: Some(Vec::with_capacity(count)),
            volume: Some(Vec::with_capacity(count)),
        };

        for idx in 0..count {
            let open = price;
            let shock: f64 = rng.sample(StandardNormal);
            price = (price * (1.0 + shock * VOLATILITY)).max(0.01);
            let wick = price * VOLATILITY * rng.gen_range(0.0..1.0);
            let close = if rng.gen_bool(GAP_PROBABILITY) {
                None
            } else {
                Some(price)
            };

            history.timestamps.push(start + step_secs * idx as i64);
            push(&mut history.open, Some(open));
            push(&mut history.high, Some(open.max(price) + wick));
            push(&mut history.low, Some((open.min(price) - wick).max(0.01)));
            push(&mut history.close, close);
            if let Some(volume) = history.volume.as_mut() {
                volume.push(Some(rng.gen_range(50_000..5_000_000)));
            }
        }

        prices.insert(symbol.to_string(), price);
        history
    }
}

fn push(column: &mut Option<Vec<Option<f64>>>, value: Option<f64>) {
    if let Some(values) = column.as_mut() {
        values.push(value);
    }
}

impl MarketDataProvider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        window: &FetchWindow,
    ) -> Result<RawHistory, ProviderError> {
        if symbol.trim().is_empty() {
            return Err(ProviderError::Unavailable(symbol.to_string()));
        }
        Ok(self.generate(symbol, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_count_follows_window() {
        assert_eq!(SimulatedProvider::bar_count(&FetchWindow::new("15m", "1d")), 28);
        assert_eq!(SimulatedProvider::bar_count(&FetchWindow::new("1h", "2d")), 14);
        assert_eq!(SimulatedProvider::bar_count(&FetchWindow::new("1d", "5d")), 5);
    }

    #[tokio::test]
    async fn seeded_walk_is_reproducible_and_positive() {
        let window = FetchWindow::new("15m", "1d");
        let a = SimulatedProvider::new(Some(7))
            .fetch_history("PETR4.SA", &window)
            .await
            .expect("history");
        let b = SimulatedProvider::new(Some(7))
            .fetch_history("PETR4.SA", &window)
            .await
            .expect("history");

        assert_eq!(a.close, b.close);
        assert_eq!(a.len(), 28);
        assert!(a
            .close
            .unwrap()
            .iter()
            .flatten()
            .all(|close| *close > 0.0));
        assert!(a.timestamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn walk_continues_between_calls() {
        let provider = SimulatedProvider::new(Some(11));
        let window = FetchWindow::new("1d", "5d");
        provider.fetch_history("VALE3.SA", &window).await.unwrap();
        let carried = *provider.last_prices.lock().unwrap().get("VALE3.SA").unwrap();

        let second = provider.fetch_history("VALE3.SA", &window).await.unwrap();
        assert_eq!(second.open.unwrap()[0], Some(carried));
    }
}
