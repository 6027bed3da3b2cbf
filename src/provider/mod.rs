mod simulated;
mod yahoo;

use std::future::Future;

use thiserror::Error;

use crate::model::{FetchWindow, RawHistory};

pub use simulated::SimulatedProvider;
pub use yahoo::{parse_chart, YahooConfig, YahooProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered with HTTP {0}")]
    Status(u16),
    #[error("provider error {code}: {description}")]
    Api { code: String, description: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no data for {0}")]
    Unavailable(String),
}

/// Source of recent OHLCV history for a symbol.
pub trait MarketDataProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn fetch_history(
        &self,
        symbol: &str,
        window: &FetchWindow,
    ) -> impl Future<Output = Result<RawHistory, ProviderError>> + Send;
}
