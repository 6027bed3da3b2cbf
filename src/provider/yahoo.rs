use std::time::Duration;

use serde::Deserialize;

use crate::constants::{REQUEST_TIMEOUT_SECS, YAHOO_BASE_URL, YAHOO_USER_AGENT};
use crate::model::{FetchWindow, RawHistory};

use super::{MarketDataProvider, ProviderError};

#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: YAHOO_BASE_URL.to_string(),
            user_agent: YAHOO_USER_AGENT.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Client for the Yahoo Finance v8 chart endpoint.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(config: YahooConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/v8/finance/chart/{symbol}", self.base_url)
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        window: &FetchWindow,
    ) -> Result<RawHistory, ProviderError> {
        let response = self
            .client
            .get(self.chart_url(symbol))
            .query(&[
                ("interval", window.interval.as_str()),
                ("range", window.range.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        match parse_chart(&body) {
            Ok(history) => Ok(history),
            // Yahoo reports unknown symbols as 404 with an error envelope.
            Err(err @ ProviderError::Api { .. }) => Err(err),
            Err(_) if !status.is_success() => Err(ProviderError::Status(status.as_u16())),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Option<Vec<Option<f64>>>,
    #[serde(default)]
    high: Option<Vec<Option<f64>>>,
    #[serde(default)]
    low: Option<Vec<Option<f64>>>,
    #[serde(default)]
    close: Option<Vec<Option<f64>>>,
    #[serde(default)]
    volume: Option<Vec<Option<u64>>>,
}

/// Decode a chart response body. A result without timestamps is an empty
/// history rather than an error.
pub fn parse_chart(body: &str) -> Result<RawHistory, ProviderError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|err| ProviderError::Malformed(err.to_string()))?;

    if let Some(error) = envelope.chart.error {
        return Err(ProviderError::Api {
            code: error.code,
            description: error.description,
        });
    }

    let Some(result) = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Err(ProviderError::Malformed("chart result is empty".into()));
    };

    let Some(timestamps) = result.timestamp else {
        return Ok(RawHistory::default());
    };

    let quote = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .unwrap_or_default();

    Ok(RawHistory {
        timestamps,
        open: quote.open,
        high: quote.high,
        low: quote.low,
        close: quote.close,
        volume: quote.volume,
    })
}
