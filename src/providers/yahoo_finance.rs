use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::quote::{DescriptionProvider, Quote, QuoteBatch, QuoteProvider, Symbol};
use crate::providers::util::with_retry;

const RETRIES: usize = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Quotes and descriptions from the Yahoo Finance v8 chart API. One request
/// is made per symbol.
pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("stockboard/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    #[instrument(name = "YahooChartFetch", skip_all, fields(symbol = %symbol))]
    async fn fetch_chart(&self, symbol: &Symbol) -> Result<ChartMeta> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, symbol
        );
        debug!("Requesting quote from {}", url);

        let response = with_retry(|| self.client.get(&url).send(), RETRIES, RETRY_DELAY)
            .await
            .with_context(|| format!("Request error for symbol: {symbol}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        data.chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|item| item.meta)
            .ok_or_else(|| anyhow!("No quote data found for symbol: {}", symbol))
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_time: Option<i64>,
    short_name: Option<String>,
    long_name: Option<String>,
}

fn quote_from_meta(symbol: &Symbol, meta: ChartMeta) -> Quote {
    let price = meta.regular_market_price;
    let previous = meta
        .chart_previous_close
        .or(meta.previous_close)
        .filter(|p| *p != 0.0);
    let change = match (price, previous) {
        (Some(p), Some(prev)) => Some(p - prev),
        _ => None,
    };
    let percent = match (change, previous) {
        (Some(c), Some(prev)) => Some(c / prev * 100.0),
        _ => None,
    };
    let timestamp = meta
        .regular_market_time
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    Quote {
        symbol: symbol.clone(),
        name: meta.short_name.or(meta.long_name),
        price,
        change,
        percent,
        volume: meta.regular_market_volume,
        timestamp,
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<QuoteBatch> {
        let results = join_all(symbols.iter().map(|symbol| async move {
            (symbol, self.fetch_chart(symbol).await)
        }))
        .await;

        let mut quotes = HashMap::new();
        let mut last_error = None;
        for (symbol, result) in results {
            match result {
                Ok(meta) => {
                    quotes.insert(symbol.clone(), quote_from_meta(symbol, meta));
                }
                Err(e) => {
                    warn!("Skipping {symbol}: {e:#}");
                    last_error = Some(e);
                }
            }
        }

        if quotes.is_empty() {
            if let Some(e) = last_error {
                return Err(e.context("All quote requests failed"));
            }
        }

        Ok(QuoteBatch {
            quotes,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl DescriptionProvider for YahooFinanceProvider {
    async fn describe(&self, symbol: &Symbol) -> Result<String> {
        let meta = self.fetch_chart(symbol).await?;
        meta.long_name
            .or(meta.short_name)
            .ok_or_else(|| anyhow!("No description found for symbol: {}", symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_chart(server: &MockServer, symbol: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    const AAPL_RESPONSE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "regularMarketPrice": 110.0,
                    "chartPreviousClose": 100.0,
                    "regularMarketVolume": 52000000,
                    "regularMarketTime": 1700000000,
                    "shortName": "Apple Inc.",
                    "longName": "Apple Inc. Common Stock"
                }
            }]
        }
    }"#;

    #[tokio::test]
    async fn test_quote_mapped_from_chart_meta() {
        let server = MockServer::start().await;
        mount_chart(&server, "AAPL", 200, AAPL_RESPONSE).await;

        let provider = YahooFinanceProvider::new(&server.uri()).unwrap();
        let batch = provider.fetch_quotes(&[Symbol::from("AAPL")]).await.unwrap();
        let quote = &batch.quotes[&Symbol::from("AAPL")];

        assert_eq!(quote.price, Some(110.0));
        assert_eq!(quote.change, Some(10.0));
        assert!((quote.percent.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(quote.volume, Some(52_000_000.0));
        assert_eq!(quote.name.as_deref(), Some("Apple Inc."));
        assert_eq!(quote.timestamp.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_failed_symbol_is_dropped_from_batch() {
        let server = MockServer::start().await;
        mount_chart(&server, "AAPL", 200, AAPL_RESPONSE).await;
        mount_chart(&server, "NOPE", 404, "").await;

        let provider = YahooFinanceProvider::new(&server.uri()).unwrap();
        let batch = provider
            .fetch_quotes(&[Symbol::from("AAPL"), Symbol::from("NOPE")])
            .await
            .unwrap();
        assert_eq!(batch.quotes.len(), 1);
        assert!(batch.quotes.contains_key(&Symbol::from("AAPL")));
    }

    #[tokio::test]
    async fn test_all_symbols_failing_is_an_error() {
        let server = MockServer::start().await;
        mount_chart(&server, "AAPL", 500, "").await;

        let provider = YahooFinanceProvider::new(&server.uri()).unwrap();
        let result = provider.fetch_quotes(&[Symbol::from("AAPL")]).await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "All quote requests failed");
        assert_eq!(
            err.root_cause().to_string(),
            "HTTP error: 500 Internal Server Error for symbol: AAPL"
        );
    }

    #[tokio::test]
    async fn test_empty_result_and_malformed_response() {
        let server = MockServer::start().await;
        mount_chart(&server, "EMPTY", 200, r#"{"chart": {"result": []}}"#).await;
        mount_chart(&server, "BAD", 200, r#"{"charts": {}}"#).await;

        let provider = YahooFinanceProvider::new(&server.uri()).unwrap();
        let empty = provider.fetch_chart(&Symbol::from("EMPTY")).await.unwrap_err();
        assert_eq!(empty.to_string(), "No quote data found for symbol: EMPTY");

        let bad = provider.fetch_chart(&Symbol::from("BAD")).await.unwrap_err();
        assert!(bad.to_string().contains("Failed to parse JSON response for BAD"));
    }

    #[tokio::test]
    async fn test_missing_previous_close_leaves_change_undefined() {
        let server = MockServer::start().await;
        mount_chart(
            &server,
            "NEW",
            200,
            r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 5.0}}]}}"#,
        )
        .await;

        let provider = YahooFinanceProvider::new(&server.uri()).unwrap();
        let batch = provider.fetch_quotes(&[Symbol::from("NEW")]).await.unwrap();
        let quote = &batch.quotes[&Symbol::from("NEW")];
        assert_eq!(quote.price, Some(5.0));
        assert_eq!(quote.change, None);
        assert!(!quote.has_data());
    }

    #[tokio::test]
    async fn test_description_prefers_long_name() {
        let server = MockServer::start().await;
        mount_chart(&server, "AAPL", 200, AAPL_RESPONSE).await;

        let provider = YahooFinanceProvider::new(&server.uri()).unwrap();
        let description = provider.describe(&Symbol::from("AAPL")).await.unwrap();
        assert_eq!(description, "Apple Inc. Common Stock");
    }
}
