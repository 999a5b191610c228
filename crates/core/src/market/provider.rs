use crate::config::Settings;
use crate::domain::market::{seed_market_items, MarketItem};
use crate::market::types::MarketOverviewResponse;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/market_overview";
const DEFAULT_RETRIES: u32 = 3;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_market(&self) -> Result<Vec<MarketItem>>;
}

/// Picks the HTTP provider when `MARKET_DATA_BASE_URL` is set, otherwise the
/// seed rows.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn MarketDataProvider>> {
    if settings.market_data_base_url.is_some() {
        return Ok(Arc::new(HttpJsonMarketData::from_settings(settings)?));
    }
    Ok(Arc::new(StaticMarketData::new(
        settings.market_refresh_delay()?,
    )))
}

/// Serves the seed market rows after a fixed delay.
#[derive(Debug, Clone)]
pub struct StaticMarketData {
    delay: Duration,
}

impl StaticMarketData {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for StaticMarketData {
    fn provider_name(&self) -> &'static str {
        "static_seed"
    }

    async fn fetch_market(&self) -> Result<Vec<MarketItem>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(seed_market_items())
    }
}

#[derive(Debug, Clone)]
pub struct HttpJsonMarketData {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonMarketData {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_market_data_base_url()?.to_string();
        let api_key = settings.market_data_api_key.clone();

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let path = std::env::var("MARKET_DATA_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self) -> Result<MarketOverviewResponse> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("market data response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {raw_json}");
        }

        serde_json::from_value::<MarketOverviewResponse>(raw_json)
            .context("failed to parse market data response into MarketOverviewResponse")
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpJsonMarketData {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_market(&self) -> Result<Vec<MarketItem>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(resp) => {
                    for item in &resp.items {
                        validate_item(item)?;
                    }
                    return Ok(resp.items);
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        error = %err,
                        "market data fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn validate_item(item: &MarketItem) -> Result<()> {
    anyhow::ensure!(!item.symbol.trim().is_empty(), "symbol must be non-empty");
    anyhow::ensure!(!item.name.trim().is_empty(), "name must be non-empty");
    anyhow::ensure!(
        item.price.is_finite() && item.price >= 0.0,
        "price must be a non-negative number (got {} for {})",
        item.price,
        item.symbol
    );
    anyhow::ensure!(item.change.is_finite(), "change must be finite for {}", item.symbol);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_expected_shape() {
        let v = json!({
            "as_of": "2026-01-27T09:00:00Z",
            "items": [
                {"symbol": "AAPL", "name": "Apple Inc.", "price": 178.72, "change": 1.45, "volume": "52.3M"}
            ]
        });

        let parsed: MarketOverviewResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].symbol, "AAPL");
        assert!(parsed.as_of.is_some());
    }

    #[test]
    fn rejects_non_numeric_price_via_deserialize() {
        let v = json!({
            "items": [
                {"symbol": "AAPL", "name": "Apple Inc.", "price": "178.72", "change": 1.45, "volume": "52.3M"}
            ]
        });
        assert!(serde_json::from_value::<MarketOverviewResponse>(v).is_err());
    }

    #[test]
    fn validate_item_rejects_blank_symbol() {
        let mut item = seed_market_items().remove(0);
        item.symbol = "  ".to_string();
        assert!(validate_item(&item).is_err());
    }

    #[tokio::test]
    async fn static_provider_serves_seed_rows() {
        let provider = StaticMarketData::new(Duration::ZERO);
        let rows = provider.fetch_market().await.unwrap();
        assert_eq!(rows, seed_market_items());
    }
}
