use crate::config::Settings;
use crate::market::types::{
    Candle, CandleResponse, CompanyProfile, NewsArticle, Quote, SymbolMatch, SymbolSearchResponse,
};
use crate::market::{MarketDataProvider, ProviderError};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const MARKET_NEWS_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct FinnhubClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FinnhubClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_finnhub_api_key()?.to_string();
        let base_url =
            std::env::var("FINNHUB_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("FINNHUB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(params.len() + 1);
        query.push(("token", self.api_key.clone()));
        query.extend_from_slice(params);

        let res = self
            .http
            .get(self.url(endpoint))
            .query(&query)
            .send()
            .await
            .with_context(|| format!("finnhub {endpoint} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read finnhub {endpoint} response"))?;

        if !status.is_success() {
            return Err(ProviderError {
                endpoint,
                status: status.as_u16(),
                detail: error_detail(&text),
            }
            .into());
        }

        serde_json::from_str::<T>(&text).with_context(|| {
            format!("finnhub {endpoint} response is not the expected JSON shape: {text}")
        })
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for FinnhubClient {
    fn provider_name(&self) -> &'static str {
        "finnhub"
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>> {
        let res: SymbolSearchResponse = self.get_json("search", &[("q", query.to_string())]).await?;
        Ok(res.result)
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.get_json("quote", &[("symbol", symbol.to_string())])
            .await
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile> {
        self.get_json("stock/profile2", &[("symbol", symbol.to_string())])
            .await
    }

    async fn candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Candle>> {
        let res: CandleResponse = self
            .get_json(
                "stock/candle",
                &[
                    ("symbol", symbol.to_string()),
                    ("resolution", resolution.to_string()),
                    ("from", from.to_string()),
                    ("to", to.to_string()),
                ],
            )
            .await?;
        Ok(res.into_candles())
    }

    async fn company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>> {
        self.get_json(
            "company-news",
            &[
                ("symbol", symbol.to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
            ],
        )
        .await
    }

    async fn market_news(&self, category: &str) -> Result<Vec<NewsArticle>> {
        let mut articles: Vec<NewsArticle> = self
            .get_json("news", &[("category", category.to_string())])
            .await?;
        articles.truncate(MARKET_NEWS_LIMIT);
        Ok(articles)
    }
}

/// Error bodies are usually `{"error": "..."}`; anything else is passed
/// through verbatim.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
