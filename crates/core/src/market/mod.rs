pub mod finnhub;
pub mod types;

use chrono::NaiveDate;
use std::fmt;
use types::{Candle, CompanyProfile, NewsArticle, Quote, SymbolMatch};

/// Upstream rejection with enough context for the caller to log and decide a
/// fallback without string-matching the message.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub endpoint: &'static str,
    pub status: u16,
    pub detail: String,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "market data error (endpoint={}, status={}): {}",
            self.endpoint, self.status, self.detail
        )
    }
}

impl std::error::Error for ProviderError {}

/// The one market-data capability the rest of the system sees. A concrete
/// backend is chosen at startup; callers never branch on the vendor.
///
/// Every call is at-most-once: no retries, no rate limiting. Callers decide
/// whether a failure degrades the view or fails the request.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Free-text symbol search.
    async fn search(&self, query: &str) -> anyhow::Result<Vec<SymbolMatch>>;

    /// Real-time quote for one symbol.
    async fn quote(&self, symbol: &str) -> anyhow::Result<Quote>;

    /// Company profile; unknown symbols yield an empty profile, not an error.
    async fn profile(&self, symbol: &str) -> anyhow::Result<CompanyProfile>;

    /// OHLC history between two Unix timestamps. An empty series means the
    /// vendor has no data for the range.
    async fn candles(
        &self,
        symbol: &str,
        resolution: &str,
        from: i64,
        to: i64,
    ) -> anyhow::Result<Vec<Candle>>;

    /// News mentioning one symbol within a date range.
    async fn company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<NewsArticle>>;

    /// General market news for a category, bounded to 50 items.
    async fn market_news(&self, category: &str) -> anyhow::Result<Vec<NewsArticle>>;
}
