use crate::domain::analysis::StockAnalysis;
use crate::domain::news::{NewsItem, Sentiment};
use crate::domain::stock::{
    exchange_label, PricePoint, Recommendation, SearchResult, Stock, StockDetails,
};
use crate::llm::{AnalyzeInput, FinancialFigures, LlmClient};
use crate::market::types::{Candle, CompanyProfile, NewsArticle, Quote};
use crate::market::MarketDataProvider;
use crate::search;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;

pub const DETAIL_NEWS_LIMIT: usize = 5;
pub const PRICE_HISTORY_DAYS: i64 = 30;

/// Read-side facade over the provider and the (optional) LLM. Everything is
/// assembled per call; the service holds nothing but the two clients.
#[derive(Clone)]
pub struct StockService {
    provider: Arc<dyn MarketDataProvider>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl StockService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { provider, llm }
    }

    /// The full stock page. `None` means "stock not found"; degraded upstream
    /// data (candles, news, analysis) never turns into `None`, it shrinks the
    /// corresponding field instead.
    pub async fn stock_details(&self, ticker: &str) -> Option<StockDetails> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return None;
        }

        let now = Utc::now();
        let from = now - Duration::days(PRICE_HISTORY_DAYS);

        let (quote, profile, candles, articles) = tokio::join!(
            self.provider.quote(&ticker),
            self.provider.profile(&ticker),
            self.provider
                .candles(&ticker, "D", from.timestamp(), now.timestamp()),
            self.provider
                .company_news(&ticker, from.date_naive(), now.date_naive()),
        );

        let quote = match quote {
            Ok(q) => q,
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "quote fetch failed; treating stock as not found");
                return None;
            }
        };
        let profile = match profile {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "profile fetch failed; treating stock as not found");
                return None;
            }
        };
        // Finnhub answers unknown symbols with an empty profile object.
        profile.known_ticker()?;

        let price_history = match candles {
            Ok(candles) => price_history(candles),
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "candle fetch failed; serving empty price history");
                Vec::new()
            }
        };

        let news = match articles {
            Ok(articles) => company_news_items(articles, DETAIL_NEWS_LIMIT),
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "company news fetch failed; serving no news");
                Vec::new()
            }
        };

        let analysis = self.analyze(&ticker, &quote, &news).await;

        let name = non_empty(profile.name.as_deref()).unwrap_or_else(|| default_name(&ticker));
        let exchange =
            non_empty(profile.exchange.as_deref()).unwrap_or_else(|| exchange_label(&ticker));

        Some(StockDetails {
            stock: Stock {
                ticker: ticker.clone(),
                name,
                exchange,
                price: quote.current.unwrap_or(0.0),
                change: quote.change.unwrap_or(0.0),
                change_percent: quote.percent_change.unwrap_or(0.0),
                recommendation: analysis.recommendation,
                reason: analysis.reasoning.clone(),
            },
            price_history,
            news,
            analysis,
        })
    }

    /// Dashboard rows for the given symbols, fetched in parallel. A symbol
    /// missing its price, percent change or profile contributes no row.
    pub async fn dashboard_stocks(&self, symbols: &[String]) -> Vec<Stock> {
        let fetches = symbols.iter().map(|symbol| async move {
            let (quote, profile) =
                tokio::join!(self.provider.quote(symbol), self.provider.profile(symbol));
            match (quote, profile) {
                (Ok(quote), Ok(profile)) => dashboard_row(&quote, &profile),
                (Err(err), _) | (_, Err(err)) => {
                    tracing::warn!(%symbol, error = %err, "dashboard fetch failed; dropping row");
                    None
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        search::search_stocks(self.provider.as_ref(), query).await
    }

    async fn analyze(&self, ticker: &str, quote: &Quote, news: &[NewsItem]) -> StockAnalysis {
        let Some(llm) = &self.llm else {
            return StockAnalysis::unavailable();
        };

        match llm.analyze_stock(analyze_input(ticker, quote, news)).await {
            Ok(analysis) => analysis,
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "stock analysis failed; serving the placeholder");
                StockAnalysis::unavailable()
            }
        }
    }
}

/// Heuristic dashboard row. The AI never runs on the list path, so the
/// recommendation and reason here always come from the percent change.
pub fn dashboard_row(quote: &Quote, profile: &CompanyProfile) -> Option<Stock> {
    let price = quote.current?;
    let percent_change = quote.percent_change?;
    let ticker = profile.known_ticker()?.to_string();

    let recommendation = Recommendation::from_percent_change(percent_change);
    let name = non_empty(profile.name.as_deref()).unwrap_or_else(|| default_name(&ticker));
    let exchange = non_empty(profile.exchange.as_deref()).unwrap_or_else(|| exchange_label(&ticker));

    Some(Stock {
        ticker,
        name,
        exchange,
        price,
        change: quote.change.unwrap_or(0.0),
        change_percent: percent_change,
        recommendation,
        reason: recommendation.heuristic_reason().to_string(),
    })
}

pub fn analyze_input(ticker: &str, quote: &Quote, news: &[NewsItem]) -> AnalyzeInput {
    AnalyzeInput {
        ticker: ticker.to_string(),
        headlines: news.iter().map(|n| n.title.clone()).collect(),
        figures: quote_figures(quote),
    }
}

pub fn quote_figures(quote: &Quote) -> FinancialFigures {
    FinancialFigures {
        current_price: quote.current.unwrap_or(0.0),
        previous_close: quote.previous_close.unwrap_or(0.0),
        change: quote.change.unwrap_or(0.0),
        percent_change: quote.percent_change.unwrap_or(0.0),
    }
}

/// Close price per day, ascending. Candles whose timestamp does not map to a
/// date are dropped.
pub fn price_history(candles: Vec<Candle>) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = candles
        .into_iter()
        .filter_map(|c| {
            let date = DateTime::from_timestamp(c.timestamp, 0)?.date_naive();
            Some(PricePoint {
                date,
                price: c.close,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

pub fn company_news_items(articles: Vec<NewsArticle>, limit: usize) -> Vec<NewsItem> {
    articles
        .into_iter()
        .filter(|a| !a.url.trim().is_empty())
        .take(limit)
        .map(|a| {
            let headline = a.headline.trim();
            NewsItem {
                title: if headline.is_empty() {
                    "No title".to_string()
                } else {
                    headline.to_string()
                },
                source: a.source.trim().to_string(),
                url: a.url.trim().to_string(),
                sentiment: Sentiment::Neutral,
                published_date: a.datetime.and_then(|secs| DateTime::from_timestamp(secs, 0)),
            }
        })
        .collect()
}

// "RELIANCE.NS" reads fine as "RELIANCE" when the profile has no name.
fn default_name(ticker: &str) -> String {
    ticker.split('.').next().unwrap_or(ticker).to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::DailyReport;
    use crate::llm::{Provider, ReportInput};
    use crate::market::types::SymbolMatch;
    use anyhow::bail;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubProvider {
        quotes: HashMap<String, Quote>,
        profiles: HashMap<String, CompanyProfile>,
        candles: Vec<Candle>,
        articles: Vec<NewsArticle>,
        fail_candles: bool,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for StubProvider {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn search(&self, _query: &str) -> anyhow::Result<Vec<SymbolMatch>> {
            bail!("not used")
        }

        async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
            match self.quotes.get(symbol) {
                Some(q) => Ok(q.clone()),
                None => bail!("quote unavailable for {symbol}"),
            }
        }

        async fn profile(&self, symbol: &str) -> anyhow::Result<CompanyProfile> {
            // Unknown symbols answer with an empty object, not an error.
            Ok(self.profiles.get(symbol).cloned().unwrap_or_else(|| {
                serde_json::from_value(json!({})).unwrap()
            }))
        }

        async fn candles(
            &self,
            _symbol: &str,
            _resolution: &str,
            _from: i64,
            _to: i64,
        ) -> anyhow::Result<Vec<Candle>> {
            if self.fail_candles {
                bail!("candle endpoint down");
            }
            Ok(self.candles.clone())
        }

        async fn company_news(
            &self,
            _symbol: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> anyhow::Result<Vec<NewsArticle>> {
            Ok(self.articles.clone())
        }

        async fn market_news(&self, _category: &str) -> anyhow::Result<Vec<NewsArticle>> {
            Ok(Vec::new())
        }
    }

    struct StubLlm {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LlmClient for StubLlm {
        fn provider(&self) -> Provider {
            Provider::Anthropic
        }

        async fn analyze_stock(&self, input: AnalyzeInput) -> anyhow::Result<StockAnalysis> {
            if self.fail {
                bail!("model down");
            }
            Ok(StockAnalysis {
                recommendation: Recommendation::Buy,
                reasoning: format!("{} looks strong on the supplied headlines.", input.ticker),
                confidence_score: 0.9,
            })
        }

        async fn generate_daily_report(&self, _input: ReportInput) -> anyhow::Result<DailyReport> {
            bail!("not used")
        }
    }

    fn quote(c: f64, dp: Option<f64>) -> Quote {
        serde_json::from_value(json!({
            "c": c,
            "d": dp.map(|v| v * c / 100.0),
            "dp": dp,
            "pc": c - 1.0,
            "t": 1_755_700_000,
        }))
        .unwrap()
    }

    fn profile(ticker: &str, name: &str) -> CompanyProfile {
        serde_json::from_value(json!({
            "ticker": ticker,
            "name": name,
            "exchange": "NSE",
            "currency": "INR",
        }))
        .unwrap()
    }

    fn article(headline: &str, url: &str) -> NewsArticle {
        serde_json::from_value(json!({
            "headline": headline,
            "url": url,
            "source": "Wire",
            "datetime": 1_755_600_000,
            "summary": "",
        }))
        .unwrap()
    }

    fn day(ts: i64, close: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: close - 2.0,
            high: close + 1.0,
            low: close - 3.0,
            close,
        }
    }

    fn provider_with_tcs() -> StubProvider {
        let mut provider = StubProvider::default();
        provider
            .quotes
            .insert("TCS.NS".to_string(), quote(3800.0, Some(0.65)));
        provider.profiles.insert(
            "TCS.NS".to_string(),
            profile("TCS.NS", "Tata Consultancy Services"),
        );
        // Deliberately out of order; the history must come back ascending.
        provider.candles = vec![
            day(1_755_600_000, 3810.0),
            day(1_755_427_200, 3790.0),
            day(1_755_513_600, 3802.0),
        ];
        provider.articles = (0..7)
            .map(|i| article(&format!("Headline {i}"), &format!("https://n.example/{i}")))
            .collect();
        provider
    }

    #[tokio::test]
    async fn detail_joins_all_four_sources() {
        let service = StockService::new(Arc::new(provider_with_tcs()), None);

        let details = service.stock_details("tcs.ns").await.unwrap();
        assert_eq!(details.stock.ticker, "TCS.NS");
        assert_eq!(details.stock.name, "Tata Consultancy Services");
        assert_eq!(details.stock.price, 3800.0);
        assert_eq!(details.price_history.len(), 3);
        assert!(details
            .price_history
            .windows(2)
            .all(|w| w[0].date < w[1].date));
        assert_eq!(details.news.len(), DETAIL_NEWS_LIMIT);

        // No LLM wired in: the placeholder analysis feeds the embedded stock.
        assert_eq!(details.analysis.recommendation, Recommendation::Hold);
        assert_eq!(details.stock.recommendation, Recommendation::Hold);
        assert_eq!(details.stock.reason, details.analysis.reasoning);
    }

    #[tokio::test]
    async fn unknown_ticker_resolves_to_none() {
        let mut provider = StubProvider::default();
        provider
            .quotes
            .insert("ZZZZINVALID".to_string(), quote(0.0, None));

        let service = StockService::new(Arc::new(provider), None);
        assert!(service.stock_details("ZZZZINVALID").await.is_none());
    }

    #[tokio::test]
    async fn failed_candles_degrade_to_empty_history() {
        let mut provider = provider_with_tcs();
        provider.fail_candles = true;

        let service = StockService::new(Arc::new(provider), None);
        let details = service.stock_details("TCS.NS").await.unwrap();
        assert!(details.price_history.is_empty());
        assert_eq!(details.news.len(), DETAIL_NEWS_LIMIT);
    }

    #[tokio::test]
    async fn analysis_feeds_detail_and_falls_back_on_failure() {
        let llm: Arc<dyn LlmClient> = Arc::new(StubLlm { fail: false });
        let service = StockService::new(Arc::new(provider_with_tcs()), Some(llm));
        let details = service.stock_details("TCS.NS").await.unwrap();
        assert_eq!(details.stock.recommendation, Recommendation::Buy);
        assert!(details.stock.reason.contains("TCS.NS"));
        assert_eq!(details.analysis.confidence_score, 0.9);

        let llm: Arc<dyn LlmClient> = Arc::new(StubLlm { fail: true });
        let service = StockService::new(Arc::new(provider_with_tcs()), Some(llm));
        let details = service.stock_details("TCS.NS").await.unwrap();
        assert_eq!(details.analysis, StockAnalysis::unavailable());
    }

    #[tokio::test]
    async fn dashboard_skips_partial_rows() {
        let mut provider = provider_with_tcs();
        // Quote without a percent change, as Finnhub serves unknown symbols.
        provider
            .quotes
            .insert("NOPE.NS".to_string(), quote(10.0, None));
        provider
            .profiles
            .insert("NOPE.NS".to_string(), profile("NOPE.NS", "Nope Ltd"));

        let service = StockService::new(Arc::new(provider), None);
        let symbols = vec!["TCS.NS".to_string(), "NOPE.NS".to_string()];
        let rows = service.dashboard_stocks(&symbols).await;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker, "TCS.NS");
        assert_eq!(rows[0].recommendation, Recommendation::Buy);
        assert_eq!(rows[0].reason, "Strong upward momentum.");
    }
}
