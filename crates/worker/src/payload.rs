use predflux_core::aggregate;
use predflux_core::market::types::{CompanyProfile, NewsArticle, Quote};
use serde_json::json;

pub const MARKET_NEWS_HEADLINES: usize = 15;

/// One stock's slice of the report payload: the ticker, a display name and
/// the quote figures the model is asked to reason over.
pub fn quote_row(symbol: &str, quote: &Quote, profile: &CompanyProfile) -> serde_json::Value {
    let name = profile
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| symbol.split('.').next().unwrap_or(symbol));

    json!({
        "ticker": symbol,
        "name": name,
        "figures": aggregate::quote_figures(quote),
    })
}

/// Assembles the `stock_data` document sent to the model: the per-stock rows
/// plus up to [`MARKET_NEWS_HEADLINES`] general market headlines for context.
pub fn build_stock_data(
    rows: Vec<serde_json::Value>,
    articles: &[NewsArticle],
) -> serde_json::Value {
    let headlines: Vec<&str> = articles
        .iter()
        .map(|a| a.headline.trim())
        .filter(|h| !h.is_empty())
        .take(MARKET_NEWS_HEADLINES)
        .collect();

    json!({
        "stocks": rows,
        "marketHeadlines": headlines,
    })
}
