use crate::domain::stock::{exchange_label, SearchResult};
use crate::market::types::SymbolMatch;
use crate::market::MarketDataProvider;

pub const MAX_RESULTS: usize = 10;

/// Symbol search over the market data provider. An empty or blank query makes
/// no external call; a provider failure degrades to an empty result list.
pub async fn search_stocks(provider: &dyn MarketDataProvider, query: &str) -> Vec<SearchResult> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    match provider.search(query).await {
        Ok(matches) => filter_and_rank(matches),
        Err(err) => {
            tracing::warn!(query, error = %err, "symbol search failed; returning no results");
            Vec::new()
        }
    }
}

/// Keeps the provider's ordering, drops non-equity instruments and rows
/// without a symbol, caps at [`MAX_RESULTS`].
fn filter_and_rank(matches: Vec<SymbolMatch>) -> Vec<SearchResult> {
    matches
        .into_iter()
        .filter(|m| !m.symbol.trim().is_empty())
        .filter(|m| is_equity_type(&m.instrument_type))
        .take(MAX_RESULTS)
        .map(|m| {
            let ticker = m.symbol.trim().to_string();
            let description = m.description.trim();
            let name = if description.is_empty() {
                ticker.clone()
            } else {
                description.to_string()
            };
            SearchResult {
                exchange: exchange_label(&ticker),
                ticker,
                name,
                reason: None,
            }
        })
        .collect()
}

// An empty type passes; Finnhub leaves it blank for some listings.
fn is_equity_type(instrument_type: &str) -> bool {
    let t = instrument_type.to_ascii_lowercase();
    !(t.contains("etf") || t.contains("etp") || t.contains("fund"))
}
