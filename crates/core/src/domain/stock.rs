use crate::domain::analysis::StockAnalysis;
use crate::domain::news::NewsItem;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl Recommendation {
    /// Case-insensitive parse; the analysis model emits lowercase
    /// (`"buy"`) while the report model capitalizes (`"Buy"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            "hold" => Some(Self::Hold),
            _ => None,
        }
    }

    /// Dashboard heuristic: strictly above +0.5% is a buy, strictly below
    /// -0.5% a sell, everything in between (both boundaries included) a hold.
    pub fn from_percent_change(percent_change: f64) -> Self {
        if percent_change > 0.5 {
            Self::Buy
        } else if percent_change < -0.5 {
            Self::Sell
        } else {
            Self::Hold
        }
    }

    /// One-line explanation shown next to a heuristic recommendation.
    pub fn heuristic_reason(self) -> &'static str {
        match self {
            Self::Buy => "Strong upward momentum.",
            Self::Sell => "Significant downward trend.",
            Self::Hold => "Stable, holding pattern.",
        }
    }
}

/// One dashboard/watchlist row. The percent/absolute change signs are taken
/// from the provider as-is; their consistency is advisory, not enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub ticker: String,
    pub name: String,
    pub exchange: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub recommendation: Recommendation,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// The full stock-page record. `recommendation`/`reason` on the embedded
/// `Stock` mirror the AI analysis here; the dashboard heuristic never feeds
/// this view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDetails {
    #[serde(flatten)]
    pub stock: Stock,
    pub price_history: Vec<PricePoint>,
    pub news: Vec<NewsItem>,
    pub analysis: StockAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub ticker: String,
    pub name: String,
    pub exchange: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Venue label derived from the ticker's exchange suffix. The symbol-search
/// response carries no venue field, so the suffix is the only signal.
pub fn exchange_label(ticker: &str) -> String {
    match ticker.rsplit_once('.') {
        Some((_, "NS")) => "NSE".to_string(),
        Some((_, "BO")) => "BSE".to_string(),
        Some((_, suffix)) if !suffix.is_empty() => suffix.to_string(),
        _ => "US".to_string(),
    }
}
