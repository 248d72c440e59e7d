use serde::{Deserialize, Serialize};

/// Real-time quote as the vendor's `/quote` returns it. `change` and
/// `percent_change` come back null for symbols the vendor does not know;
/// `current` and `previous_close` are 0 in that case rather than null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    #[serde(rename = "c")]
    pub current: Option<f64>,
    #[serde(rename = "d")]
    pub change: Option<f64>,
    #[serde(rename = "dp")]
    pub percent_change: Option<f64>,
    #[serde(rename = "pc")]
    pub previous_close: Option<f64>,
    #[serde(rename = "t")]
    pub timestamp: Option<i64>,
}

/// `/stock/profile2` body. The vendor returns `{}` for unknown tickers, so
/// every field is optional and an absent or empty `ticker` is the not-found
/// signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

impl CompanyProfile {
    pub fn known_ticker(&self) -> Option<&str> {
        self.ticker
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// `/stock/candle` body: parallel arrays plus a status flag. Any status other
/// than `"ok"` (usually `"no_data"`) comes without the arrays.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleResponse {
    #[serde(rename = "s")]
    pub status: String,
    #[serde(rename = "t", default)]
    pub timestamps: Vec<i64>,
    #[serde(rename = "o", default)]
    pub opens: Vec<f64>,
    #[serde(rename = "h", default)]
    pub highs: Vec<f64>,
    #[serde(rename = "l", default)]
    pub lows: Vec<f64>,
    #[serde(rename = "c", default)]
    pub closes: Vec<f64>,
}

impl CandleResponse {
    /// Zips the parallel arrays into rows, truncating at the shortest series.
    pub fn into_candles(self) -> Vec<Candle> {
        if self.status != "ok" {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(self.timestamps.len());
        for (i, &timestamp) in self.timestamps.iter().enumerate() {
            let (Some(&open), Some(&high), Some(&low), Some(&close)) = (
                self.opens.get(i),
                self.highs.get(i),
                self.lows.get(i),
                self.closes.get(i),
            ) else {
                break;
            };
            out.push(Candle {
                timestamp,
                open,
                high,
                low,
                close,
            });
        }
        out
    }
}

/// One `/search` row. `type` ("Common Stock", "ETP", ...) drives the equity
/// filter; `displaySymbol` can differ from `symbol` on some venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMatch {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "displaySymbol", default)]
    pub display_symbol: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "type", default)]
    pub instrument_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolSearchResponse {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub result: Vec<SymbolMatch>,
}

/// Company news and general market news share one row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(default)]
    pub datetime: Option<i64>,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub summary: String,
}
