pub mod aggregate;
pub mod domain;
pub mod llm;
pub mod market;
pub mod news;
pub mod search;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub finnhub_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                finnhub_api_key: std::env::var("FINNHUB_API_KEY").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_finnhub_api_key(&self) -> anyhow::Result<&str> {
            self.finnhub_api_key
                .as_deref()
                .context("FINNHUB_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }

    /// Tickers shown on the dashboard when the caller does not supply its own
    /// list. Override via DASHBOARD_SYMBOLS="A.NS,B.NS,...".
    pub fn dashboard_symbols() -> Vec<String> {
        if let Ok(raw) = std::env::var("DASHBOARD_SYMBOLS") {
            let parsed: Vec<String> = raw
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect();
            if !parsed.is_empty() {
                return parsed;
            }
        }

        // Five NSE large caps.
        [
            "RELIANCE.NS",
            "TCS.NS",
            "HDFCBANK.NS",
            "INFY.NS",
            "ICICIBANK.NS",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}
