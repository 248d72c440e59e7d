pub mod anthropic;
pub mod error;
pub mod json;

use crate::domain::analysis::{DailyReport, StockAnalysis};
use serde::Serialize;

/// Everything the per-stock analysis prompt is allowed to see.
#[derive(Debug, Clone)]
pub struct AnalyzeInput {
    pub ticker: String,
    pub headlines: Vec<String>,
    pub figures: FinancialFigures,
}

impl AnalyzeInput {
    pub fn headlines_json(&self) -> serde_json::Value {
        serde_json::json!(self.headlines)
    }

    pub fn figures_json(&self) -> serde_json::Value {
        serde_json::json!(self.figures)
    }
}

/// Quote-derived numbers embedded verbatim in prompts and report payloads.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialFigures {
    pub current_price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone)]
pub struct ReportInput {
    pub report_date: chrono::NaiveDate,
    /// Tickers the report may cover; anything else in the output is rejected.
    pub universe: Vec<String>,
    pub stock_data: serde_json::Value,
}

#[derive(Debug, Clone, Copy)]
pub enum Provider {
    Anthropic,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn analyze_stock(&self, input: AnalyzeInput) -> anyhow::Result<StockAnalysis>;

    async fn generate_daily_report(&self, input: ReportInput) -> anyhow::Result<DailyReport>;
}
