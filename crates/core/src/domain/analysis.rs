use crate::domain::stock::Recommendation;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The model's verdict for a single stock. `confidence_score` is always in
/// `[0, 1]` once it has passed the contract validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAnalysis {
    pub recommendation: Recommendation,
    pub reasoning: String,
    pub confidence_score: f64,
}

impl StockAnalysis {
    /// Neutral placeholder served when the model call fails or returns an
    /// unusable result. The surrounding view must still render.
    pub fn unavailable() -> Self {
        Self {
            recommendation: Recommendation::Hold,
            reasoning: "AI analysis is currently unavailable for this stock.".to_string(),
            confidence_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub report_id: Uuid,
    pub report_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<DailyRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecommendation {
    pub ticker: String,
    pub recommendation: Recommendation,
    pub reason: String,
}
