use crate::domain::analysis::{DailyRecommendation, DailyReport, StockAnalysis};
use crate::domain::stock::Recommendation;
use anyhow::{bail, ensure};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Raw per-stock analysis exactly as the model emits it. The recommendation
/// arrives as free text and the confidence range is only a prompt-level
/// promise, so conversion re-checks everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmStockAnalysis {
    pub recommendation: String,
    pub reasoning: String,
    pub confidence_score: f64,
}

impl LlmStockAnalysis {
    pub fn validate_and_into_analysis(self) -> anyhow::Result<StockAnalysis> {
        let Some(recommendation) = Recommendation::parse(&self.recommendation) else {
            bail!("unknown recommendation value: {:?}", self.recommendation);
        };

        let reasoning = self.reasoning.trim().to_string();
        ensure!(!reasoning.is_empty(), "reasoning must be non-empty");

        ensure!(
            self.confidence_score.is_finite(),
            "confidence score must be a finite number (got {})",
            self.confidence_score
        );
        let confidence_score = self.confidence_score.clamp(0.0, 1.0);

        Ok(StockAnalysis {
            recommendation,
            reasoning,
            confidence_score,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmDailyReport {
    pub report_date: NaiveDate,
    pub recommendations: Vec<LlmDailyRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmDailyRecommendation {
    pub ticker: String,
    pub recommendation: String,
    pub reason: String,
}

impl LlmDailyReport {
    pub fn validate_and_into_report(
        self,
        expected_report_date: NaiveDate,
        universe: &[String],
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<DailyReport> {
        ensure!(
            self.report_date == expected_report_date,
            "LLM output reportDate mismatch: expected {expected_report_date}, got {}",
            self.report_date
        );

        ensure!(
            !self.recommendations.is_empty(),
            "LLM output must contain at least one recommendation"
        );

        let allowed: BTreeSet<&str> = universe.iter().map(|s| s.as_str()).collect();
        let mut seen_tickers = BTreeSet::<String>::new();
        let mut recommendations = Vec::with_capacity(self.recommendations.len());
        for entry in self.recommendations {
            recommendations.push(entry.validate_and_into_item(&allowed, &mut seen_tickers)?);
        }

        Ok(DailyReport {
            report_id: Uuid::new_v4(),
            report_date: self.report_date,
            generated_at,
            recommendations,
        })
    }
}

impl LlmDailyRecommendation {
    fn validate_and_into_item(
        self,
        allowed: &BTreeSet<&str>,
        seen_tickers: &mut BTreeSet<String>,
    ) -> anyhow::Result<DailyRecommendation> {
        let ticker = self.ticker.trim().to_string();
        ensure!(!ticker.is_empty(), "ticker must be non-empty");
        ensure!(
            allowed.contains(ticker.as_str()),
            "ticker not in the supplied universe: {ticker}"
        );
        ensure!(
            seen_tickers.insert(ticker.clone()),
            "duplicate ticker: {ticker}"
        );

        let Some(recommendation) = Recommendation::parse(&self.recommendation) else {
            bail!(
                "unknown recommendation value for {ticker}: {:?}",
                self.recommendation
            );
        };

        let reason = self.reason.trim().to_string();
        ensure!(!reason.is_empty(), "reason must be non-empty for {ticker}");

        Ok(DailyRecommendation {
            ticker,
            recommendation,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn universe() -> Vec<String> {
        vec!["RELIANCE.NS".to_string(), "TCS.NS".to_string()]
    }

    #[test]
    fn analysis_clamps_out_of_range_confidence() {
        let raw = LlmStockAnalysis {
            recommendation: "buy".to_string(),
            reasoning: "Positive headlines and a rising price.".to_string(),
            confidence_score: 1.4,
        };
        let analysis = raw.validate_and_into_analysis().unwrap();
        assert_eq!(analysis.recommendation, Recommendation::Buy);
        assert_eq!(analysis.confidence_score, 1.0);

        let raw = LlmStockAnalysis {
            recommendation: "sell".to_string(),
            reasoning: "Sustained selling pressure.".to_string(),
            confidence_score: -0.2,
        };
        assert_eq!(
            raw.validate_and_into_analysis().unwrap().confidence_score,
            0.0
        );
    }

    #[test]
    fn analysis_rejects_non_finite_confidence() {
        let raw = LlmStockAnalysis {
            recommendation: "hold".to_string(),
            reasoning: "Mixed signals.".to_string(),
            confidence_score: f64::NAN,
        };
        assert!(raw.validate_and_into_analysis().is_err());
    }

    #[test]
    fn analysis_rejects_unknown_recommendation_and_empty_reasoning() {
        let raw = LlmStockAnalysis {
            recommendation: "accumulate".to_string(),
            reasoning: "whatever".to_string(),
            confidence_score: 0.5,
        };
        assert!(raw.validate_and_into_analysis().is_err());

        let raw = LlmStockAnalysis {
            recommendation: "hold".to_string(),
            reasoning: "   ".to_string(),
            confidence_score: 0.5,
        };
        assert!(raw.validate_and_into_analysis().is_err());
    }

    #[test]
    fn report_accepts_valid_json() {
        let as_of = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        let generated_at = Utc.with_ymd_and_hms(2026, 8, 21, 16, 30, 0).unwrap();
        let raw: LlmDailyReport = serde_json::from_value(json!({
            "reportDate": "2026-08-21",
            "recommendations": [
                {"ticker": "RELIANCE.NS", "recommendation": "Buy", "reason": "Up on volume."},
                {"ticker": "TCS.NS", "recommendation": "hold", "reason": "Flat quotes."},
            ],
        }))
        .unwrap();

        let report = raw
            .validate_and_into_report(as_of, &universe(), generated_at)
            .unwrap();
        assert_eq!(report.report_date, as_of);
        assert_eq!(report.recommendations.len(), 2);
        assert_eq!(
            report.recommendations[1].recommendation,
            Recommendation::Hold
        );
    }

    #[test]
    fn report_rejects_wrong_date() {
        let generated_at = Utc.with_ymd_and_hms(2026, 8, 21, 16, 30, 0).unwrap();
        let raw = LlmDailyReport {
            report_date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
            recommendations: vec![LlmDailyRecommendation {
                ticker: "TCS.NS".to_string(),
                recommendation: "Hold".to_string(),
                reason: "Flat.".to_string(),
            }],
        };
        let expected = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        assert!(raw
            .validate_and_into_report(expected, &universe(), generated_at)
            .is_err());
    }

    #[test]
    fn report_rejects_foreign_and_duplicate_tickers() {
        let as_of = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        let generated_at = Utc.with_ymd_and_hms(2026, 8, 21, 16, 30, 0).unwrap();

        let foreign = LlmDailyReport {
            report_date: as_of,
            recommendations: vec![LlmDailyRecommendation {
                ticker: "AAPL".to_string(),
                recommendation: "Buy".to_string(),
                reason: "Not ours.".to_string(),
            }],
        };
        assert!(foreign
            .validate_and_into_report(as_of, &universe(), generated_at)
            .is_err());

        let duplicated = LlmDailyReport {
            report_date: as_of,
            recommendations: vec![
                LlmDailyRecommendation {
                    ticker: "TCS.NS".to_string(),
                    recommendation: "Buy".to_string(),
                    reason: "Twice.".to_string(),
                },
                LlmDailyRecommendation {
                    ticker: "TCS.NS".to_string(),
                    recommendation: "Sell".to_string(),
                    reason: "Twice.".to_string(),
                },
            ],
        };
        assert!(duplicated
            .validate_and_into_report(as_of, &universe(), generated_at)
            .is_err());
    }
}
