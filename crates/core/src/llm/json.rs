use crate::domain::analysis::{DailyReport, StockAnalysis};
use crate::domain::contract::{LlmDailyReport, LlmStockAnalysis};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_analysis(text: &str) -> anyhow::Result<StockAnalysis> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmStockAnalysis>(&json_str).with_context(|| {
        format!("LLM output is not valid JSON for the analysis schema: {json_str}")
    })?;
    parsed.validate_and_into_analysis()
}

pub fn parse_report(
    text: &str,
    expected_report_date: NaiveDate,
    universe: &[String],
    generated_at: DateTime<Utc>,
) -> anyhow::Result<DailyReport> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmDailyReport>(&json_str)
        .with_context(|| format!("LLM output is not valid JSON for the report schema: {json_str}"))?;
    parsed.validate_and_into_report(expected_report_date, universe, generated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::Recommendation;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_analysis_accepts_valid_json() {
        let text = json!({
            "recommendation": "buy",
            "reasoning": "Headlines point to strong demand and the price is up.",
            "confidenceScore": 0.8,
        })
        .to_string();

        let analysis = parse_analysis(&text).unwrap();
        assert_eq!(analysis.recommendation, Recommendation::Buy);
        assert_eq!(analysis.confidence_score, 0.8);
    }

    #[test]
    fn parse_analysis_survives_surrounding_prose() {
        let text = "Here is the analysis you asked for:\n{\"recommendation\": \"hold\", \"reasoning\": \"Mixed signals.\", \"confidenceScore\": 0.4}\nLet me know if you need more.";
        let analysis = parse_analysis(text).unwrap();
        assert_eq!(analysis.recommendation, Recommendation::Hold);
    }

    #[test]
    fn parse_report_accepts_valid_json() {
        let report_date = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        let generated_at = Utc.with_ymd_and_hms(2026, 8, 21, 16, 30, 0).unwrap();
        let universe = vec!["RELIANCE.NS".to_string(), "TCS.NS".to_string()];
        let text = json!({
            "reportDate": "2026-08-21",
            "recommendations": [
                {"ticker": "RELIANCE.NS", "recommendation": "Buy", "reason": "Up on volume."},
            ],
        })
        .to_string();

        let report = parse_report(&text, report_date, &universe, generated_at).unwrap();
        assert_eq!(report.report_date, report_date);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn parse_report_rejects_wrong_report_date() {
        let report_date = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        let generated_at = Utc.with_ymd_and_hms(2026, 8, 21, 16, 30, 0).unwrap();
        let universe = vec!["TCS.NS".to_string()];
        let text = json!({
            "reportDate": "2026-08-20",
            "recommendations": [
                {"ticker": "TCS.NS", "recommendation": "Hold", "reason": "Flat."},
            ],
        })
        .to_string();

        assert!(parse_report(&text, report_date, &universe, generated_at).is_err());
    }
}
