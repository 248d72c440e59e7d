use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// One normalized news entry, whichever feed or provider endpoint it came
/// from. `sentiment` is always `Neutral` today; no sentiment model is wired
/// in, the field exists because the UI renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub url: String,
    pub sentiment: Sentiment,
    pub published_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_camel_case_with_iso_date() {
        let item = NewsItem {
            title: "Markets rally".to_string(),
            source: "Moneycontrol".to_string(),
            url: "https://example.com/a".to_string(),
            sentiment: Sentiment::Neutral,
            published_date: Some(Utc.with_ymd_and_hms(2026, 8, 21, 10, 30, 0).unwrap()),
        };

        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["sentiment"], "Neutral");
        assert_eq!(v["publishedDate"], "2026-08-21T10:30:00Z");
    }
}
