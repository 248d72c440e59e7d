pub mod feed;

use crate::domain::news::{NewsItem, Sentiment};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;

pub const NEWS_PER_PAGE: usize = 10;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

// Several Indian finance feeds reject requests without a browser UA.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

/// Fetches the configured RSS/Atom sources and serves the merged stream as
/// fixed-size pages. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct NewsFeed {
    http: reqwest::Client,
    sources: Vec<FeedSource>,
}

impl NewsFeed {
    pub fn from_env() -> Result<Self> {
        let timeout_secs = std::env::var("NEWS_FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build news feed http client")?;

        Ok(Self {
            http,
            sources: configured_sources(),
        })
    }

    /// One page of the merged stream, 1-based. Page 0 is treated as page 1;
    /// a page past the end is empty. A failing source degrades to an empty
    /// contribution, never an error.
    pub async fn page(&self, page: usize) -> Vec<NewsItem> {
        let fetches = self.sources.iter().map(|source| self.fetch_source(source));
        let lists = join_all(fetches).await;
        merge_and_page(lists, page)
    }

    async fn fetch_source(&self, source: &FeedSource) -> Vec<NewsItem> {
        match self.try_fetch_source(source).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(source = %source.name, error = %err, "news feed fetch failed; skipping source");
                Vec::new()
            }
        }
    }

    async fn try_fetch_source(&self, source: &FeedSource) -> Result<Vec<NewsItem>> {
        let res = self
            .http
            .get(&source.url)
            .send()
            .await
            .with_context(|| format!("feed request failed: {}", source.name))?;

        let status = res.status();
        anyhow::ensure!(
            status.is_success(),
            "feed {} answered HTTP {status}",
            source.name
        );

        let body = res
            .text()
            .await
            .with_context(|| format!("failed to read feed body: {}", source.name))?;

        if feed::looks_like_html(&body) {
            anyhow::bail!("feed {} returned an HTML page instead of XML", source.name);
        }

        Ok(normalize_entries(
            feed::parse_feed(&body),
            &source.name,
            Utc::now(),
        ))
    }
}

/// Applies the documented defaults: a missing title becomes "No title", a
/// missing date becomes `now`, and an entry without a usable URL is dropped.
/// A present-but-unparsable date stays `None` and sorts oldest.
pub fn normalize_entries(
    entries: Vec<feed::FeedEntry>,
    source: &str,
    now: DateTime<Utc>,
) -> Vec<NewsItem> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty() && *u != "#")?
                .to_string();

            let title = entry
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or("No title")
                .to_string();

            let published_date = match entry.timestamp_text() {
                Some(raw) => feed::parse_published(raw),
                None => Some(now),
            };

            Some(NewsItem {
                title,
                source: source.to_string(),
                url,
                sentiment: Sentiment::Neutral,
                published_date,
            })
        })
        .collect()
}

/// Sorts every source's items into one date-descending stream, drops
/// duplicate URLs (first seen after the sort wins, i.e. the newest copy),
/// then cuts the requested 1-based page.
pub fn merge_and_page(lists: Vec<Vec<NewsItem>>, page: usize) -> Vec<NewsItem> {
    let mut all: Vec<NewsItem> = lists.into_iter().flatten().collect();
    all.sort_by_key(|item| {
        std::cmp::Reverse(
            item.published_date
                .map(|d| d.timestamp_millis())
                .unwrap_or(0),
        )
    });

    let mut seen_urls = HashSet::new();
    let mut unique = Vec::with_capacity(all.len());
    for item in all {
        if seen_urls.insert(item.url.clone()) {
            unique.push(item);
        }
    }

    let page = page.max(1);
    let start = (page - 1) * NEWS_PER_PAGE;
    if start >= unique.len() {
        return Vec::new();
    }
    let end = (start + NEWS_PER_PAGE).min(unique.len());
    unique[start..end].to_vec()
}

/// `NEWS_FEEDS="Name=https://...,Other=https://..."` overrides the default
/// source pair.
fn configured_sources() -> Vec<FeedSource> {
    if let Ok(raw) = std::env::var("NEWS_FEEDS") {
        let parsed: Vec<FeedSource> = raw
            .split(',')
            .filter_map(|part| {
                let (name, url) = part.trim().split_once('=')?;
                let name = name.trim();
                let url = url.trim();
                if name.is_empty() || url.is_empty() {
                    return None;
                }
                Some(FeedSource {
                    name: name.to_string(),
                    url: url.to_string(),
                })
            })
            .collect();
        if !parsed.is_empty() {
            return parsed;
        }
    }

    vec![
        FeedSource {
            name: "Moneycontrol".to_string(),
            url: "https://www.moneycontrol.com/rss/latestnews.xml".to_string(),
        },
        FeedSource {
            name: "Economic Times".to_string(),
            url: "https://economictimes.indiatimes.com/markets/rssfeeds/1977021501.cms".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::feed::FeedEntry;
    use chrono::TimeZone;

    fn item(url: &str, title: &str, ts: Option<i64>) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            source: "Test".to_string(),
            url: url.to_string(),
            sentiment: Sentiment::Neutral,
            published_date: ts.and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        }
    }

    #[test]
    fn normalize_applies_defaults_and_drops_missing_urls() {
        let now = Utc.with_ymd_and_hms(2026, 8, 21, 12, 0, 0).unwrap();
        let entries = vec![
            FeedEntry {
                title: None,
                url: Some("https://example.com/a".to_string()),
                published: None,
                updated: None,
            },
            FeedEntry {
                title: Some("No link, dropped".to_string()),
                url: None,
                published: Some("Thu, 20 Aug 2026 15:45:00 +0530".to_string()),
                updated: None,
            },
            FeedEntry {
                title: Some("Sentinel link, dropped".to_string()),
                url: Some("#".to_string()),
                published: None,
                updated: None,
            },
        ];

        let items = normalize_entries(entries, "Test", now);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "No title");
        assert_eq!(items[0].published_date, Some(now));
        assert!(items.iter().all(|i| !i.title.is_empty() && i.url != "#"));
    }

    #[test]
    fn normalize_keeps_unparsable_dates_as_none() {
        let now = Utc.with_ymd_and_hms(2026, 8, 21, 12, 0, 0).unwrap();
        let entries = vec![FeedEntry {
            title: Some("Odd date".to_string()),
            url: Some("https://example.com/odd".to_string()),
            published: Some("around noon".to_string()),
            updated: None,
        }];

        let items = normalize_entries(entries, "Test", now);
        assert_eq!(items[0].published_date, None);
    }

    #[test]
    fn merge_sorts_descending_and_dedups_first_seen() {
        let lists = vec![
            vec![
                item("https://example.com/1", "older copy", Some(100)),
                item("https://example.com/2", "newest", Some(300)),
            ],
            vec![item("https://example.com/1", "newer copy", Some(200))],
        ];

        let out = merge_and_page(lists, 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://example.com/2");
        // The newer duplicate sorts first and therefore survives the dedup.
        assert_eq!(out[1].title, "newer copy");
    }

    #[test]
    fn unparsable_dates_sort_oldest() {
        let lists = vec![vec![
            item("https://example.com/undated", "undated", None),
            item("https://example.com/dated", "dated", Some(100)),
        ]];

        let out = merge_and_page(lists, 1);
        assert_eq!(out[0].url, "https://example.com/dated");
        assert_eq!(out[1].url, "https://example.com/undated");
    }

    #[test]
    fn pages_are_disjoint_contiguous_slices() {
        let items: Vec<NewsItem> = (0..25)
            .map(|i| {
                item(
                    &format!("https://example.com/{i}"),
                    &format!("item {i}"),
                    Some(1000 - i as i64),
                )
            })
            .collect();

        let page1 = merge_and_page(vec![items.clone()], 1);
        let page2 = merge_and_page(vec![items.clone()], 2);
        let page3 = merge_and_page(vec![items.clone()], 3);
        let page4 = merge_and_page(vec![items.clone()], 4);

        assert_eq!(page1.len(), 10);
        assert_eq!(page2.len(), 10);
        assert_eq!(page3.len(), 5);
        assert!(page4.is_empty());

        assert_eq!(page1[0].url, "https://example.com/0");
        assert_eq!(page2[0].url, "https://example.com/10");
        assert_eq!(page3[0].url, "https://example.com/20");

        let mut seen = HashSet::new();
        for i in page1.iter().chain(&page2).chain(&page3) {
            assert!(seen.insert(i.url.clone()));
        }
    }

    #[test]
    fn page_zero_behaves_as_page_one() {
        let items = vec![item("https://example.com/only", "only", Some(1))];
        let page_zero = merge_and_page(vec![items.clone()], 0);
        let page_one = merge_and_page(vec![items], 1);
        assert_eq!(page_zero, page_one);
        assert_eq!(page_one.len(), 1);
    }
}
