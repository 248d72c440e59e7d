use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One syndication entry as read off the wire, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub url: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
}

impl FeedEntry {
    /// `pubDate`/`published` win over `updated` when both are present.
    pub fn timestamp_text(&self) -> Option<&str> {
        self.published.as_deref().or(self.updated.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Published,
    Updated,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"pubDate" | b"published" => Some(Self::Published),
            b"updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// Pulls `item` (RSS 2.0) and `entry` (Atom) elements out of a feed
/// document. Shape-tolerant: namespace prefixes are ignored, CDATA titles
/// read as text, a feed with a single item parses the same as a list, and a
/// malformed tail keeps whatever parsed before it.
pub fn parse_feed(xml: &str) -> Vec<FeedEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if matches!(name, b"item" | b"entry") {
                    current = Some(FeedEntry::default());
                    field = None;
                } else if current.is_some() {
                    field = Field::from_name(name);
                    text.clear();
                    if field == Some(Field::Link) {
                        // Atom carries the target in href rather than text.
                        if let (Some(href), Some(entry)) = (href_attr(&e), current.as_mut()) {
                            entry.url.get_or_insert(href);
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if current.is_some() && e.local_name().as_ref() == b"link" {
                    if let (Some(href), Some(entry)) = (href_attr(&e), current.as_mut()) {
                        entry.url.get_or_insert(href);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if field.is_some() {
                    if let Ok(s) = t.unescape() {
                        text.push_str(&s);
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if matches!(name, b"item" | b"entry") {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    field = None;
                } else if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    if Field::from_name(name) == Some(f) {
                        let value = text.trim().to_string();
                        if !value.is_empty() {
                            match f {
                                Field::Title => {
                                    entry.title.get_or_insert(value);
                                }
                                Field::Link => {
                                    entry.url.get_or_insert(value);
                                }
                                Field::Published => {
                                    entry.published.get_or_insert(value);
                                }
                                Field::Updated => {
                                    entry.updated.get_or_insert(value);
                                }
                            }
                        }
                        field = None;
                        text.clear();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    entries
}

fn href_attr(e: &BytesStart<'_>) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"href" {
            return attr
                .unescape_value()
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
    }
    None
}

/// Feeds behind bot protection occasionally answer with an HTML error page
/// instead of XML.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().as_bytes();
    starts_with_ignore_case(head, b"<!doctype html") || starts_with_ignore_case(head, b"<html")
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// RFC 2822 (`Thu, 21 Aug 2026 10:30:00 +0530`, the RSS form) first, then
/// RFC 3339 (Atom). Anything else is unparsable and yields `None`.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
