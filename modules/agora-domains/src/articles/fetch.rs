use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use agora_core::error::{IngestError, IngestResult};
use agora_core::fetch::{ArticleDraft, ArticleFetcher};
use agora_core::types::SourceType;

/// Feed entries older than this are dropped at parse time.
const MAX_AGE_DAYS: i64 = 30;
/// Summary length cap after cleanup.
const MAX_SUMMARY_CHARS: usize = 2000;

const USER_AGENT: &str = "agora-pipeline/0.1";

/// Production fetcher. Dispatches on the source type: RSS/Atom feeds go
/// through `feed-rs`, API sources expect an `{ "articles": [...] }` page.
pub struct FeedFetcher {
    http: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ArticleFetcher for FeedFetcher {
    async fn fetch(
        &self,
        url: &str,
        source_type: SourceType,
        max_items: usize,
    ) -> IngestResult<Vec<ArticleDraft>> {
        url::Url::parse(url)
            .map_err(|e| IngestError::Parse(format!("invalid source url {url}: {e}")))?;

        let response = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let drafts = if source_type.is_feed() {
            parse_feed(&bytes, max_items)?
        } else {
            parse_api_page(&bytes, max_items)?
        };

        debug!(url, items = drafts.len(), "source fetched");
        Ok(drafts)
    }
}

/// Map an RSS/Atom document to article drafts. Entries without a usable
/// link or title are skipped; stale entries are dropped; the result is
/// newest first, capped at `max_items`.
pub fn parse_feed(bytes: &[u8], max_items: usize) -> IngestResult<Vec<ArticleDraft>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| IngestError::Parse(format!("unparseable feed: {e}")))?;

    let cutoff = Utc::now() - chrono::Duration::days(MAX_AGE_DAYS);

    let mut drafts: Vec<ArticleDraft> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

            let title = clean_text(&entry.title.map(|t| t.content).unwrap_or_default());
            if title.is_empty() {
                return None;
            }

            let published_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc));
            if let Some(date) = published_at {
                if date < cutoff {
                    return None;
                }
            }

            let summary = truncate_chars(
                &clean_text(&entry.summary.map(|s| s.content).unwrap_or_default()),
                MAX_SUMMARY_CHARS,
            );

            let external_id = if entry.id.is_empty() {
                url.clone()
            } else {
                entry.id.clone()
            };

            Some(ArticleDraft {
                external_id,
                title,
                summary,
                url,
                published_at,
            })
        })
        .collect();

    drafts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    drafts.truncate(max_items);
    Ok(drafts)
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    articles: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    id: Option<String>,
    title: String,
    #[serde(default)]
    summary: String,
    url: String,
    published_at: Option<chrono::DateTime<Utc>>,
}

/// Map an `{ "articles": [...] }` JSON page to article drafts, with the
/// same staleness and cap rules as feeds.
pub fn parse_api_page(bytes: &[u8], max_items: usize) -> IngestResult<Vec<ArticleDraft>> {
    let page: ApiPage = serde_json::from_slice(bytes)
        .map_err(|e| IngestError::Parse(format!("unparseable API page: {e}")))?;

    let cutoff = Utc::now() - chrono::Duration::days(MAX_AGE_DAYS);

    let mut drafts: Vec<ArticleDraft> = page
        .articles
        .into_iter()
        .filter_map(|item| {
            let title = clean_text(&item.title);
            if title.is_empty() {
                return None;
            }
            if let Some(date) = item.published_at {
                if date < cutoff {
                    return None;
                }
            }
            Some(ArticleDraft {
                external_id: item.id.unwrap_or_else(|| item.url.clone()),
                title,
                summary: truncate_chars(&clean_text(&item.summary), MAX_SUMMARY_CHARS),
                url: item.url,
                published_at: item.published_at,
            })
        })
        .collect();

    drafts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    drafts.truncate(max_items);
    Ok(drafts)
}

/// Strip markup, decode the common entities, collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").expect("valid regex");
    let without_tags = tag_re.replace_all(raw, " ");

    // &amp; decodes last so "&amp;lt;" stays "&lt;".
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc2822(days_ago: i64) -> String {
        (Utc::now() - chrono::Duration::days(days_ago)).to_rfc2822()
    }

    fn rss_sample() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Wire</title>
    <item>
      <guid>wire-1001</guid>
      <title>Council approves transit &amp; housing plan</title>
      <link>https://wire.example.com/articles/1001</link>
      <description><![CDATA[<p>The city council voted <b>7-2</b> on Tuesday&nbsp;night.</p>]]></description>
      <pubDate>{}</pubDate>
    </item>
    <item>
      <guid>wire-0900</guid>
      <title>Old story from last year</title>
      <link>https://wire.example.com/articles/900</link>
      <pubDate>{}</pubDate>
    </item>
    <item>
      <guid>wire-1002</guid>
      <title>Budget hearing scheduled</title>
      <link>https://wire.example.com/articles/1002</link>
      <pubDate>{}</pubDate>
    </item>
  </channel>
</rss>"#,
            rfc2822(5),
            rfc2822(400),
            rfc2822(2),
        )
    }

    #[test]
    fn parses_feed_newest_first_and_drops_stale() {
        let drafts = parse_feed(rss_sample().as_bytes(), 50).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].external_id, "wire-1002");
        assert_eq!(drafts[1].external_id, "wire-1001");
        assert_eq!(drafts[1].title, "Council approves transit & housing plan");
        assert_eq!(
            drafts[1].summary,
            "The city council voted 7-2 on Tuesday night."
        );
    }

    #[test]
    fn caps_item_count() {
        let drafts = parse_feed(rss_sample().as_bytes(), 1).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].external_id, "wire-1002");
    }

    #[test]
    fn non_feed_body_is_a_parse_error() {
        let err = parse_feed(b"<html>502 Bad Gateway</html>", 50).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn parses_api_page() {
        let body = format!(
            r#"{{
            "articles": [
                {{"id": "a-1", "title": "Rate decision due", "summary": "Bank expected to hold.", "url": "https://api.example.com/a/1", "published_at": "{}"}},
                {{"title": "Untitled item", "url": "https://api.example.com/a/2"}},
                {{"id": "a-3", "title": "", "url": "https://api.example.com/a/3"}}
            ]
        }}"#,
            (Utc::now() - chrono::Duration::days(3)).to_rfc3339(),
        );
        let drafts = parse_api_page(body.as_bytes(), 50).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].external_id, "a-1");
        // Items without an id fall back to the URL.
        assert_eq!(drafts[1].external_id, "https://api.example.com/a/2");
    }

    #[test]
    fn api_page_parse_error() {
        let err = parse_api_page(b"not json", 50).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn clean_text_strips_and_decodes() {
        assert_eq!(
            clean_text("<p>Ways &amp; <em>means</em>&nbsp;&nbsp;committee</p>"),
            "Ways & means committee"
        );
        assert_eq!(clean_text("&amp;lt;"), "&lt;");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let text = "é".repeat(10);
        assert_eq!(truncate_chars(&text, 4).chars().count(), 4);
        assert_eq!(truncate_chars("short", 2000), "short");
    }
}
