//! RSS 2.0 / Atom parsing and HTTP retrieval of podcast feeds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{sort_episodes, Episode};

const UNTITLED: &str = "(untitled)";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed is not valid XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document is neither an RSS channel nor an Atom feed")]
    NoChannel,
}

/// A parsed feed: display title plus playable episodes in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub title: String,
    pub episodes: Vec<Episode>,
}

/// Source of feeds. The TUI only sees this trait so tests can serve canned XML.
pub trait FeedSource: Send + Sync {
    fn fetch<'a>(&'a self, feed_url: &'a str) -> BoxFuture<'a, anyhow::Result<Feed>>;
}

pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_feed(&self, feed_url: &str) -> Result<Feed, FeedError> {
        info!("feed: fetching {}", feed_url);
        let body = self
            .client
            .get(feed_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let feed = parse_feed(&body, feed_url)?;
        debug!(
            "feed: '{}' has {} playable episodes",
            feed.title,
            feed.episodes.len()
        );
        Ok(feed)
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch<'a>(&'a self, feed_url: &'a str) -> BoxFuture<'a, anyhow::Result<Feed>> {
        Box::pin(async move { Ok(self.fetch_feed(feed_url).await?) })
    }
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    id: Option<String>,
    published: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    audio_url: Option<String>,
}

impl ItemBuilder {
    fn finish(self, feed_title: &str) -> Option<Episode> {
        let audio_url = self.audio_url.filter(|u| !u.trim().is_empty())?;
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        let id = self.id.filter(|i| !i.is_empty()).or_else(|| Some(audio_url.clone()));
        Some(Episode {
            feed_title: feed_title.to_string(),
            title,
            published_at: self.published.or(self.updated),
            audio_url,
            id,
        })
    }

    /// `<enclosure url>` (RSS) or `<link rel="enclosure" href>` (Atom).
    fn take_enclosure(&mut self, name: &str, e: &BytesStart<'_>) -> Result<(), quick_xml::Error> {
        if self.audio_url.is_some() {
            return Ok(());
        }
        match name {
            "enclosure" => self.audio_url = attr(e, "url")?,
            "link" if attr(e, "rel")?.as_deref() == Some("enclosure") => {
                self.audio_url = attr(e, "href")?
            }
            _ => {}
        }
        Ok(())
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, quick_xml::Error> {
    for a in e.attributes().flatten() {
        if a.key.local_name().as_ref() == key.as_bytes() {
            return Ok(Some(a.unescape_value()?.trim().to_string()));
        }
    }
    Ok(None)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned()
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

/// Parse an RSS 2.0 or Atom document. Items without an enclosure are skipped.
pub fn parse_feed(xml: &str, feed_url: &str) -> Result<Feed, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;
    let mut feed_title: Option<String> = None;
    let mut current: Option<ItemBuilder> = None;
    let mut items: Vec<ItemBuilder> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "channel" | "feed" => saw_root = true,
                    "item" | "entry" => current = Some(ItemBuilder::default()),
                    _ => {
                        if let Some(item) = current.as_mut() {
                            item.take_enclosure(&name, &e)?;
                        }
                    }
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                if let Some(item) = current.as_mut() {
                    item.take_enclosure(&local_name(&e), &e)?;
                }
            }
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                let parent = stack.last().map(String::as_str).unwrap_or_default();
                let value = text.trim().to_string();
                text.clear();

                if name == "item" || name == "entry" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                    continue;
                }

                match current.as_mut() {
                    Some(item) if parent == "item" || parent == "entry" => match name.as_str() {
                        "title" => item.title = Some(value),
                        "guid" | "id" => item.id = Some(value),
                        "pubDate" | "published" => item.published = parse_date(&value),
                        "updated" => item.updated = parse_date(&value),
                        _ => {}
                    },
                    None if name == "title"
                        && (parent == "channel" || parent == "feed")
                        && feed_title.is_none() =>
                    {
                        feed_title = Some(value);
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FeedError::NoChannel);
    }

    let title = feed_title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| feed_url.to_string());
    let mut episodes: Vec<Episode> = items
        .into_iter()
        .filter_map(|item| item.finish(&title))
        .collect();
    sort_episodes(&mut episodes);

    Ok(Feed { title, episodes })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Night &amp; Day</title>
    <image><title>logo title should be ignored</title><url>https://x/logo.png</url></image>
    <item>
      <title>Older</title>
      <guid isPermaLink="false">guid-older</guid>
      <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://cdn.example.com/older.mp3" length="1" type="audio/mpeg"/>
    </item>
    <item>
      <title><![CDATA[Newer <b>bold</b>]]></title>
      <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://cdn.example.com/newer.mp3" type="audio/mpeg"></enclosure>
    </item>
    <item>
      <title>Text only post</title>
      <guid>no-audio</guid>
    </item>
    <item>
      <title>   </title>
      <enclosure url="https://cdn.example.com/undated.mp3"/>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Cast</title>
  <entry>
    <title>First</title>
    <id>urn:uuid:1</id>
    <updated>2024-03-05T09:00:00Z</updated>
    <link rel="alternate" href="https://example.com/first"/>
    <link rel="enclosure" type="audio/mpeg" href="https://cdn.example.com/first.mp3"/>
  </entry>
  <entry>
    <title>Second</title>
    <id>urn:uuid:2</id>
    <published>2024-03-06T09:00:00+01:00</published>
    <updated>2024-01-01T00:00:00Z</updated>
    <link rel="enclosure" href="https://cdn.example.com/second.mp3"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let feed = parse_feed(RSS, "https://example.com/rss").unwrap();
        assert_eq!(feed.title, "Night & Day");
        let titles: Vec<&str> = feed.episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Newer <b>bold</b>", "Older", "(untitled)"]);

        let older = &feed.episodes[1];
        assert_eq!(older.id.as_deref(), Some("guid-older"));
        assert_eq!(older.feed_title, "Night & Day");
        assert_eq!(older.date_label(), "2024-01-01");

        // guid missing: the enclosure doubles as identity
        let newer = &feed.episodes[0];
        assert_eq!(newer.id.as_deref(), Some("https://cdn.example.com/newer.mp3"));
        assert!(feed.episodes[2].published_at.is_none());
    }

    #[test]
    fn test_parse_atom() {
        let feed = parse_feed(ATOM, "https://example.com/atom").unwrap();
        assert_eq!(feed.title, "Atom Cast");
        assert_eq!(feed.episodes.len(), 2);
        assert_eq!(feed.episodes[0].title, "Second");
        assert_eq!(feed.episodes[0].date_label(), "2024-03-06");
        assert_eq!(feed.episodes[1].audio_url, "https://cdn.example.com/first.mp3");
        assert_eq!(feed.episodes[1].id.as_deref(), Some("urn:uuid:1"));
    }

    #[test]
    fn test_blank_title_falls_back_to_url() {
        let xml = "<rss><channel><title></title></channel></rss>";
        let feed = parse_feed(xml, "https://example.com/rss").unwrap();
        assert_eq!(feed.title, "https://example.com/rss");
        assert!(feed.episodes.is_empty());
    }

    #[test]
    fn test_html_page_is_rejected() {
        let err = parse_feed("<html><body>hi</body></html>", "https://x").unwrap_err();
        assert!(matches!(err, FeedError::NoChannel));
    }
}
