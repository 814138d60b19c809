//! RSS-backed document source: feed parsing plus article body extraction.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::types::RagError;

use super::{DocumentSource, FeedItem};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; NewsBot/1.0)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Containers news sites commonly put article text in, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".article-content",
    ".story-body",
    "main",
    ".content",
    ".post-content",
    ".entry-content",
];

static PARSED_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("valid content selector"))
        .collect()
});

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid body selector"));

/// Fetches RSS listings and extracts readable article text.
pub struct RssDocumentSource {
    client: reqwest::Client,
}

impl RssDocumentSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds a source with the crawler defaults (UA header, 10s timeout).
    pub fn with_defaults() -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| RagError::SourceFetch(err.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl DocumentSource for RssDocumentSource {
    async fn list_feed_items(&self, feed_url: &str) -> Result<Vec<FeedItem>, RagError> {
        let xml = self
            .client
            .get(feed_url)
            .send()
            .await
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?
            .text()
            .await
            .map_err(fetch_err)?;
        parse_feed(&xml)
    }

    async fn fetch_body(&self, url: &str) -> Result<Option<String>, RagError> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(url, error = %err, "skipping article with unparseable url");
                return Ok(None);
            }
        };

        let response = match self.client.get(parsed).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url, error = %err, "article fetch failed");
                return Ok(None);
            }
        };
        let html = match response.error_for_status().map(|r| r.text()) {
            Ok(text) => match text.await {
                Ok(html) => html,
                Err(err) => {
                    warn!(url, error = %err, "article body read failed");
                    return Ok(None);
                }
            },
            Err(err) => {
                warn!(url, error = %err, "article fetch rejected");
                return Ok(None);
            }
        };

        let text = extract_article_text(&html);
        debug!(url, chars = text.chars().count(), "extracted article body");
        Ok((!text.is_empty()).then_some(text))
    }
}

fn fetch_err(err: reqwest::Error) -> RagError {
    RagError::SourceFetch(err.to_string())
}

#[derive(Clone, Copy)]
enum ItemField {
    Title,
    Link,
    Description,
    PubDate,
}

/// Parses an RSS document into feed items. Items without a link, or with a
/// title too short to be a headline, are dropped.
pub(crate) fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, RagError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut in_item = false;
    let mut field: Option<ItemField> = None;
    let mut title = String::new();
    let mut link = String::new();
    let mut description = String::new();
    let mut pub_date = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => match start.name().as_ref() {
                b"item" => {
                    in_item = true;
                    title.clear();
                    link.clear();
                    description.clear();
                    pub_date.clear();
                }
                b"title" if in_item => field = Some(ItemField::Title),
                b"link" if in_item => field = Some(ItemField::Link),
                b"description" if in_item => field = Some(ItemField::Description),
                b"pubDate" if in_item => field = Some(ItemField::PubDate),
                _ => field = None,
            },
            Ok(Event::Text(text)) => {
                if in_item && field.is_some() {
                    let value = text
                        .unescape()
                        .map_err(|err| RagError::SourceFetch(format!("bad feed xml: {err}")))?;
                    append_field(field, &value, &mut title, &mut link, &mut description, &mut pub_date);
                }
            }
            Ok(Event::CData(cdata)) => {
                if in_item && field.is_some() {
                    let value = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    append_field(field, &value, &mut title, &mut link, &mut description, &mut pub_date);
                }
            }
            Ok(Event::End(end)) => {
                if end.name().as_ref() == b"item" {
                    in_item = false;
                    let item = FeedItem {
                        title: title.trim().to_string(),
                        link: link.trim().to_string(),
                        description: description.trim().to_string(),
                        published_at: pub_date.trim().to_string(),
                    };
                    if !item.link.is_empty() && item.title.chars().count() > 10 {
                        items.push(item);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(RagError::SourceFetch(format!("bad feed xml: {err}")));
            }
        }
    }

    Ok(items)
}

fn append_field(
    field: Option<ItemField>,
    value: &str,
    title: &mut String,
    link: &mut String,
    description: &mut String,
    pub_date: &mut String,
) {
    let target = match field {
        Some(ItemField::Title) => title,
        Some(ItemField::Link) => link,
        Some(ItemField::Description) => description,
        Some(ItemField::PubDate) => pub_date,
        None => return,
    };
    target.push_str(value);
}

/// Pulls readable text out of an article page: the first content container
/// with substantial text wins, falling back to the whole body. Script and
/// style subtrees are never included.
pub(crate) fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in PARSED_SELECTORS.iter() {
        if let Some(element) = document.select(selector).next() {
            let text = collapse(&visible_text(element));
            if text.chars().count() > 50 {
                return text;
            }
        }
    }

    document
        .select(&BODY_SELECTOR)
        .next()
        .map(|body| collapse(&visible_text(body)))
        .unwrap_or_default()
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    out
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if matches!(el.name(), "script" | "style" | "noscript") => {}
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    push_text(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
