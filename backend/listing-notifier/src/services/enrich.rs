//! Optional job description enrichment.
//!
//! Descriptions feed keyword matching only. Any failure leaves the
//! posting's description absent.

use crate::models::Posting;
use crate::services::matcher::normalize;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use reqwest::Client as HttpClient;
use resilience::ServiceConfig;
use std::sync::LazyLock;
use tracing::debug;

/// Fetches the description text for a posting URL
#[async_trait]
pub trait PostingEnricher: Send + Sync {
    async fn fetch_description(&self, url: &str) -> Option<String>;
}

/// Application form URLs usually sit one segment below the description page
pub fn normalize_job_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix("/application")
        .or_else(|| trimmed.strip_suffix("/apply"))
        .unwrap_or(trimmed)
        .to_string()
}

static LD_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("Invalid ld+json regex")
});

static META_DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .expect("Invalid meta description regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Strip tags and collapse whitespace, keeping the original case
fn to_plain_text(html: &str) -> String {
    let decoded = decode_entities(html);
    let stripped = TAG_RE.replace_all(&decoded, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ld_json_description(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::Object(map) => map.get("description").and_then(|d| d.as_str()),
        serde_json::Value::Array(items) => items.iter().find_map(ld_json_description),
        _ => None,
    }
}

/// Description text from a job page: the first ld+json `description`,
/// else the `<meta name="description">` content.
pub fn extract_description(html: &str) -> Option<String> {
    let from_ld_json = LD_JSON_RE.captures_iter(html).find_map(|caps| {
        let body = caps.get(1)?.as_str().trim();
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        ld_json_description(&value).map(to_plain_text)
    });

    from_ld_json
        .or_else(|| {
            META_DESCRIPTION_RE
                .captures(html)
                .and_then(|caps| caps.get(1))
                .map(|m| to_plain_text(m.as_str()))
        })
        .filter(|text| !normalize(text).is_empty())
}

/// Fetches job pages over HTTP
#[derive(Clone)]
pub struct HttpDescriptionEnricher {
    client: HttpClient,
}

impl HttpDescriptionEnricher {
    pub fn new(preset: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(preset.connect_timeout)
            .timeout(preset.timeout.duration)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client.get(url).send().await?.error_for_status()?.text().await
    }
}

#[async_trait]
impl PostingEnricher for HttpDescriptionEnricher {
    async fn fetch_description(&self, url: &str) -> Option<String> {
        let url = normalize_job_url(url);

        match self.fetch_html(&url).await {
            Ok(html) => {
                let description = extract_description(&html);
                debug!(url = %url, found = description.is_some(), "Fetched job page");
                description
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Job page fetch failed");
                None
            }
        }
    }
}

/// New postings carrying fetched descriptions, in input order, with at
/// most `concurrency` fetches in flight.
pub async fn enrich_descriptions(
    postings: Vec<Posting>,
    enricher: &dyn PostingEnricher,
    concurrency: usize,
) -> Vec<Posting> {
    stream::iter(postings)
        .map(|posting| async move {
            let description = enricher.fetch_description(&posting.url).await;
            posting.with_description(description)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
