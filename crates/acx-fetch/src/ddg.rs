//! DuckDuckGo image search.
//!
//! Two steps: the HTML search page embeds a `vqd` token, and the `i.js`
//! endpoint returns result pages as JSON when given that token. Each page
//! carries a `next` link whose `s` parameter is the offset of the next page.

use crate::error::FetchError;
use crate::fetcher::{ImageHit, ImageProvider};
use crate::http;
use reqwest::header::REFERER;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;

const BASE_URL: &str = "https://duckduckgo.com/";
const IMAGES_ENDPOINT: &str = "https://duckduckgo.com/i.js";
const LARGE_FILTER: &str = ",size:Large,,,,";
const MAX_PAGES: usize = 5;

pub const DEFAULT_REGION: &str = "wt-wt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    On,
    #[default]
    Moderate,
    Off,
}

impl SafeSearch {
    fn param(self) -> &'static str {
        match self {
            SafeSearch::On | SafeSearch::Moderate => "1",
            SafeSearch::Off => "-1",
        }
    }
}

impl std::str::FromStr for SafeSearch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(SafeSearch::On),
            "moderate" => Ok(SafeSearch::Moderate),
            "off" => Ok(SafeSearch::Off),
            other => Err(format!("unknown safesearch level '{other}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResultsPage {
    #[serde(default)]
    results: Vec<RawHit>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(default)]
    image: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

/// DuckDuckGo image search client sharing one browser-like HTTP client for
/// searching and downloading.
pub struct DuckDuckGo {
    client: reqwest::Client,
    region: String,
    safesearch: SafeSearch,
}

impl DuckDuckGo {
    pub fn new(region: &str, safesearch: SafeSearch) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::browser_client(http::DEFAULT_TIMEOUT)?,
            region: region.to_string(),
            safesearch,
        })
    }

    async fn vqd_token(&self, keyword: &str) -> Result<String, FetchError> {
        let html = self
            .client
            .get(BASE_URL)
            .query(&[("q", keyword)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        extract_vqd(&html).ok_or_else(|| FetchError::TokenNotFound(keyword.to_string()))
    }

    async fn search_pages(&self, keyword: &str) -> Result<Vec<ImageHit>, FetchError> {
        let vqd = self.vqd_token(keyword).await?;
        let mut hits = Vec::new();
        let mut seen = HashSet::new();
        let mut offset: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut params = vec![
                ("l", self.region.as_str()),
                ("o", "json"),
                ("q", keyword),
                ("vqd", vqd.as_str()),
                ("f", LARGE_FILTER),
                ("p", self.safesearch.param()),
            ];
            if let Some(s) = offset.as_deref() {
                params.push(("s", s));
            }

            let body = self
                .client
                .get(IMAGES_ENDPOINT)
                .header(REFERER, BASE_URL)
                .query(&params)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            let parsed: ResultsPage = serde_json::from_str(&body)?;
            let next = parsed.next.as_deref().and_then(next_offset);
            let page_hits = collect_hits(parsed, &mut seen);
            tracing::debug!(keyword, page, hits = page_hits.len(), "search page");
            hits.extend(page_hits);

            match next {
                Some(s) => offset = Some(s),
                None => break,
            }
        }
        Ok(hits)
    }
}

impl ImageProvider for DuckDuckGo {
    fn search(&self, keyword: &str) -> impl Future<Output = Result<Vec<ImageHit>, FetchError>> + Send {
        self.search_pages(keyword)
    }

    fn download(&self, url: &str) -> impl Future<Output = Result<Option<Vec<u8>>, FetchError>> + Send {
        http::download_image(&self.client, url)
    }
}

fn collect_hits(page: ResultsPage, seen: &mut HashSet<String>) -> Vec<ImageHit> {
    page.results
        .into_iter()
        .filter(|raw| !raw.image.is_empty() && seen.insert(raw.image.clone()))
        .map(|raw| ImageHit {
            url: raw.image,
            width: raw.width,
            height: raw.height,
            title: raw.title,
            source: raw.url,
        })
        .collect()
}

/// Pull the `vqd` token out of the search page.
///
/// The page has used `vqd="…"`, `vqd='…'` and `vqd=…&` over time.
pub fn extract_vqd(html: &str) -> Option<String> {
    for (open, close) in [("vqd=\"", '"'), ("vqd='", '\''), ("vqd=", '&')] {
        if let Some(start) = html.find(open) {
            let rest = &html[start + open.len()..];
            if let Some(end) = rest.find(close) {
                let token = &rest[..end];
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

/// The `s` parameter of a `next` link such as `i.js?q=x&o=json&s=100&u=bing`.
fn next_offset(next: &str) -> Option<String> {
    let query = next.split_once('?').map_or(next, |(_, q)| q);
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("s="))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
