//! Browser-like HTTP client and image download.

use crate::error::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// Image hosts reject requests without a browser user agent with 403.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
    image/avif,image/webp,image/apng,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
    headers
}

pub fn browser_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .default_headers(browser_headers())
        .timeout(timeout)
        .build()?)
}

/// True when a `Content-Type` value names an image.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type.contains("image")
}

/// Download `url`. Returns `Ok(None)` when the server answers with something
/// other than an image.
pub async fn download_image(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<Vec<u8>>, FetchError> {
    let response = client.get(url).send().await?.error_for_status()?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !is_image_content_type(&content_type) {
        tracing::debug!(url, content_type, "not an image, skipping");
        return Ok(None);
    }

    let bytes = response.bytes().await?;
    Ok(Some(bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_content_type() {
        assert!(is_image_content_type("image/jpeg"));
        assert!(is_image_content_type("image/webp; charset=binary"));
        assert!(!is_image_content_type("text/html; charset=utf-8"));
        assert!(!is_image_content_type(""));
    }

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers();
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("Mozilla/5.0"));
        assert_eq!(headers[ACCEPT_LANGUAGE], "en-US,en;q=0.9");
    }

    #[test]
    fn test_browser_client_builds() {
        assert!(browser_client(DEFAULT_TIMEOUT).is_ok());
    }
}
