//! Keyword-driven fetch loop.

use crate::error::FetchError;
use crate::keywords::{extension_from_url, file_name_for};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MIN_WIDTH: u32 = 1000;
pub const DEFAULT_MIN_HEIGHT: u32 = 1000;
pub const DEFAULT_IMAGE_COUNT: usize = 1;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// One image search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHit {
    /// Direct URL of the full-size image.
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Page the image was found on.
    pub source: String,
}

/// An image search backend.
pub trait ImageProvider {
    fn search(&self, keyword: &str)
        -> impl Future<Output = Result<Vec<ImageHit>, FetchError>> + Send;

    /// Fetch image bytes; `Ok(None)` when the URL does not serve an image.
    fn download(&self, url: &str)
        -> impl Future<Output = Result<Option<Vec<u8>>, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub min_width: u32,
    pub min_height: u32,
    /// Images wanted per keyword.
    pub count: usize,
    /// Pause after each successful download.
    pub delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
            count: DEFAULT_IMAGE_COUNT,
            delay: DEFAULT_DELAY,
        }
    }
}

impl FetchOptions {
    fn accepts(&self, hit: &ImageHit) -> bool {
        !hit.url.is_empty() && hit.width >= self.min_width && hit.height >= self.min_height
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordOutcome {
    pub keyword: String,
    pub downloaded: Vec<PathBuf>,
    /// Search failure, if the keyword could not be searched at all.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub keywords: Vec<KeywordOutcome>,
}

impl FetchSummary {
    pub fn total_downloaded(&self) -> usize {
        self.keywords.iter().map(|k| k.downloaded.len()).sum()
    }

    /// Keywords that ended with fewer than `wanted` images.
    pub fn shortfalls(&self, wanted: usize) -> impl Iterator<Item = &KeywordOutcome> {
        self.keywords
            .iter()
            .filter(move |k| k.downloaded.len() < wanted)
    }
}

/// Search and download images for each keyword into `out_dir`.
///
/// Failures are per keyword or per image and never abort the run; only a
/// failure to create `out_dir` is returned as an error.
pub async fn fetch_images<P: ImageProvider>(
    provider: &P,
    keywords: &[String],
    options: &FetchOptions,
    out_dir: &Path,
) -> Result<FetchSummary, FetchError> {
    tokio::fs::create_dir_all(out_dir).await?;
    tracing::info!(keywords = keywords.len(), out_dir = %out_dir.display(), "fetching images");

    let mut summary = FetchSummary::default();
    for keyword in keywords {
        let outcome = fetch_keyword(provider, keyword, options, out_dir).await;
        if outcome.error.is_none() && outcome.downloaded.len() < options.count {
            tracing::warn!(
                keyword = %keyword,
                found = outcome.downloaded.len(),
                wanted = options.count,
                "not enough images matching dimensions"
            );
        }
        summary.keywords.push(outcome);
    }
    Ok(summary)
}

/// Fetch up to `options.count` images for a single keyword.
pub async fn fetch_keyword<P: ImageProvider>(
    provider: &P,
    keyword: &str,
    options: &FetchOptions,
    out_dir: &Path,
) -> KeywordOutcome {
    let mut outcome = KeywordOutcome {
        keyword: keyword.to_string(),
        ..Default::default()
    };

    tracing::info!(keyword, "searching");
    let hits = match provider.search(keyword).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(keyword, error = %e, "search failed");
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };
    if hits.is_empty() {
        tracing::warn!(keyword, "no results");
        return outcome;
    }

    for hit in hits.iter().filter(|h| options.accepts(h)) {
        if outcome.downloaded.len() >= options.count {
            break;
        }

        let file_name = file_name_for(keyword, outcome.downloaded.len() + 1, &extension_from_url(&hit.url));
        let dest = out_dir.join(&file_name);

        let bytes = match provider.download(&hit.url).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(url = %hit.url, error = %e, "download failed");
                continue;
            }
        };
        if let Err(e) = tokio::fs::write(&dest, &bytes).await {
            tracing::warn!(path = %dest.display(), error = %e, "cannot write image");
            continue;
        }

        tracing::debug!(file = %file_name, width = hit.width, height = hit.height, "downloaded");
        outcome.downloaded.push(dest);
        if !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned search results; URLs containing `broken` fail, `html` is not an image.
    #[derive(Default)]
    struct FakeProvider {
        results: HashMap<String, Vec<ImageHit>>,
        downloads: Mutex<Vec<String>>,
    }

    fn hit(url: &str, width: u32, height: u32) -> ImageHit {
        ImageHit {
            url: url.to_string(),
            width,
            height,
            title: String::new(),
            source: String::new(),
        }
    }

    impl ImageProvider for FakeProvider {
        fn search(
            &self,
            keyword: &str,
        ) -> impl Future<Output = Result<Vec<ImageHit>, FetchError>> + Send {
            let result = match self.results.get(keyword) {
                Some(hits) => Ok(hits.clone()),
                None => Err(FetchError::TokenNotFound(keyword.to_string())),
            };
            async move { result }
        }

        fn download(
            &self,
            url: &str,
        ) -> impl Future<Output = Result<Option<Vec<u8>>, FetchError>> + Send {
            self.downloads.lock().unwrap().push(url.to_string());
            let result = if url.contains("broken") {
                Err(FetchError::Io(std::io::Error::other("connection reset")))
            } else if url.contains("html") {
                Ok(None)
            } else {
                Ok(Some(url.as_bytes().to_vec()))
            };
            async move { result }
        }
    }

    fn options(count: usize) -> FetchOptions {
        FetchOptions {
            count,
            delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_filters_by_size_and_names_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = FakeProvider::default();
        provider.results.insert(
            "Ada Lovelace".into(),
            vec![
                hit("https://a.org/small.jpg", 800, 1200),
                hit("https://a.org/broken.jpg", 1200, 1200),
                hit("https://a.org/page.html", 1200, 1200),
                hit("https://a.org/big.PNG?x=1", 1500, 1000),
                hit("https://a.org/second.webp", 2000, 2000),
                hit("https://a.org/third.jpg", 2000, 2000),
            ],
        );

        let summary = fetch_images(&provider, &["Ada Lovelace".to_string()], &options(2), dir.path())
            .await
            .unwrap();

        let outcome = &summary.keywords[0];
        assert_eq!(outcome.downloaded.len(), 2);
        assert_eq!(outcome.downloaded[0], dir.path().join("ada_lovelace_1.png"));
        assert_eq!(outcome.downloaded[1], dir.path().join("ada_lovelace_2.webp"));
        assert_eq!(
            std::fs::read(&outcome.downloaded[0]).unwrap(),
            b"https://a.org/big.PNG?x=1"
        );
        // Stops once the count is met; undersized hits are never requested.
        let downloads = provider.downloads.lock().unwrap();
        assert_eq!(downloads.len(), 4);
        assert!(!downloads.iter().any(|u| u.contains("small") || u.contains("third")));
    }

    #[tokio::test]
    async fn test_fetch_records_errors_and_shortfalls() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let mut provider = FakeProvider::default();
        provider
            .results
            .insert("cher".into(), vec![hit("https://c.org/1.jpg", 1000, 1000)]);
        provider.results.insert("nobody".into(), vec![]);

        let keywords = vec!["cher".to_string(), "missing".to_string(), "nobody".to_string()];
        let summary = fetch_images(&provider, &keywords, &options(3), &out).await.unwrap();

        assert_eq!(summary.total_downloaded(), 1);
        assert!(out.join("cher_1.jpg").exists());
        assert!(summary.keywords[1].error.is_some());
        assert!(summary.keywords[2].error.is_none());
        assert_eq!(summary.shortfalls(3).count(), 3);
        assert_eq!(summary.shortfalls(1).count(), 2);
    }
}
