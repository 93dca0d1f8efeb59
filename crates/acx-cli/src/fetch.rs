//! `acx fetch`: keyword file in, portrait images out.

use crate::config::{Config, FetchConfig};
use acx_fetch::{fetch_images, parse_keywords, DuckDuckGo, FetchError, FetchOptions, FetchSummary};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::time::Duration;

pub fn fetch_options(config: &FetchConfig) -> FetchOptions {
    FetchOptions {
        min_width: config.min_width,
        min_height: config.min_height,
        count: config.count,
        delay: Duration::try_from_secs_f64(config.delay_secs).unwrap_or(Duration::ZERO),
    }
}

pub fn render_summary(summary: &FetchSummary, wanted: usize) -> String {
    let mut out = String::new();
    for outcome in &summary.keywords {
        if let Some(error) = &outcome.error {
            let _ = writeln!(out, "  [!] Error searching for '{}': {error}", outcome.keyword);
        }
    }
    for outcome in summary.shortfalls(wanted).filter(|k| k.error.is_none()) {
        let _ = writeln!(
            out,
            "  [!] Only found {}/{wanted} images for '{}' matching dimensions.",
            outcome.downloaded.len(),
            outcome.keyword
        );
    }
    let _ = writeln!(
        out,
        "Done. Downloaded {} images for {} keywords.",
        summary.total_downloaded(),
        summary.keywords.len()
    );
    out
}

pub async fn run(config: &Config) -> Result<()> {
    let settings = &config.fetch;
    let keywords_path = config.resolve(&settings.keywords);
    if !keywords_path.exists() {
        return Err(FetchError::KeywordsNotFound(keywords_path.display().to_string()).into());
    }
    let text = tokio::fs::read_to_string(&keywords_path)
        .await
        .with_context(|| format!("reading {}", keywords_path.display()))?;
    let keywords = parse_keywords(&text);
    tracing::info!(count = keywords.len(), path = %keywords_path.display(), "keywords to process");

    let out_dir = config.resolve(&settings.out_dir);
    let provider = DuckDuckGo::new(&settings.region, settings.safesearch)?;
    let options = fetch_options(settings);
    let summary = fetch_images(&provider, &keywords, &options, &out_dir).await?;

    print!("{}", render_summary(&summary, options.count));
    Ok(())
}
