//! Keyword list parsing and output file naming.

use std::collections::BTreeSet;

const HEADER: &str = "keyword";
const FALLBACK_EXTENSION: &str = "jpg";
const MAX_EXTENSION_LEN: usize = 4;

/// Parse a one-keyword-per-line list (a single-column CSV works too).
///
/// Lines are trimmed and stripped of surrounding commas. Blank lines and a
/// `keyword` header are skipped. The result is deduplicated and sorted.
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case(HEADER))
        .map(|line| line.trim_matches(',').trim())
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// File extension for an image URL, `jpg` when the URL has no plausible one.
pub fn extension_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path.rsplit('.').next().unwrap_or_default().to_lowercase();
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return FALLBACK_EXTENSION.to_string();
    }
    ext
}

/// `Jane Doe`, 2, `png` → `jane_doe_2.png`.
pub fn file_name_for(keyword: &str, n: usize, ext: &str) -> String {
    let safe = keyword.replace(' ', "_").to_lowercase();
    format!("{safe}_{n}.{ext}")
}
