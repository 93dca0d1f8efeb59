//! acx-fetch: Portrait image collection from web image search.
//!
//! Keywords (usually person names) are searched one at a time; the first hits
//! meeting a minimum resolution are downloaded into a flat directory as
//! `<keyword>_<n>.<ext>`, ready for `acx analyze`.

pub mod ddg;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod keywords;

pub use ddg::{DuckDuckGo, SafeSearch};
pub use error::FetchError;
pub use fetcher::{fetch_images, FetchOptions, FetchSummary, ImageHit, ImageProvider};
pub use keywords::parse_keywords;
