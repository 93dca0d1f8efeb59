use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("keywords file not found: {0}")]
    KeywordsNotFound(String),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search token not found for '{0}'")]
    TokenNotFound(String),
    #[error("malformed search response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
