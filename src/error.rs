use thiserror::Error;

/// Reasons a URL cannot be checked against a robots.txt file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The queried URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The robots.txt was built from a URL that could not be parsed, so no
    /// URL can belong to it.
    #[error("robots.txt has no valid base url")]
    MissingBase,

    /// The queried URL has a different scheme, host or port than the
    /// robots.txt file.
    #[error("{url} is not covered by this robots.txt")]
    OriginMismatch { url: String },
}
