use thiserror::Error;
use url::Url;

/// Reasons a feed URL is rejected.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
}

/// Checks that `url_str` is something the feed transport can GET.
///
/// Only the shape is checked. Local and private hosts are allowed so that a
/// mirror or a test server can stand in for the public feed.
///
/// # Examples
///
/// ```
/// use gdacs_feed::util::validate_feed_url;
///
/// let url = validate_feed_url("https://www.gdacs.org/xml/rss.xml").unwrap();
/// assert_eq!(url.host_str(), Some("www.gdacs.org"));
///
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}
