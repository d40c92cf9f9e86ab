use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a user-submitted target URL
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject if empty
/// 2. Prefix `https://` when no `http://` or `https://` scheme is present
/// 3. Parse; reject malformed URLs and URLs without a host
///
/// # Examples
///
/// ```
/// use pagefold::url::normalize_submission;
///
/// let url = normalize_submission("  example.com/docs ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs");
/// ```
pub fn normalize_submission(input: &str) -> UrlResult<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("URL is required".to_string()));
    }

    let lowered = trimmed.to_ascii_lowercase();
    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Computes the key used by the per-job seen-set
///
/// The fragment and the query string are stripped so `/page?a=1#top` and
/// `/page` collapse to one entry. The fetch itself still uses the original URL.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pagefold::url::dedup_key;
///
/// let url = Url::parse("https://example.com/page?ref=nav#intro").unwrap();
/// assert_eq!(dedup_key(&url), "https://example.com/page");
/// ```
pub fn dedup_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.set_query(None);
    key.to_string()
}
