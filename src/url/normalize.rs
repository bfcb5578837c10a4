use crate::UrlError;
use url::Url;

/// Normalizes a URL for frontier bookkeeping
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not `http` or `https`
/// 3. Require a host
/// 4. Remove the fragment (everything after #)
///
/// Scheme and host are lower-cased by the parser and default ports are
/// dropped, so two spellings of the same page map to one frontier key.
///
/// # Examples
///
/// ```
/// use quarry::url::normalize_url;
///
/// let url = normalize_url("HTTPS://Docs.Example.COM/guide#install").unwrap();
/// assert_eq!(url.as_str(), "https://docs.example.com/guide");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves `candidate` against `source` and normalizes the result
///
/// Relative hrefs (`../api`, `guide.html`, `/docs`) are resolved the same way
/// a browser would before the fragment is stripped.
pub fn resolve_url(candidate: &str, source: &Url) -> Result<Url, UrlError> {
    let url = source
        .join(candidate.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns the origin key (scheme://host[:port]) used to cache robots rules
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}
