//! URL Utility Functions
//!
//! Link resolution for extracted posts and hostname helpers for
//! notifications and registration.

use url::Url;

/// Check if a string is a valid absolute http(s) URL.
///
/// # Returns
/// * `(is_absolute, parsed_url)` - Whether URL is absolute and the parsed URL if valid
#[must_use]
pub fn is_absolute_url(s: &str) -> (bool, Option<Url>) {
    let s = s.trim();

    if !s.starts_with("http://") && !s.starts_with("https://") {
        return (false, None);
    }

    match Url::parse(s) {
        Ok(url) if url.host().is_some() => (true, Some(url)),
        _ => (false, None),
    }
}

/// Resolve a raw `href` attribute against the page URL.
///
/// The raw attribute is used (not a browser-resolved property) so that HTML
/// parsed away from its origin still resolves against the right base.
/// Returns `None` for empty, fragment-only and script links.
#[must_use]
pub fn resolve_href(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }

    let (is_abs, parsed) = is_absolute_url(href);
    if is_abs {
        return parsed.map(String::from);
    }

    base.join(href).ok().map(String::from)
}

/// Extract the hostname from a URL, empty if invalid.
#[must_use]
pub fn hostname(url_str: &str) -> String {
    Url::parse(url_str.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Short display name for a URL: hostname without `www.`, first label.
#[must_use]
pub fn short_name(url_str: &str) -> String {
    let host = hostname(url_str);
    let host = host.strip_prefix("www.").unwrap_or(&host);
    host.split('.').next().unwrap_or_default().to_string()
}
