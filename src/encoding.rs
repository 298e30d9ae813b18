//! Character encoding detection and transcoding.
//!
//! Fetched pages are decoded with the charset from the `Content-Type` header,
//! falling back to a `<meta>` sniff of the document head. Many watched boards
//! are Korean and still declare legacy EUC-KR aliases that the WHATWG label
//! table does not know, so those are mapped first.

use encoding_rs::{Encoding, EUC_KR, UTF_8};
use regex::Regex;
use std::sync::LazyLock;

/// Match `<meta charset="...">` tag
#[allow(clippy::expect_used)]
static CHARSET_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s>;/]+)"#).expect("valid regex")
});

/// Match `charset=...` inside a `Content-Type` header value
#[allow(clippy::expect_used)]
static HEADER_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).expect("valid regex")
});

/// Korean charset labels seen in the wild that WHATWG does not list.
const KOREAN_ALIASES: &[&str] = &["cp949", "ms949", "uhc", "x-windows-949", "euckr", "ks_c_5601", "x-euc-kr"];

/// Resolve a charset label, honoring the Korean alias table.
#[must_use]
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().trim_matches(|c| c == '"' || c == '\'');
    if KOREAN_ALIASES.iter().any(|alias| alias.eq_ignore_ascii_case(label)) {
        return Some(EUC_KR);
    }
    Encoding::for_label(label.as_bytes())
}

/// Charset named by a `Content-Type` header value.
#[must_use]
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    HEADER_CHARSET_RE
        .captures(content_type)
        .and_then(|c| c.get(1))
        .and_then(|m| encoding_for_label(m.as_str()))
}

/// Detect character encoding from the head of an HTML document.
///
/// Handles both `<meta charset="...">` and the `http-equiv` form, since the
/// pattern only needs a `charset=` inside a meta tag. Only the first 1024
/// bytes are examined. Defaults to UTF-8.
#[must_use]
pub fn detect_encoding(html: &[u8]) -> &'static Encoding {
    let head = &html[..html.len().min(1024)];
    let head_str = String::from_utf8_lossy(head);

    CHARSET_META_RE
        .captures(&head_str)
        .and_then(|c| c.get(1))
        .and_then(|m| encoding_for_label(m.as_str()))
        .unwrap_or(UTF_8)
}

/// Pick the decoder for a response: header charset first, then the meta sniff.
#[must_use]
pub fn resolve_encoding(content_type: Option<&str>, body: &[u8]) -> &'static Encoding {
    content_type
        .and_then(charset_from_content_type)
        .unwrap_or_else(|| detect_encoding(body))
}

/// Decode a response body to UTF-8.
///
/// Invalid sequences become U+FFFD instead of failing the check.
#[must_use]
pub fn decode_body(content_type: Option<&str>, body: &[u8]) -> String {
    let encoding = resolve_encoding(content_type, body);
    if encoding == UTF_8 {
        return String::from_utf8_lossy(body).into_owned();
    }
    let (decoded, _encoding_used, _had_errors) = encoding.decode(body);
    decoded.into_owned()
}
