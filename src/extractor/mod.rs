//! Record Extractor
//!
//! Turns the elements matched by a post selector into normalized
//! [`PostRecord`]s. The same function serves the fetched-and-parsed path and
//! the rendered-tab path, so both produce identical records for identical
//! markup.
//!
//! # Module Structure
//!
//! - `login`: login wall detection
//! - `cascade`: sub-selector cascades for title, link, date and author
//!
//! # Usage
//!
//! ```rust
//! use rs_catchup::{dom, extractor, Options};
//! use url::Url;
//!
//! let doc = dom::parse(r#"
//!     <ul><li class="post"><a href="/p/1">First post</a><span class="date">05-01</span></li>
//!         <li class="post"><a href="/p/2">Second post</a><span class="date">05-02</span></li></ul>
//! "#);
//! let page = Url::parse("https://example.com/board").unwrap();
//!
//! let extraction = extractor::extract(&doc, "li.post", &page, &Options::default());
//! assert!(extraction.is_logged_in);
//! assert_eq!(extraction.posts[1].link, "https://example.com/p/2");
//! assert_eq!(extraction.posts[1].date, "05-02");
//! ```

use dom_query::{Document, Selection};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom;
use crate::error::Error;
use crate::Options;

pub mod cascade;
pub mod login;

/// One normalized post.
///
/// There is no identity field: the differ keys posts by `link`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRecord {
    /// Trimmed title, at most 150 characters.
    pub title: String,
    /// Absolute URL of the post, the page URL when the element has no link.
    pub link: String,
    /// Raw date text as displayed on the page.
    #[serde(default)]
    pub date: String,
    /// Raw author text.
    #[serde(default)]
    pub author: String,
}

/// Why an extraction produced no posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExtractFailure {
    /// The selector matched nothing.
    #[error("elements not found")]
    ElementsNotFound,
    /// The selector is not valid CSS.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

/// Structured extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// Extracted posts in document order.
    pub posts: Vec<PostRecord>,
    /// `false` when a login wall stood in for the content.
    pub is_logged_in: bool,
    /// Set when nothing could be extracted for a reason other than login.
    pub error: Option<ExtractFailure>,
}

impl Extraction {
    /// Successful extraction.
    #[must_use]
    pub fn posts(posts: Vec<PostRecord>) -> Self {
        Self { posts, is_logged_in: true, error: None }
    }

    /// Login wall result.
    #[must_use]
    pub fn login_required() -> Self {
        Self { posts: Vec::new(), is_logged_in: false, error: None }
    }

    /// Failure result.
    #[must_use]
    pub fn failed(failure: ExtractFailure) -> Self {
        Self { posts: Vec::new(), is_logged_in: true, error: Some(failure) }
    }

    /// Whether the lightweight path should hand over to the rendered tab.
    #[must_use]
    pub fn needs_fallback(&self) -> bool {
        self.is_logged_in && (self.error.is_some() || self.posts.is_empty())
    }

    /// Convert into the crate error taxonomy.
    pub fn into_result(self) -> crate::Result<Vec<PostRecord>> {
        if !self.is_logged_in {
            return Err(Error::NeedsLogin);
        }
        match self.error {
            Some(ExtractFailure::ElementsNotFound) => Err(Error::ElementsNotFound),
            Some(ExtractFailure::InvalidSelector(s)) => Err(Error::InvalidSelector(s)),
            None => Ok(self.posts),
        }
    }
}

/// Extract one record from a matched element; `None` for 0/1-character titles.
fn extract_record(element: &Selection, index: usize, base: &Url, options: &Options) -> Option<PostRecord> {
    let titled = cascade::first_text(element, cascade::TITLE_SELECTORS);

    let title = match &titled {
        Some((_, text)) => cascade::truncate_chars(text, options.max_title_chars),
        None => {
            let own = cascade::truncate_chars(&dom::clean_text(element), options.fallback_title_chars);
            if own.is_empty() {
                format!("Post {}", index + 1)
            } else {
                own
            }
        }
    };

    if title.chars().count() <= 1 {
        return None;
    }

    let link = cascade::find_link(element, titled.as_ref().map(|(el, _)| el), base)
        .unwrap_or_else(|| base.to_string());

    let date = cascade::first_text(element, cascade::DATE_SELECTORS)
        .map(|(_, text)| text)
        .unwrap_or_default();
    let author = cascade::first_text(element, cascade::AUTHOR_SELECTORS)
        .map(|(_, text)| text)
        .unwrap_or_default();

    Some(PostRecord { title, link, date, author })
}

/// Extract records from already-matched elements.
///
/// The login wall check runs first: with an empty element set a detected
/// login page yields `is_logged_in: false` rather than a not-found error.
#[must_use]
pub fn extract_elements(doc: &Document, elements: &Selection, base: &Url, options: &Options) -> Extraction {
    if !elements.exists() {
        if login::is_login_wall(doc, base) {
            return Extraction::login_required();
        }
        return Extraction::failed(ExtractFailure::ElementsNotFound);
    }

    let posts = dom::each(elements)
        .iter()
        .enumerate()
        .filter_map(|(index, element)| extract_record(element, index, base, options))
        .collect();

    Extraction::posts(posts)
}

/// Select with `selector` and extract records.
#[must_use]
pub fn extract(doc: &Document, selector: &str, base: &Url, options: &Options) -> Extraction {
    match dom::query_all(doc, selector) {
        Ok(elements) => extract_elements(doc, &elements, base, options),
        Err(_) => Extraction::failed(ExtractFailure::InvalidSelector(selector.to_string())),
    }
}

/// Parse an HTML string and extract records.
#[must_use]
pub fn extract_html(html: &str, selector: &str, base: &Url, options: &Options) -> Extraction {
    let doc = dom::parse(html);
    extract(&doc, selector, base, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://board.example.kr/list").unwrap()
    }

    #[test]
    fn fallback_title_uses_element_text() {
        let doc = dom::parse(r#"<div class="p">  Plain   text post  </div><div class="p">Another</div>"#);
        let out = extract(&doc, ".p", &page(), &Options::default());
        assert_eq!(out.posts[0].title, "Plain text post");
        assert_eq!(out.posts[0].link, "https://board.example.kr/list");
    }

    #[test]
    fn empty_elements_fall_back_to_numbered_title() {
        let doc = dom::parse(r#"<div class="p"></div><div class="p"><img src="a.png"></div>"#);
        let out = extract(&doc, ".p", &page(), &Options::default());
        let titles: Vec<_> = out.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Post 1", "Post 2"]);
    }

    #[test]
    fn one_character_titles_dropped() {
        let doc = dom::parse(r#"<div class="p"><a href="/1">x</a></div><div class="p"><a href="/2">ok title</a></div>"#);
        let out = extract(&doc, ".p", &page(), &Options::default());
        assert_eq!(out.posts.len(), 1);
        assert_eq!(out.posts[0].title, "ok title");
    }

    #[test]
    fn invalid_selector_reported() {
        let doc = dom::parse("<p>x</p>");
        let out = extract(&doc, "div[[", &page(), &Options::default());
        assert!(matches!(out.error, Some(ExtractFailure::InvalidSelector(_))));
        assert!(out.needs_fallback());
    }

    #[test]
    fn into_result_maps_taxonomy() {
        assert!(matches!(Extraction::login_required().into_result(), Err(Error::NeedsLogin)));
        assert!(matches!(
            Extraction::failed(ExtractFailure::ElementsNotFound).into_result(),
            Err(Error::ElementsNotFound)
        ));
        assert_eq!(Extraction::posts(vec![]).into_result().unwrap(), vec![]);
    }
}
