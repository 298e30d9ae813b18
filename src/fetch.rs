//! Fetch/Render Fallback Controller
//!
//! Every check first tries the lightweight path: an HTTP GET with the
//! session cookies, charset-aware decoding and a parse on the isolated
//! worker. When that yields no posts, fails, or cannot detect a selector, the
//! controller falls back to a rendered tab: open, wait for load (bounded),
//! let the page settle, capture the live DOM, close. The same extractor runs
//! on both paths.
//!
//! A login wall on the lightweight path is final; rendering the same
//! logged-out session would only show the wall again.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::encoding;
use crate::error::{Error, Result};
use crate::extractor::{Extraction, PostRecord};
use crate::render::{CapturedPage, TabDriver, TabHandle};
use crate::selector::Candidate;
use crate::worker::SharedParseWorker;
use crate::Options;

/// Default `User-Agent` sent with page fetches.
pub const DEFAULT_USER_AGENT: &str = concat!("rs-catchup/", env!("CARGO_PKG_VERSION"));

/// Default `Accept-Language`: Korean boards first, English second.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ko-KR,ko;q=0.9,en;q=0.8";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// Which path produced the posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractPath {
    /// HTTP fetch and isolated parse.
    Fetch,
    /// Rendered browser tab.
    Tab,
}

/// Posts extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtraction {
    /// Posts in document order, uncapped.
    pub posts: Vec<PostRecord>,
    /// Selector the posts were extracted with.
    pub selector: String,
    /// Path that produced them.
    pub path: ExtractPath,
}

/// A page the checker can pull posts from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Extract posts from `url`.
    ///
    /// With `selector == None` the source auto-detects one and fails with
    /// [`Error::NeedsSelector`] when nothing qualifies, or right away when
    /// [`Options::detect_on_check`] is off.
    async fn extract(&self, url: &Url, selector: Option<&str>) -> Result<PageExtraction>;

    /// Detect the post selector of `url`.
    async fn detect(&self, url: &Url) -> Result<Option<Candidate>>;
}

/// A fetched, decoded page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    /// Decoded body.
    pub html: String,
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// `User-Agent` header.
    pub user_agent: String,
    /// `Accept-Language` header.
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

/// Build the shared HTTP client with a cookie store and browser-like headers.
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    let language = HeaderValue::from_str(&config.accept_language)
        .map_err(|e| Error::Config(format!("invalid accept_language: {e}")))?;
    headers.insert(ACCEPT_LANGUAGE, language);

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// GET `url` and decode the body with its declared or sniffed charset.
pub async fn fetch_page(client: &reqwest::Client, url: &Url) -> Result<FetchedPage> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(Error::HttpStatus(status.as_u16()));
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?;

    Ok(FetchedPage {
        url: final_url,
        html: encoding::decode_body(content_type.as_deref(), &body),
    })
}

/// Outcome of one extraction attempt on one path.
enum Attempt {
    Done(PageExtraction),
    /// Nothing usable; the error is final if this was the last path.
    Fallback(Error),
}

/// Two-tier page source: HTTP fetch first, rendered tab second.
pub struct FallbackController {
    client: reqwest::Client,
    worker: Arc<SharedParseWorker>,
    tabs: Arc<dyn TabDriver>,
    options: Options,
}

impl std::fmt::Debug for FallbackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackController").field("options", &self.options).finish_non_exhaustive()
    }
}

impl FallbackController {
    /// Controller over an existing client, worker and tab driver.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        worker: Arc<SharedParseWorker>,
        tabs: Arc<dyn TabDriver>,
        options: Options,
    ) -> Self {
        Self { client, worker, tabs, options }
    }

    /// Turn a parsed extraction into the final result, or ask for fallback.
    fn settle(extraction: Extraction, selector: String, path: ExtractPath) -> Result<Attempt> {
        if !extraction.is_logged_in {
            return Err(Error::NeedsLogin);
        }
        if extraction.error.is_some() || extraction.posts.is_empty() {
            return Ok(Attempt::Fallback(extraction.into_result().err().unwrap_or(Error::ElementsNotFound)));
        }
        Ok(Attempt::Done(PageExtraction { posts: extraction.posts, selector, path }))
    }

    /// Parse `html` with the known selector or auto-detect one.
    async fn parse(&self, html: String, page_url: Url, selector: Option<&str>, path: ExtractPath) -> Result<Attempt> {
        let worker = self.worker.get().await?;
        match selector {
            Some(selector) => {
                let extraction = worker.extract(html, selector.to_string(), page_url).await?;
                Self::settle(extraction, selector.to_string(), path)
            }
            None => {
                let auto = worker.detect_and_extract(html, page_url).await?;
                match (auto.candidate, auto.extraction) {
                    (Some(candidate), Some(extraction)) => {
                        match Self::settle(extraction, candidate.selector, path)? {
                            Attempt::Fallback(_) => Ok(Attempt::Fallback(Error::NeedsSelector)),
                            done => Ok(done),
                        }
                    }
                    _ => Ok(Attempt::Fallback(Error::NeedsSelector)),
                }
            }
        }
    }

    async fn extract_via_fetch(&self, url: &Url, selector: Option<&str>) -> Result<Attempt> {
        let page = fetch_page(&self.client, url).await?;
        self.parse(page.html, page.url, selector, ExtractPath::Fetch).await
    }

    /// Load the tab, bounded by the load timeout, then capture.
    async fn render_in_tab(&self, tab: &TabHandle) -> Result<CapturedPage> {
        match tokio::time::timeout(self.options.tab_load_timeout, self.tabs.wait_for_load(tab)).await {
            Ok(Ok(())) => tokio::time::sleep(self.options.tab_settle_delay).await,
            Ok(Err(e)) => return Err(e),
            Err(_) => warn!(url = %tab.url, "tab load timed out, capturing anyway"),
        }
        self.tabs.capture(tab).await
    }

    /// Render `url` in a tab that is closed on every path.
    pub async fn render(&self, url: &Url) -> Result<CapturedPage> {
        let tab = self.tabs.open(url).await?;
        let captured = self.render_in_tab(&tab).await;
        if let Err(e) = self.tabs.close(tab).await {
            warn!(error = %e, "failed to close tab");
        }
        captured
    }

    async fn extract_via_tab(&self, url: &Url, selector: Option<&str>) -> Result<PageExtraction> {
        let page = self.render(url).await?;
        match self.parse(page.html, page.url, selector, ExtractPath::Tab).await? {
            Attempt::Done(found) => Ok(found),
            Attempt::Fallback(e) => Err(e),
        }
    }
}

#[async_trait]
impl PageSource for FallbackController {
    #[instrument(skip_all, fields(url = %url))]
    async fn extract(&self, url: &Url, selector: Option<&str>) -> Result<PageExtraction> {
        if selector.is_none() && !self.options.detect_on_check {
            return Err(Error::NeedsSelector);
        }
        match self.extract_via_fetch(url, selector).await {
            Ok(Attempt::Done(found)) => {
                debug!(posts = found.posts.len(), "extracted via fetch");
                return Ok(found);
            }
            Ok(Attempt::Fallback(reason)) => info!(%reason, "falling back to rendered tab"),
            Err(Error::NeedsLogin) => return Err(Error::NeedsLogin),
            Err(e) => info!(error = %e, "fetch failed, falling back to rendered tab"),
        }
        self.extract_via_tab(url, selector).await
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn detect(&self, url: &Url) -> Result<Option<Candidate>> {
        let worker = self.worker.get().await?;
        match fetch_page(&self.client, url).await {
            Ok(page) => {
                if let Some(found) = worker.detect(page.html).await? {
                    return Ok(Some(found));
                }
                info!("nothing detected in fetched page, rendering");
            }
            Err(e) => info!(error = %e, "fetch failed, rendering"),
        }
        let page = self.render(url).await?;
        worker.detect(page.html).await
    }
}

