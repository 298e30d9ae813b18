//! Rendered-tab extraction path.
//!
//! Client-rendered pages produce nothing under fetch-and-parse. For those the
//! controller opens a real (headless) browser tab, waits for it to load,
//! captures the live DOM and closes the tab again. [`TabDriver`] is the seam;
//! [`HeadlessBrowser`] drives a Chromium-compatible binary with `--dump-dom`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// An open tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabHandle {
    /// Driver-assigned id.
    pub id: u64,
    /// URL the tab was opened with.
    pub url: Url,
}

/// DOM captured from a loaded tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPage {
    /// Serialized live DOM.
    pub html: String,
    /// Document URL after redirects.
    pub url: Url,
}

/// Browser tab operations used by the fallback path.
#[async_trait]
pub trait TabDriver: Send + Sync {
    /// Open a background tab on `url`.
    async fn open(&self, url: &Url) -> Result<TabHandle>;

    /// Resolve once the tab reports load completion.
    ///
    /// Callers bound this with their own timeout.
    async fn wait_for_load(&self, tab: &TabHandle) -> Result<()>;

    /// Serialize the tab's current DOM.
    async fn capture(&self, tab: &TabHandle) -> Result<CapturedPage>;

    /// Close the tab. Must be safe to call after a failed or timed-out load.
    async fn close(&self, tab: TabHandle) -> Result<()>;
}

/// Headless Chromium driven through its `--dump-dom` mode.
///
/// Each "tab" is one browser process. Loading runs the process to
/// completion; the process is killed if the wait is cancelled.
#[derive(Debug)]
pub struct HeadlessBrowser {
    command: String,
    args: Vec<String>,
    next_id: AtomicU64,
    pages: Mutex<HashMap<u64, Option<String>>>,
}

impl HeadlessBrowser {
    /// Default flags passed before the URL.
    pub const DEFAULT_ARGS: &'static [&'static str] = &["--headless", "--disable-gpu", "--dump-dom"];

    /// Driver for `command`, e.g. `chromium`.
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            next_id: AtomicU64::new(1),
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Driver with [`Self::DEFAULT_ARGS`].
    #[must_use]
    pub fn with_default_args(command: impl Into<String>) -> Self {
        Self::new(command, Self::DEFAULT_ARGS.iter().map(ToString::to_string).collect())
    }

    /// Number of tabs not yet closed.
    pub async fn open_tabs(&self) -> usize {
        self.pages.lock().await.len()
    }
}

#[async_trait]
impl TabDriver for HeadlessBrowser {
    async fn open(&self, url: &Url) -> Result<TabHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pages.lock().await.insert(id, None);
        Ok(TabHandle { id, url: url.clone() })
    }

    async fn wait_for_load(&self, tab: &TabHandle) -> Result<()> {
        debug!(command = %self.command, url = %tab.url, "rendering page");
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(tab.url.as_str())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::RenderError(format!("failed to spawn {}: {e}", self.command)))?;

        if !output.status.success() {
            return Err(Error::RenderError(format!(
                "{} exited with status {}",
                self.command, output.status
            )));
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        match self.pages.lock().await.get_mut(&tab.id) {
            Some(slot) => {
                *slot = Some(html);
                Ok(())
            }
            None => Err(Error::RenderError(format!("tab {} is closed", tab.id))),
        }
    }

    async fn capture(&self, tab: &TabHandle) -> Result<CapturedPage> {
        let pages = self.pages.lock().await;
        match pages.get(&tab.id) {
            Some(Some(html)) => Ok(CapturedPage { html: html.clone(), url: tab.url.clone() }),
            Some(None) => Err(Error::RenderError(format!("tab {} has not loaded", tab.id))),
            None => Err(Error::RenderError(format!("tab {} is closed", tab.id))),
        }
    }

    async fn close(&self, tab: TabHandle) -> Result<()> {
        self.pages.lock().await.remove(&tab.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_render_error_and_tab_closes() {
        let browser = HeadlessBrowser::with_default_args("catchup-no-such-browser");
        let url = Url::parse("https://example.com/").unwrap();
        let tab = browser.open(&url).await.unwrap();
        assert_eq!(browser.open_tabs().await, 1);

        let err = browser.wait_for_load(&tab).await.unwrap_err();
        assert!(matches!(err, Error::RenderError(_)));
        assert!(browser.capture(&tab).await.is_err());

        browser.close(tab).await.unwrap();
        assert_eq!(browser.open_tabs().await, 0);
    }
}
