//! Isolated parsing context.
//!
//! `dom_query` documents are not `Send`, so every parse happens on one
//! dedicated OS thread that owns them for their whole life. Async callers
//! talk to it over an mpsc channel and get their answer on a oneshot. A panic
//! inside a job is caught on the worker thread and comes back as
//! [`Error::WorkerError`]; it never crosses the boundary.
//!
//! [`SharedParseWorker`] starts the thread lazily. Concurrent first callers
//! all await the same in-flight start, so at most one worker is created.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::{mpsc, oneshot, OnceCell};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::extractor::{self, Extraction};
use crate::selector::{self, Candidate};
use crate::{dom, Options};

const QUEUE_DEPTH: usize = 32;

/// Detection followed by extraction with the winning selector.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoExtraction {
    /// Winning candidate, if any reached the threshold.
    pub candidate: Option<Candidate>,
    /// Extraction with the candidate's selector; `None` without a candidate.
    pub extraction: Option<Extraction>,
}

enum ParseRequest {
    Extract {
        html: String,
        selector: String,
        page_url: Url,
        reply: oneshot::Sender<Result<Extraction>>,
    },
    Detect {
        html: String,
        reply: oneshot::Sender<Result<Option<Candidate>>>,
    },
    DetectAndExtract {
        html: String,
        page_url: Url,
        reply: oneshot::Sender<Result<AutoExtraction>>,
    },
}

fn guarded<T>(job: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(job)).map_err(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(%reason, "parse job panicked");
        Error::WorkerError(format!("parse job panicked: {reason}"))
    })
}

fn detect_and_extract(html: &str, page_url: &Url, options: &Options) -> AutoExtraction {
    let doc = dom::parse(html);
    let candidate = selector::detect(&doc, options);
    let extraction = candidate
        .as_ref()
        .map(|c| extractor::extract(&doc, &c.selector, page_url, options));
    AutoExtraction { candidate, extraction }
}

fn serve(request: ParseRequest, options: &Options) {
    // A dropped receiver means the caller gave up; nothing to report.
    match request {
        ParseRequest::Extract { html, selector, page_url, reply } => {
            let result = guarded(|| extractor::extract_html(&html, &selector, &page_url, options));
            let _ = reply.send(result);
        }
        ParseRequest::Detect { html, reply } => {
            let result = guarded(|| selector::detect_html(&html, options));
            let _ = reply.send(result);
        }
        ParseRequest::DetectAndExtract { html, page_url, reply } => {
            let result = guarded(|| detect_and_extract(&html, &page_url, options));
            let _ = reply.send(result);
        }
    }
}

/// Handle to the parse thread. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ParseWorker {
    tx: mpsc::Sender<ParseRequest>,
}

impl std::fmt::Debug for ParseRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Extract { .. } => "Extract",
            Self::Detect { .. } => "Detect",
            Self::DetectAndExtract { .. } => "DetectAndExtract",
        };
        f.write_str(kind)
    }
}

impl ParseWorker {
    /// Start the worker thread. It exits when the last handle is dropped.
    pub fn spawn(options: Options) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<ParseRequest>(QUEUE_DEPTH);
        std::thread::Builder::new()
            .name("catchup-parse".to_string())
            .spawn(move || {
                debug!("parse worker started");
                while let Some(request) = rx.blocking_recv() {
                    serve(request, &options);
                }
                debug!("parse worker stopped");
            })
            .map_err(|e| Error::WorkerError(format!("failed to start parse worker: {e}")))?;
        Ok(Self { tx })
    }

    async fn call<T>(&self, request: ParseRequest, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        self.tx
            .send(request)
            .await
            .map_err(|_| Error::WorkerError("parse worker is gone".to_string()))?;
        rx.await
            .map_err(|_| Error::WorkerError("parse worker dropped the request".to_string()))?
    }

    /// Parse `html` and extract records with `selector`.
    pub async fn extract(&self, html: String, selector: String, page_url: Url) -> Result<Extraction> {
        let (reply, rx) = oneshot::channel();
        self.call(ParseRequest::Extract { html, selector, page_url, reply }, rx).await
    }

    /// Parse `html` and detect its post selector.
    pub async fn detect(&self, html: String) -> Result<Option<Candidate>> {
        let (reply, rx) = oneshot::channel();
        self.call(ParseRequest::Detect { html, reply }, rx).await
    }

    /// Detect and extract on a single parse of `html`.
    pub async fn detect_and_extract(&self, html: String, page_url: Url) -> Result<AutoExtraction> {
        let (reply, rx) = oneshot::channel();
        self.call(ParseRequest::DetectAndExtract { html, page_url, reply }, rx).await
    }
}

/// Lazily started, process-wide parse worker.
#[derive(Debug, Default)]
pub struct SharedParseWorker {
    options: Options,
    cell: OnceCell<ParseWorker>,
}

impl SharedParseWorker {
    /// Create the holder; the thread starts on first use.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self { options, cell: OnceCell::new() }
    }

    /// Get the worker, starting it if needed.
    pub async fn get(&self) -> Result<&ParseWorker> {
        self.cell
            .get_or_try_init(|| async { ParseWorker::spawn(self.options.clone()) })
            .await
    }

    /// Whether the worker thread has been started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_turns_panic_into_error() {
        let result: Result<()> = guarded(|| panic!("boom"));
        match result {
            Err(Error::WorkerError(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn shared_worker_starts_once() {
        let shared = SharedParseWorker::new(Options::default());
        assert!(!shared.is_started());
        let (a, b) = tokio::join!(shared.get(), shared.get());
        assert!(a.is_ok() && b.is_ok());
        assert!(shared.is_started());
    }
}
