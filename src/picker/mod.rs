//! Interactive Selection Mode
//!
//! A point-and-click alternative to automatic detection. The host feeds
//! pointer and keyboard events into a [`Picker`]; the picker highlights the
//! resolved post container (not the hovered leaf), and on click generates a
//! selector and validates that it repeats.
//!
//! ```text
//! Idle --start--> Selecting --click (valid)--> Idle  (PickedSelector)
//!                  |   ^
//!                  |   +-- click (no container / < 2 matches): toast, stay
//!                  +-- Escape / cancel --> Idle
//! ```
//!
//! Only one session may be active per [`SelectionSlot`]. The slot is held
//! through an RAII guard, so a dropped picker always frees it.
//!
//! ```rust
//! use rs_catchup::{dom, picker::{Picker, PickerEvent, PickerOutcome, SelectionSlot}, Options};
//!
//! let doc = dom::parse(r#"<ul class="threads">
//!     <li><a id="hit" href="/1">One</a></li><li><a href="/2">Two</a></li><li><a href="/3">Three</a></li>
//! </ul>"#);
//! let slot = SelectionSlot::new();
//! let mut picker = Picker::new(&doc, "https://example.com/", slot, &Options::default());
//! picker.start();
//!
//! match picker.handle(PickerEvent::Click(doc.select("#hit"))) {
//!     PickerOutcome::Picked(pick) => assert_eq!(pick.selector, ".threads > li"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dom_query::{Document, Selection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom;
use crate::Options;

pub mod container;

pub use container::{find_post_container, generate_selector};

/// Id of the banner injected while selecting.
pub const OVERLAY_ID: &str = "catchup-select-overlay";

/// Id of the cancel button inside the banner.
pub const CANCEL_BUTTON_ID: &str = "catchup-cancel-btn";

/// Class added to the hovered container.
pub const HIGHLIGHT_CLASS: &str = "catchup-highlight";

const OVERLAY_HTML: &str = r#"<div id="catchup-select-overlay"><div class="catchup-select-banner"><span>Click anywhere on a post (the highlighted area is selected)</span><button id="catchup-cancel-btn">Cancel</button></div></div>"#;

/// Process-wide "one selection session at a time" flag.
#[derive(Debug, Clone, Default)]
pub struct SelectionSlot {
    active: Arc<AtomicBool>,
}

impl SelectionSlot {
    /// Create a free slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot; `None` when a session is already running.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard { active: Arc::clone(&self.active) })
    }

    /// Whether a session holds the slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the slot on drop.
#[derive(Debug)]
pub struct SlotGuard {
    active: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Picker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    /// No listeners, no overlay.
    Idle,
    /// Listening for hover, click and Escape.
    Selecting,
}

/// Input events, delivered in capture order.
#[derive(Debug, Clone)]
pub enum PickerEvent<'a> {
    /// Pointer entered `target`.
    MouseOver(Selection<'a>),
    /// Pointer left the highlighted element towards `related`.
    MouseOut {
        /// Element the pointer moved to, if any.
        related: Option<Selection<'a>>,
    },
    /// Click on `target`.
    Click(Selection<'a>),
    /// Key press, named like `KeyboardEvent.key`.
    KeyDown(String),
    /// Explicit cancel from the host.
    Cancel,
}

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    /// Green toast.
    Success,
    /// Red toast.
    Error,
}

/// Inline message shown on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    /// Severity.
    pub kind: ToastKind,
    /// Text.
    pub message: String,
}

impl Toast {
    fn error(message: impl Into<String>) -> Self {
        Self { kind: ToastKind::Error, message: message.into() }
    }
}

/// A validated `(url, selector)` pair ready for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedSelector {
    /// Page the selector was picked on.
    pub url: String,
    /// Generated selector.
    pub selector: String,
    /// Live match count at pick time.
    pub match_count: usize,
}

/// What an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    /// Session started.
    Started,
    /// Another session holds the slot.
    AlreadyActive,
    /// Event had no effect.
    Ignored,
    /// A container is now highlighted.
    Highlighted,
    /// The highlight was removed.
    Cleared,
    /// An error toast was shown; still selecting.
    Toast(Toast),
    /// Selection finished; the picker is idle again.
    Picked(PickedSelector),
    /// Session cancelled.
    Stopped,
}

/// One interactive selection session over a document.
pub struct Picker<'a> {
    doc: &'a Document,
    page_url: String,
    slot: SelectionSlot,
    guard: Option<SlotGuard>,
    hovered: Option<Selection<'a>>,
    min_matches: usize,
}

impl<'a> Picker<'a> {
    /// Create an idle picker.
    #[must_use]
    pub fn new(doc: &'a Document, page_url: impl Into<String>, slot: SelectionSlot, options: &Options) -> Self {
        Self {
            doc,
            page_url: page_url.into(),
            slot,
            guard: None,
            hovered: None,
            min_matches: options.min_selector_matches,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PickerState {
        if self.guard.is_some() {
            PickerState::Selecting
        } else {
            PickerState::Idle
        }
    }

    /// Currently highlighted container.
    #[must_use]
    pub fn hovered(&self) -> Option<&Selection<'a>> {
        self.hovered.as_ref()
    }

    /// Enter selecting mode and inject the banner.
    pub fn start(&mut self) -> PickerOutcome {
        if self.guard.is_some() {
            return PickerOutcome::Ignored;
        }
        let Some(guard) = self.slot.try_acquire() else {
            return PickerOutcome::AlreadyActive;
        };
        self.guard = Some(guard);
        dom::append_html(&self.doc.select("body"), OVERLAY_HTML);
        debug!(url = %self.page_url, "selection mode started");
        PickerOutcome::Started
    }

    /// Leave selecting mode, removing highlight and banner.
    pub fn stop(&mut self) -> PickerOutcome {
        if self.guard.is_none() {
            return PickerOutcome::Ignored;
        }
        if let Some(hovered) = self.hovered.take() {
            dom::remove_class(&hovered, HIGHLIGHT_CLASS);
        }
        dom::remove(&self.doc.select(&format!("#{OVERLAY_ID}")));
        self.guard = None;
        PickerOutcome::Stopped
    }

    /// Feed one event.
    pub fn handle(&mut self, event: PickerEvent<'a>) -> PickerOutcome {
        if self.guard.is_none() {
            return PickerOutcome::Ignored;
        }
        match event {
            PickerEvent::MouseOver(target) => self.on_mouse_over(&target),
            PickerEvent::MouseOut { related } => self.on_mouse_out(related.as_ref()),
            PickerEvent::Click(target) => self.on_click(&target),
            PickerEvent::KeyDown(key) if key == "Escape" => self.stop(),
            PickerEvent::KeyDown(_) => PickerOutcome::Ignored,
            PickerEvent::Cancel => self.stop(),
        }
    }

    fn in_overlay(target: &Selection) -> bool {
        dom::self_and_ancestors(target).any(|s| dom::id(&s).as_deref() == Some(OVERLAY_ID))
    }

    fn on_mouse_over(&mut self, target: &Selection<'a>) -> PickerOutcome {
        if Self::in_overlay(target) {
            return PickerOutcome::Ignored;
        }
        let Some(container) = find_post_container(self.doc, target) else {
            return PickerOutcome::Ignored;
        };

        if let Some(previous) = &self.hovered {
            if dom::node_id(previous) != dom::node_id(&container) {
                dom::remove_class(previous, HIGHLIGHT_CLASS);
            }
        }
        dom::add_class(&container, HIGHLIGHT_CLASS);
        self.hovered = Some(container);
        PickerOutcome::Highlighted
    }

    fn on_mouse_out(&mut self, related: Option<&Selection<'a>>) -> PickerOutcome {
        let Some(hovered) = &self.hovered else {
            return PickerOutcome::Ignored;
        };
        if related.is_some_and(|r| dom::contains(hovered, r)) {
            return PickerOutcome::Ignored;
        }
        dom::remove_class(hovered, HIGHLIGHT_CLASS);
        PickerOutcome::Cleared
    }

    fn on_click(&mut self, target: &Selection<'a>) -> PickerOutcome {
        if dom::self_and_ancestors(target).any(|s| dom::id(&s).as_deref() == Some(CANCEL_BUTTON_ID)) {
            return self.stop();
        }
        if Self::in_overlay(target) {
            return PickerOutcome::Ignored;
        }

        let Some(container) = find_post_container(self.doc, target) else {
            return PickerOutcome::Toast(Toast::error(
                "Could not find a post area here. Click somewhere else.",
            ));
        };

        let selector = generate_selector(self.doc, &container);
        let match_count = dom::count_matches(self.doc, &selector);
        if match_count < self.min_matches {
            debug!(%selector, match_count, "picked selector rejected");
            return PickerOutcome::Toast(Toast::error(format!(
                "insufficient matches: only {match_count} post(s) found. Pick another element."
            )));
        }

        let picked = PickedSelector { url: self.page_url.clone(), selector, match_count };
        self.stop();
        PickerOutcome::Picked(picked)
    }
}

impl Drop for Picker<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}
