//! Page abstraction the auditor and the fuzz harness drive
//!
//! [`BrowserSession`](crate::playwright::BrowserSession) implements it on top of
//! the Playwright driver. Every method is a single bounded request; waiting for
//! a UI state is done by the caller polling [`Page::is_visible`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

use sitecheck_common::Target;

use crate::error::E2eResult;

/// A console message emitted by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Playwright message type: "log", "warning", "error", ...
    pub level: String,
    pub text: String,
}

impl ConsoleMessage {
    pub fn is_error(&self) -> bool {
        self.level == "error"
    }
}

/// A native dialog (alert / confirm / prompt / beforeunload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogEvent {
    pub kind: String,
    pub message: String,
}

impl std::fmt::Display for DialogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?})", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEventKind {
    Console(ConsoleMessage),
    Dialog(DialogEvent),
}

/// Event observed on a page, tagged with the page it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEvent {
    pub page: u64,
    pub kind: PageEventKind,
}

/// One open page in its own browser context
#[async_trait]
pub trait Page: Send + Sync {
    /// Identifier used to tag this page's events
    fn id(&self) -> u64;

    /// Subscribe to console and dialog events. Events emitted before the
    /// call are not delivered.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Navigate and wait for network idle
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Reload and wait for network idle
    async fn reload(&self) -> E2eResult<()>;

    /// Replace the element's value in one step
    async fn fill(&self, target: &Target, value: &str) -> E2eResult<()>;

    async fn clear(&self, target: &Target) -> E2eResult<()>;

    /// Type `text` one character at a time with `delay` between keys
    async fn press_sequentially(&self, target: &Target, text: &str, delay: Duration)
        -> E2eResult<()>;

    async fn input_value(&self, target: &Target) -> E2eResult<String>;

    /// Whether the first match is visible right now (false when nothing matches)
    async fn is_visible(&self, target: &Target) -> E2eResult<bool>;

    async fn click(&self, target: &Target) -> E2eResult<()>;

    /// Number of elements matching the target
    async fn count(&self, target: &Target) -> E2eResult<usize>;

    /// Attribute of the `nth` match, `None` when absent
    async fn attribute(&self, target: &Target, nth: usize, name: &str)
        -> E2eResult<Option<String>>;

    /// Serialized HTML of the whole page
    async fn content(&self) -> E2eResult<String>;

    async fn url(&self) -> E2eResult<String>;
}
