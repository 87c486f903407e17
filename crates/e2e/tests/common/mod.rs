//! Shared fixtures: an in-process HTTP server and a scripted page
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use sitecheck_common::config::SelectorConfig;
use sitecheck_common::{HarnessConfig, Target};
use sitecheck_e2e::{
    ConsoleMessage, DialogEvent, E2eError, E2eResult, Page, PageEvent, PageEventKind,
};

/// Serve `/ok` (200), `/missing` (404), `/moved` (301 to /ok) and `/error` (500)
/// on an ephemeral port. Returns the base URL without a trailing slash.
pub async fn spawn_fixture_server() -> String {
    let app = Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/moved",
            get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/ok")]) }),
        )
        .route("/error", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A URL nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}

/// Harness config with timeouts small enough for tests
pub fn fast_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.site.base_url = "https://shop.test/".to_string();
    config.timeouts.settle_ms = 20;
    config.timeouts.suggestions_ms = 300;
    config.timeouts.no_results_ms = 150;
    config.timeouts.clear_ms = 150;
    config.timeouts.clear_settle_ms = 5;
    config.timeouts.sweep_settle_ms = 5;
    config.timeouts.keystroke_delay_ms = 1;
    config.timeouts.poll_interval_ms = 5;
    config
}

/// How the scripted page reacts to input
#[derive(Debug, Clone)]
pub struct Behaviour {
    /// All-digit input of at least 3 characters opens the suggestion list
    pub suggests: bool,
    /// Other non-empty input shows the "no store found" message
    pub shows_no_results: bool,
    /// Quotes in the input log a database error and put it in the page
    pub leaks_sql: bool,
    /// Script-like input opens an alert
    pub executes_script: bool,
    /// Input at least this long takes the page down
    pub crashes_over: Option<usize>,
    pub clear_button: bool,
    /// Clicking the clear control actually empties the input
    pub clear_works: bool,
    /// Console errors emitted on every reload
    pub console_on_reload: Vec<String>,
    pub footer_hrefs: Vec<String>,
    /// `(onclick, aria-label)` per `javascript:void(0)` anchor
    pub void_links: Vec<(Option<String>, Option<String>)>,
    pub app_store_href: Option<String>,
    pub play_store_href: Option<String>,
    /// Filling exactly this payload times out in the driver
    pub fill_fails_on: Option<String>,
    /// Reading the input's value fails
    pub input_unreadable: bool,
    /// Suggestions stop opening once this many payloads were entered
    pub suggests_for_inputs: Option<usize>,
    /// Extra console lines logged per input, enough to overrun observers
    pub console_noise: usize,
    /// Reading the href of this footer anchor fails
    pub footer_read_fails_at: Option<usize>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            suggests: true,
            shows_no_results: true,
            leaks_sql: false,
            executes_script: false,
            crashes_over: None,
            clear_button: true,
            clear_works: true,
            console_on_reload: vec![],
            footer_hrefs: vec![],
            void_links: vec![],
            app_store_href: None,
            play_store_href: None,
            fill_fails_on: None,
            input_unreadable: false,
            suggests_for_inputs: None,
            console_noise: 0,
            footer_read_fails_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    value: String,
    url: String,
    body_visible: bool,
    /// Payloads entered so far
    inputs: usize,
}

static NEXT_PAGE: AtomicU64 = AtomicU64::new(1);

/// In-memory `Page` that behaves like a store search page
pub struct FakePage {
    id: u64,
    events: broadcast::Sender<PageEvent>,
    selectors: SelectorConfig,
    behaviour: Behaviour,
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::with(Behaviour::default())
    }

    pub fn with(behaviour: Behaviour) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            id: NEXT_PAGE.fetch_add(1, Ordering::Relaxed),
            events,
            selectors: SelectorConfig::default(),
            behaviour,
            state: Mutex::new(FakeState {
                body_visible: true,
                ..Default::default()
            }),
        }
    }

    pub fn value(&self) -> String {
        self.state.lock().value.clone()
    }

    fn emit(&self, kind: PageEventKind) {
        let _ = self.events.send(PageEvent { page: self.id, kind });
    }

    fn console(&self, level: &str, text: &str) {
        self.emit(PageEventKind::Console(ConsoleMessage {
            level: level.to_string(),
            text: text.to_string(),
        }));
    }

    fn on_input(&self, value: &str) {
        self.state.lock().inputs += 1;
        self.console("log", &format!("search: {}", value));
        for i in 0..self.behaviour.console_noise {
            self.console("log", &format!("analytics beacon {}", i));
        }

        if self.behaviour.leaks_sql && value.contains('\'') {
            self.console("error", "SQL syntax error: database query failed near 'OR'");
        }
        if self.behaviour.executes_script && (value.contains("<script>") || value.contains("onerror")) {
            self.emit(PageEventKind::Dialog(DialogEvent {
                kind: "alert".to_string(),
                message: "XSS".to_string(),
            }));
        }
        if let Some(limit) = self.behaviour.crashes_over {
            if value.len() >= limit {
                self.state.lock().body_visible = false;
            }
        }
    }

    fn suggestions_open(&self, state: &FakeState) -> bool {
        let value = &state.value;
        let still_suggesting = self
            .behaviour
            .suggests_for_inputs
            .map_or(true, |limit| state.inputs <= limit);
        self.behaviour.suggests
            && still_suggesting
            && value.len() >= 3
            && value.chars().all(|c| c.is_ascii_digit())
    }

    fn no_results_shown(&self, state: &FakeState) -> bool {
        self.behaviour.shows_no_results && !state.value.trim().is_empty() && !self.suggestions_open(state)
    }

    fn anchor_kind(target: &Target) -> &'static str {
        let selector = target.primary.to_string();
        if selector.contains("javascript:void(0)") {
            "void"
        } else if selector.contains("play.google.com") {
            "play"
        } else if selector.contains("apple.com") {
            "apple"
        } else if selector.starts_with("footer") {
            "footer"
        } else {
            "other"
        }
    }
}

#[async_trait]
impl Page for FakePage {
    fn id(&self) -> u64 {
        self.id
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.value.clear();
        state.body_visible = true;
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        self.state.lock().body_visible = true;
        for text in &self.behaviour.console_on_reload {
            self.console("error", text);
        }
        Ok(())
    }

    async fn fill(&self, target: &Target, value: &str) -> E2eResult<()> {
        if self.behaviour.fill_fails_on.as_deref() == Some(value) {
            return Err(E2eError::Playwright("Timeout 10000ms exceeded".to_string()));
        }
        if target == &self.selectors.search_box {
            self.state.lock().value = value.to_string();
            self.on_input(value);
        }
        Ok(())
    }

    async fn clear(&self, target: &Target) -> E2eResult<()> {
        if target == &self.selectors.search_box {
            self.state.lock().value.clear();
        }
        Ok(())
    }

    async fn press_sequentially(&self, target: &Target, text: &str, delay: Duration) -> E2eResult<()> {
        for ch in text.chars() {
            if target == &self.selectors.search_box {
                self.state.lock().value.push(ch);
            }
            tokio::time::sleep(delay).await;
        }
        let value = self.value();
        self.on_input(&value);
        Ok(())
    }

    async fn input_value(&self, _target: &Target) -> E2eResult<String> {
        if self.behaviour.input_unreadable {
            return Err(E2eError::Playwright("element is not an <input>".to_string()));
        }
        Ok(self.value())
    }

    async fn is_visible(&self, target: &Target) -> E2eResult<bool> {
        let state = self.state.lock();
        let s = &self.selectors;
        Ok(if target.primary.to_string() == s.body {
            state.body_visible
        } else if target == &s.suggestions {
            state.body_visible && self.suggestions_open(&state)
        } else if target == &s.no_results {
            state.body_visible && self.no_results_shown(&state)
        } else if target == &s.clear_button {
            self.behaviour.clear_button && !state.value.is_empty()
        } else {
            target == &s.search_box
        })
    }

    async fn click(&self, target: &Target) -> E2eResult<()> {
        if target == &self.selectors.clear_button && self.behaviour.clear_works {
            self.state.lock().value.clear();
        }
        Ok(())
    }

    async fn count(&self, target: &Target) -> E2eResult<usize> {
        if target == &self.selectors.suggestion_items {
            let state = self.state.lock();
            return Ok(if self.suggestions_open(&state) { 3 } else { 0 });
        }
        Ok(match Self::anchor_kind(target) {
            "void" => self.behaviour.void_links.len(),
            "play" => self.behaviour.play_store_href.iter().count(),
            "apple" => self.behaviour.app_store_href.iter().count(),
            "footer" => self.behaviour.footer_hrefs.len(),
            _ => 0,
        })
    }

    async fn attribute(&self, target: &Target, nth: usize, name: &str) -> E2eResult<Option<String>> {
        let b = &self.behaviour;
        if Self::anchor_kind(target) == "footer" && b.footer_read_fails_at == Some(nth) {
            return Err(E2eError::Playwright(format!("footer anchor {} detached", nth)));
        }
        Ok(match (Self::anchor_kind(target), name) {
            ("footer", "href") => b.footer_hrefs.get(nth).cloned(),
            ("play", "href") => b.play_store_href.clone(),
            ("apple", "href") => b.app_store_href.clone(),
            ("void", "href") => Some("javascript:void(0)".to_string()),
            ("void", "onclick") => b.void_links.get(nth).and_then(|(onclick, _)| onclick.clone()),
            ("void", "aria-label") => b.void_links.get(nth).and_then(|(_, label)| label.clone()),
            _ => None,
        })
    }

    async fn content(&self) -> E2eResult<String> {
        let value = self.value();
        Ok(if self.behaviour.leaks_sql && value.contains('\'') {
            "<html><body><pre>SQL error: unterminated quoted string</pre></body></html>".to_string()
        } else {
            "<html><body><p>NO STORE FOUND FOR SEARCH TERM</p></body></html>".to_string()
        })
    }

    async fn url(&self) -> E2eResult<String> {
        Ok(self.state.lock().url.clone())
    }
}
