//! Core types for SiteCheck

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Accepted HTTP status codes, half-open `[min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl StatusRange {
    /// Exactly one status code
    pub const fn exact(status: u16) -> Self {
        Self {
            min: status,
            max: status.saturating_add(1),
        }
    }

    /// No status can satisfy the range
    pub fn is_empty(&self) -> bool {
        self.min >= self.max
    }

    /// Any success or redirect status (`200 <= s < 400`)
    pub const fn ok_or_redirect() -> Self {
        Self { min: 200, max: 400 }
    }

    pub fn contains(&self, status: u16) -> bool {
        status >= self.min && status < self.max
    }
}

impl std::fmt::Display for StatusRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.max.checked_sub(self.min) == Some(1) {
            write!(f, "{}", self.min)
        } else {
            write!(f, "[{}, {})", self.min, self.max)
        }
    }
}

/// Where a link comes from; decides its default status policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCategory {
    AppStore,
    PlayStore,
    Navigation,
    Social,
    Partner,
    Footer,
}

impl LinkCategory {
    /// Strict 200 for first-party and store links, redirects tolerated elsewhere
    pub fn default_range(&self) -> StatusRange {
        match self {
            LinkCategory::AppStore
            | LinkCategory::PlayStore
            | LinkCategory::Navigation
            | LinkCategory::Partner => StatusRange::exact(200),
            LinkCategory::Social | LinkCategory::Footer => StatusRange::ok_or_redirect(),
        }
    }
}

impl std::fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkCategory::AppStore => write!(f, "app_store"),
            LinkCategory::PlayStore => write!(f, "play_store"),
            LinkCategory::Navigation => write!(f, "navigation"),
            LinkCategory::Social => write!(f, "social"),
            LinkCategory::Partner => write!(f, "partner"),
            LinkCategory::Footer => write!(f, "footer"),
        }
    }
}

impl std::str::FromStr for LinkCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "app_store" => Ok(LinkCategory::AppStore),
            "play_store" => Ok(LinkCategory::PlayStore),
            "navigation" => Ok(LinkCategory::Navigation),
            "social" => Ok(LinkCategory::Social),
            "partner" => Ok(LinkCategory::Partner),
            "footer" => Ok(LinkCategory::Footer),
            other => Err(Error::InvalidCatalog(format!("unknown link category: {}", other))),
        }
    }
}

/// A single outbound link to probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Human label, used in failure messages
    pub name: String,
    pub url: Url,
    pub category: LinkCategory,
    pub expected: StatusRange,
}

impl LinkEntry {
    /// Build an entry with the category's default status range.
    ///
    /// Fails unless `url` is an absolute http(s) URL with a host.
    pub fn new(name: impl Into<String>, url: &str, category: LinkCategory) -> Result<Self> {
        let url = parse_absolute_url(url)?;
        Ok(Self {
            name: name.into(),
            url,
            category,
            expected: category.default_range(),
        })
    }

    pub fn with_expected(mut self, expected: StatusRange) -> Self {
        self.expected = expected;
        self
    }
}

/// Parse a URL and require an http(s) scheme and a host
pub fn parse_absolute_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}

/// How a payload is entered into the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Set the whole value at once
    #[default]
    BulkFill,
    /// Type one character at a time to trigger incremental search
    Keystroke,
}

/// What a fuzz case asserts once the page has settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    NoCrash,
    NoSqlErrorText,
    NoScriptExecution,
    ShowsNoResults,
    ShowsSuggestions,
    ClearsOnWhitespace,
    /// Exploratory: suggestions are optional, the page must not navigate away
    StaysOnPage,
}

impl Expectation {
    /// The UI state this expectation waits for, if any
    pub fn awaited_state(&self) -> Option<UiState> {
        match self {
            Expectation::ShowsSuggestions => Some(UiState::Suggestions),
            Expectation::ShowsNoResults => Some(UiState::NoResults),
            _ => None,
        }
    }

    pub fn default_timeout_policy(&self) -> TimeoutPolicy {
        match self {
            Expectation::ShowsSuggestions | Expectation::ShowsNoResults => TimeoutPolicy::Fail,
            _ => TimeoutPolicy::Warn,
        }
    }
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expectation::NoCrash => write!(f, "no_crash"),
            Expectation::NoSqlErrorText => write!(f, "no_sql_error_text"),
            Expectation::NoScriptExecution => write!(f, "no_script_execution"),
            Expectation::ShowsNoResults => write!(f, "shows_no_results"),
            Expectation::ShowsSuggestions => write!(f, "shows_suggestions"),
            Expectation::ClearsOnWhitespace => write!(f, "clears_on_whitespace"),
            Expectation::StaysOnPage => write!(f, "stays_on_page"),
        }
    }
}

/// Whether a missing UI state fails the case or is only logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    Fail,
    Warn,
}

/// One payload and the outcome expected for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzCase {
    pub name: String,
    pub input: String,
    pub expectation: Expectation,
    #[serde(default)]
    pub mode: InputMode,
    #[serde(default)]
    pub on_timeout: Option<TimeoutPolicy>,
}

impl FuzzCase {
    pub fn new(name: impl Into<String>, input: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expectation,
            mode: InputMode::BulkFill,
            on_timeout: None,
        }
    }

    pub fn with_mode(mut self, mode: InputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.on_timeout = Some(policy);
        self
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.on_timeout
            .unwrap_or_else(|| self.expectation.default_timeout_policy())
    }
}

/// A recognised settled state of the search widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    Suggestions,
    NoResults,
}

impl std::fmt::Display for UiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiState::Suggestions => write!(f, "suggestions"),
            UiState::NoResults => write!(f, "no results"),
        }
    }
}

/// What the page looked like once a fuzz case settled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSnapshot {
    /// `None` when nothing recognisable appeared before the deadline
    pub state: Option<UiState>,
    pub body_visible: bool,
    pub input_value: String,
    pub page_url: String,
    pub suggestion_count: usize,
    /// Time from the start of submission until the snapshot was taken
    pub elapsed_ms: u64,
}

/// The thing a probe examined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeTarget {
    Link(LinkEntry),
    Fuzz(FuzzCase),
    /// A page-level check, e.g. console errors on reload
    Page { name: String },
}

impl ProbeTarget {
    pub fn label(&self) -> &str {
        match self {
            ProbeTarget::Link(entry) => &entry.name,
            ProbeTarget::Fuzz(case) => &case.name,
            ProbeTarget::Page { name } => name,
        }
    }
}

/// What a probe observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Observation {
    Status(u16),
    Transport(String),
    Dom(DomSnapshot),
    Messages(Vec<String>),
    None,
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub observed: Observation,
    pub passed: bool,
    pub detail: String,
}

impl ProbeResult {
    pub fn pass(target: ProbeTarget, observed: Observation, detail: impl Into<String>) -> Self {
        Self {
            target,
            observed,
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(target: ProbeTarget, observed: Observation, detail: impl Into<String>) -> Self {
        Self {
            target,
            observed,
            passed: false,
            detail: detail.into(),
        }
    }
}
