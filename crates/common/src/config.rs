//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::parse_absolute_url;

/// Harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Site under test
    pub site: SiteConfig,

    /// Element selectors on the site
    pub selectors: SelectorConfig,

    /// Wait budgets
    pub timeouts: TimeoutConfig,

    /// Assertion policy
    pub policy: PolicyConfig,

    /// HTTP client settings for link probes
    pub http: HttpConfig,

    /// Browser driver settings
    pub browser: BrowserConfig,
}

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Absolute base URL; scenario page paths are joined onto it
    pub base_url: String,

    /// Path of the store locator page
    pub store_finder_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.dominos.com.au/".to_string(),
            store_finder_path: "/store-finder/".to_string(),
        }
    }
}

/// How to find an element: a Playwright locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// Accessible role, optionally with accessible name and a text regex filter
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_text: Option<String>,
    },
    /// CSS / Playwright selector string
    Css { selector: String },
    /// Case-insensitive substring of visible text
    Text { text: String },
}

impl Locator {
    pub fn role(role: &str, name: &str) -> Self {
        Locator::Role {
            role: role.to_string(),
            name: Some(name.to_string()),
            has_text: None,
        }
    }

    pub fn css(selector: &str) -> Self {
        Locator::Css {
            selector: selector.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        Locator::Text {
            text: text.to_string(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Role { role, name, .. } => match name {
                Some(name) => write!(f, "role={}[name=\"{}\"]", role, name),
                None => write!(f, "role={}", role),
            },
            Locator::Css { selector } => write!(f, "{}", selector),
            Locator::Text { text } => write!(f, "text={}", text),
        }
    }
}

/// A locator with an optional fallback used when the primary matches nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub primary: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Locator>,
}

impl Target {
    pub fn new(primary: Locator) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn or(mut self, fallback: Locator) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fallback {
            Some(fallback) => write!(f, "{} (fallback: {})", self.primary, fallback),
            None => write!(f, "{}", self.primary),
        }
    }
}

/// Selectors for the elements the harness touches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub search_box: Target,
    pub clear_button: Target,
    /// Marker shown while the suggestion list is open
    pub suggestions: Target,
    /// Individual suggestion rows
    pub suggestion_items: Target,
    pub no_results: Target,
    pub footer: String,
    pub body: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            search_box: Target::new(Locator::role("textbox", "Enter postcode, suburb or store name"))
                .or(Locator::css("input[placeholder*=\"postcode\" i]")),
            clear_button: Target::new(Locator::role("img", "Clear search"))
                .or(Locator::css("[aria-label=\"Clear search\"]")),
            suggestions: Target::new(Locator::text("Address Suggestion")),
            suggestion_items: Target::new(Locator::Role {
                role: "listitem".to_string(),
                name: None,
                has_text: Some("Street|Avenue|Parade".to_string()),
            }),
            no_results: Target::new(Locator::text("no store found")),
            footer: "footer".to_string(),
            body: "body".to_string(),
        }
    }
}

/// Wait budgets in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Settle time for cases that do not await a specific state
    pub settle_ms: u64,

    /// Upper bound for the suggestion list, measured from the first keystroke
    pub suggestions_ms: u64,

    /// Upper bound for the "no results" message
    pub no_results_ms: u64,

    /// Upper bound for the clear control to appear
    pub clear_ms: u64,

    /// Delay between the fill and looking for the clear control
    pub clear_settle_ms: u64,

    /// Pause after each payload in a leakage sweep
    pub sweep_settle_ms: u64,

    /// Delay between keystrokes in keystroke mode
    pub keystroke_delay_ms: u64,

    /// Navigation and network-idle bound
    pub navigation_ms: u64,

    /// Bound on any single driver request
    pub driver_request_ms: u64,

    /// Polling interval while awaiting a UI state
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            settle_ms: 2000,
            suggestions_ms: 5000,
            no_results_ms: 3000,
            clear_ms: 2000,
            clear_settle_ms: 500,
            sweep_settle_ms: 1000,
            keystroke_delay_ms: 100,
            navigation_ms: 30_000,
            driver_request_ms: 45_000,
            poll_interval_ms: 100,
        }
    }
}

/// Assertion policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Terms that must never appear in console output (case-insensitive)
    pub banned_substrings: Vec<String>,

    /// Terms that must never appear in page content after an injection attempt
    pub error_markers: Vec<String>,

    /// Console errors containing any of these are ignored
    pub console_ignore: Vec<String>,

    /// Footer links probed per run
    pub footer_link_limit: usize,

    /// Domain App Store links must use
    pub app_store_domain: String,

    /// Domain App Store links must not use
    pub deprecated_app_store_domain: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            banned_substrings: ["database", "sql", "password", "secret", "token"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            error_markers: vec!["syntax error".to_string(), "sql error".to_string()],
            console_ignore: vec![
                "Application Insights".to_string(),
                "Attribution Reporting".to_string(),
            ],
            footer_link_limit: 20,
            app_store_domain: "apps.apple.com".to_string(),
            deprecated_app_store_domain: "itunes.apple.com".to_string(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("sitecheck/{}", crate::VERSION),
        }
    }
}

/// Browser kind launched by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chromium" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(Error::InvalidConfig(format!("unknown browser: {}", other))),
        }
    }
}

/// Browser driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Node.js binary used to run the driver script
    pub node_binary: PathBuf,

    /// Directory containing the `playwright` package, exported as NODE_PATH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            node_path: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        parse_absolute_url(&self.site.base_url)
            .map_err(|e| Error::InvalidConfig(format!("site.base_url: {}", e)))?;

        let t = &self.timeouts;
        for (name, value) in [
            ("settle_ms", t.settle_ms),
            ("suggestions_ms", t.suggestions_ms),
            ("no_results_ms", t.no_results_ms),
            ("clear_ms", t.clear_ms),
            ("navigation_ms", t.navigation_ms),
            ("driver_request_ms", t.driver_request_ms),
            ("poll_interval_ms", t.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("timeouts.{} must be non-zero", name)));
            }
        }

        if self.http.timeout_secs == 0 {
            return Err(Error::InvalidConfig("http.timeout_secs must be non-zero".to_string()));
        }
        if self.policy.app_store_domain.is_empty() {
            return Err(Error::InvalidConfig("policy.app_store_domain is empty".to_string()));
        }

        Ok(())
    }

    /// Resolve a scenario page path against the site base URL
    pub fn page_url(&self, path: &str) -> Result<url::Url> {
        let base = parse_absolute_url(&self.site.base_url)?;
        base.join(path).map_err(|e| Error::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Absolute URL of the store locator page
    pub fn store_finder_url(&self) -> Result<url::Url> {
        self.page_url(&self.site.store_finder_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timeouts.suggestions_ms, 5000);
        assert_eq!(config.policy.footer_link_limit, 20);
        assert!(config.policy.banned_substrings.contains(&"token".to_string()));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.site.store_finder_path, "/store-finder/");
    }

    #[test]
    fn test_save_then_load_keeps_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sitecheck.toml");

        let mut config = HarnessConfig::default();
        config.timeouts.suggestions_ms = 3000;
        config.browser.browser = BrowserKind::Firefox;
        config.save(&path).unwrap();

        let loaded = HarnessConfig::load(&path).unwrap();
        assert_eq!(loaded.timeouts.suggestions_ms, 3000);
        assert_eq!(loaded.browser.browser, BrowserKind::Firefox);
        assert_eq!(loaded.selectors.search_box, config.selectors.search_box);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
[site]
base_url = "http://127.0.0.1:8080/"

[timeouts]
settle_ms = 1500
"#,
        )
        .unwrap();
        assert_eq!(config.site.base_url, "http://127.0.0.1:8080/");
        assert_eq!(config.site.store_finder_path, "/store-finder/");
        assert_eq!(config.timeouts.settle_ms, 1500);
        assert_eq!(config.timeouts.no_results_ms, 3000);
    }

    #[test]
    fn test_validate_rejects_zero_timeout_and_relative_base() {
        let mut config = HarnessConfig::default();
        config.timeouts.suggestions_ms = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = HarnessConfig::default();
        config.site.base_url = "/relative".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_page_url_joins_path() {
        let config = HarnessConfig::default();
        assert_eq!(
            config.store_finder_url().unwrap().as_str(),
            "https://www.dominos.com.au/store-finder/"
        );
    }
}
