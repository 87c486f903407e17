//! Search-input fuzz harness
//!
//! Each case walks `Idle -> Filled -> Settled -> Asserted -> Idle`:
//! the input is cleared and the payload submitted, the page gets a bounded
//! time to settle, then the collected observations are judged without any
//! further waiting. Safety checks (page still alive, no sensitive console
//! output, no native dialog) apply to every case regardless of its
//! expectation.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use sitecheck_common::config::{PolicyConfig, SelectorConfig, TimeoutConfig};
use sitecheck_common::{
    DomSnapshot, Expectation, FuzzCase, HarnessConfig, InputMode, Observation, ProbeResult,
    ProbeTarget, Target, TimeoutPolicy, UiState,
};

use crate::error::E2eResult;
use crate::observer::PageObserver;
use crate::page::{DialogEvent, Page};

/// Where a fuzz case is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Idle,
    Filled,
    Settled,
    Asserted,
}

impl CaseState {
    pub fn next(self) -> Self {
        match self {
            CaseState::Idle => CaseState::Filled,
            CaseState::Filled => CaseState::Settled,
            CaseState::Settled => CaseState::Asserted,
            CaseState::Asserted => CaseState::Idle,
        }
    }
}

/// Outcome of judging one settled case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub failures: Vec<String>,
    /// Soft signals logged but not failing the case
    pub warnings: Vec<String>,
}

impl Verdict {
    pub fn detail(&self) -> String {
        if self.failures.is_empty() {
            if self.warnings.is_empty() {
                "ok".to_string()
            } else {
                format!("ok ({})", self.warnings.join("; "))
            }
        } else {
            self.failures.join("; ")
        }
    }
}

/// Everything collected for a case once the page settled
pub struct CaseObservation<'a> {
    pub snapshot: &'a DomSnapshot,
    pub console_errors: &'a [String],
    pub dialogs: &'a [DialogEvent],
    /// Page events the observer lost to lag
    pub missed_events: u64,
    /// Page HTML, only fetched for cases that scan it
    pub content: Option<&'a str>,
    /// Budget the awaited state had, for messages
    pub budget: Duration,
}

/// The page's root element is still there
pub fn assert_no_crash(snapshot: &DomSnapshot) -> bool {
    snapshot.body_visible
}

/// Messages containing any banned term, compared case-insensitively
pub fn leaked_messages(messages: &[String], banned: &[String]) -> Vec<String> {
    messages
        .iter()
        .filter(|message| {
            let lower = message.to_lowercase();
            banned.iter().any(|term| lower.contains(&term.to_lowercase()))
        })
        .cloned()
        .collect()
}

pub fn assert_no_leakage(messages: &[String], banned: &[String]) -> bool {
    leaked_messages(messages, banned).is_empty()
}

/// No alert/confirm/prompt opened, i.e. no injected script ran
pub fn assert_no_script_execution(dialogs: &[DialogEvent]) -> bool {
    dialogs.is_empty()
}

/// Failure for an observer that lagged: dropped events can hide a dialog
fn missed_events_failure(missed: u64) -> Option<String> {
    (missed > 0).then(|| {
        format!(
            "observer missed {} page events; a dialog or console leak cannot be ruled out",
            missed
        )
    })
}

/// Judge a settled case. Pure: no page access, no waiting.
pub fn evaluate_case(
    case: &FuzzCase,
    observed: &CaseObservation<'_>,
    policy: &PolicyConfig,
    expected_path: &str,
) -> Verdict {
    let mut failures = Vec::new();
    let mut warnings = Vec::new();
    let snapshot = observed.snapshot;

    if !assert_no_crash(snapshot) {
        failures.push("page crashed: body is no longer visible".to_string());
    }
    let leaked = leaked_messages(observed.console_errors, &policy.banned_substrings);
    if !leaked.is_empty() {
        failures.push(format!("sensitive console output: {}", leaked.join(" | ")));
    }
    if !assert_no_script_execution(observed.dialogs) {
        let fired: Vec<String> = observed.dialogs.iter().map(|d| d.to_string()).collect();
        failures.push(format!("native dialog fired: {}", fired.join(", ")));
    }
    failures.extend(missed_events_failure(observed.missed_events));

    if let Some(awaited) = case.expectation.awaited_state() {
        if snapshot.state != Some(awaited) {
            let message = format!(
                "expected {} within {} ms, observed {}",
                awaited,
                observed.budget.as_millis(),
                snapshot
                    .state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "nothing".to_string())
            );
            match case.timeout_policy() {
                TimeoutPolicy::Fail => failures.push(message),
                TimeoutPolicy::Warn => warnings.push(message),
            }
        }
    }

    match case.expectation {
        Expectation::NoCrash | Expectation::NoScriptExecution | Expectation::ShowsNoResults => {}
        Expectation::NoSqlErrorText => {
            let content = observed.content.unwrap_or_default().to_lowercase();
            for marker in &policy.error_markers {
                if content.contains(&marker.to_lowercase()) {
                    failures.push(format!("page content contains '{}'", marker));
                }
            }
        }
        Expectation::ShowsSuggestions => {
            if snapshot.state == Some(UiState::Suggestions) && snapshot.suggestion_count == 0 {
                failures.push("suggestion list is open but has no address rows".to_string());
            }
        }
        Expectation::ClearsOnWhitespace => {
            let trimmed = snapshot.input_value.trim();
            if !trimmed.is_empty() {
                failures.push(format!(
                    "whitespace input left {:?} after trimming",
                    trimmed
                ));
            }
        }
        Expectation::StaysOnPage => {
            if !snapshot.page_url.contains(expected_path) {
                failures.push(format!(
                    "navigated away: {} does not contain '{}'",
                    snapshot.page_url, expected_path
                ));
            }
            warnings.push(format!(
                "suggestions shown: {}",
                snapshot.state == Some(UiState::Suggestions)
            ));
        }
    }

    Verdict {
        passed: failures.is_empty(),
        failures,
        warnings,
    }
}

/// Drives the search box through fuzz payloads
#[derive(Debug, Clone)]
pub struct FuzzHarness {
    selectors: SelectorConfig,
    timeouts: TimeoutConfig,
    policy: PolicyConfig,
    /// Path fragment the page URL must keep (e.g. "store-finder")
    expected_path: String,
}

impl FuzzHarness {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            selectors: config.selectors.clone(),
            timeouts: config.timeouts.clone(),
            policy: config.policy.clone(),
            expected_path: config.site.store_finder_path.trim_matches('/').to_string(),
        }
    }

    pub fn selectors(&self) -> &SelectorConfig {
        &self.selectors
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Clear the input, then enter `payload`
    pub async fn submit<P: Page + ?Sized>(
        &self,
        page: &P,
        target: &Target,
        payload: &str,
        mode: InputMode,
    ) -> E2eResult<()> {
        page.clear(target).await?;
        match mode {
            InputMode::BulkFill => page.fill(target, payload).await,
            InputMode::Keystroke => {
                page.press_sequentially(
                    target,
                    payload,
                    Self::ms(self.timeouts.keystroke_delay_ms),
                )
                .await
            }
        }
    }

    /// Which recognised state is showing right now, suggestions first
    async fn current_state<P: Page + ?Sized>(&self, page: &P) -> E2eResult<Option<UiState>> {
        if page.is_visible(&self.selectors.suggestions).await? {
            return Ok(Some(UiState::Suggestions));
        }
        if page.is_visible(&self.selectors.no_results).await? {
            return Ok(Some(UiState::NoResults));
        }
        Ok(None)
    }

    /// Poll until `target` is visible or `timeout` elapses
    pub async fn wait_visible<P: Page + ?Sized>(
        &self,
        page: &P,
        target: &Target,
        timeout: Duration,
    ) -> E2eResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if page.is_visible(target).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(Self::ms(self.timeouts.poll_interval_ms).min(deadline - Instant::now())).await;
        }
    }

    /// Wait until suggestions or "no results" show, or `deadline` passes.
    ///
    /// Never fails because of the deadline; `state` is `None` then.
    pub async fn await_stable_state<P: Page + ?Sized>(
        &self,
        page: &P,
        started: Instant,
        deadline: Instant,
    ) -> E2eResult<DomSnapshot> {
        let state = loop {
            if let Some(state) = self.current_state(page).await? {
                break Some(state);
            }
            let now = Instant::now();
            if now >= deadline {
                break None;
            }
            sleep(Self::ms(self.timeouts.poll_interval_ms).min(deadline - now)).await;
        };

        if state.is_none() {
            debug!("No recognised UI state before the deadline");
        }
        self.snapshot(page, state, started).await
    }

    /// Read the page once
    pub async fn snapshot<P: Page + ?Sized>(
        &self,
        page: &P,
        state: Option<UiState>,
        started: Instant,
    ) -> E2eResult<DomSnapshot> {
        let body = Target::new(sitecheck_common::Locator::css(&self.selectors.body));
        let body_visible = page.is_visible(&body).await?;
        // A crashed page may not have the input any more
        let input_value = if body_visible {
            page.input_value(&self.selectors.search_box).await?
        } else {
            String::new()
        };
        let suggestion_count = if state == Some(UiState::Suggestions) {
            page.count(&self.selectors.suggestion_items).await?
        } else {
            0
        };

        Ok(DomSnapshot {
            state,
            body_visible,
            input_value,
            page_url: page.url().await?,
            suggestion_count,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run one case against a page already showing the search box
    pub async fn run_case<P: Page + ?Sized>(&self, page: &P, case: &FuzzCase) -> E2eResult<ProbeResult> {
        let mut state = CaseState::Idle;
        let mut observer = PageObserver::attach(page);

        let started = Instant::now();
        self.submit(page, &self.selectors.search_box, &case.input, case.mode)
            .await?;
        state = state.next();
        debug!("{}: {:?}", case.name, state);

        let (snapshot, budget) = match case.expectation.awaited_state() {
            Some(UiState::Suggestions) => {
                // Measured from the first keystroke, so typing time counts
                let budget = Self::ms(self.timeouts.suggestions_ms);
                (self.await_stable_state(page, started, started + budget).await?, budget)
            }
            Some(UiState::NoResults) => {
                let budget = Self::ms(self.timeouts.settle_ms + self.timeouts.no_results_ms);
                (self.await_stable_state(page, started, Instant::now() + budget).await?, budget)
            }
            None => {
                let budget = Self::ms(self.timeouts.settle_ms);
                sleep(budget).await;
                let current = self.current_state(page).await?;
                (self.snapshot(page, current, started).await?, budget)
            }
        };
        state = state.next();
        debug!("{}: {:?} after {} ms", case.name, state, snapshot.elapsed_ms);

        let content = match case.expectation {
            Expectation::NoSqlErrorText => Some(page.content().await?),
            _ => None,
        };
        let console_errors = observer.console_errors();
        let dialogs = observer.dialogs();
        let missed_events = observer.missed_events();

        let verdict = evaluate_case(
            case,
            &CaseObservation {
                snapshot: &snapshot,
                console_errors: &console_errors,
                dialogs: &dialogs,
                missed_events,
                content: content.as_deref(),
                budget,
            },
            &self.policy,
            &self.expected_path,
        );
        state = state.next();
        debug!("{}: {:?}", case.name, state);

        for warning in &verdict.warnings {
            warn!("{}: {}", case.name, warning);
        }
        if case.expectation == Expectation::ShowsSuggestions && snapshot.state.is_some() {
            info!("{}: response time {} ms", case.name, snapshot.elapsed_ms);
        }

        // Back to Idle: the next case must start from an empty input
        if snapshot.body_visible {
            if let Err(e) = page.clear(&self.selectors.search_box).await {
                warn!("{}: could not reset input: {}", case.name, e);
            }
        }
        state = state.next();
        debug_assert_eq!(state, CaseState::Idle);

        let target = ProbeTarget::Fuzz(case.clone());
        let detail = verdict.detail();
        let observed = Observation::Dom(snapshot);
        Ok(if verdict.passed {
            ProbeResult::pass(target, observed, detail)
        } else {
            ProbeResult::fail(target, observed, detail)
        })
    }

    /// Fill a non-empty value, expect the clear control, click it, expect "".
    pub async fn assert_clear_affordance<P: Page + ?Sized>(
        &self,
        page: &P,
        value: &str,
    ) -> E2eResult<ProbeResult> {
        let target = ProbeTarget::Page {
            name: "clear-affordance".to_string(),
        };
        let started = Instant::now();

        self.submit(page, &self.selectors.search_box, value, InputMode::BulkFill)
            .await?;
        sleep(Self::ms(self.timeouts.clear_settle_ms)).await;

        let visible = self
            .wait_visible(page, &self.selectors.clear_button, Self::ms(self.timeouts.clear_ms))
            .await?;
        if !visible {
            let snapshot = self.snapshot(page, None, started).await?;
            return Ok(ProbeResult::fail(
                target,
                Observation::Dom(snapshot),
                format!(
                    "clear control {} not visible within {} ms",
                    self.selectors.clear_button, self.timeouts.clear_ms
                ),
            ));
        }

        page.click(&self.selectors.clear_button).await?;
        let snapshot = self.snapshot(page, None, started).await?;

        Ok(if snapshot.input_value.is_empty() {
            ProbeResult::pass(target, Observation::Dom(snapshot), "input cleared")
        } else {
            let detail = format!("input still holds {:?} after clear", snapshot.input_value);
            ProbeResult::fail(target, Observation::Dom(snapshot), detail)
        })
    }

    /// Submit several malicious inputs in a row, then scan console and dialogs
    pub async fn leakage_sweep<P: Page + ?Sized>(
        &self,
        page: &P,
        inputs: &[String],
    ) -> E2eResult<ProbeResult> {
        let mut observer = PageObserver::attach(page);

        for input in inputs {
            self.submit(page, &self.selectors.search_box, input, InputMode::BulkFill)
                .await?;
            sleep(Self::ms(self.timeouts.sweep_settle_ms)).await;
        }

        let leaked = leaked_messages(&observer.console_errors(), &self.policy.banned_substrings);
        let dialogs = observer.dialogs();
        let target = ProbeTarget::Page {
            name: "leakage-sweep".to_string(),
        };

        let mut problems = Vec::new();
        if !leaked.is_empty() {
            problems.push(format!("sensitive console output: {}", leaked.join(" | ")));
        }
        if !assert_no_script_execution(&dialogs) {
            let fired: Vec<String> = dialogs.iter().map(|d| d.to_string()).collect();
            problems.push(format!("native dialog fired: {}", fired.join(", ")));
        }
        problems.extend(missed_events_failure(observer.missed_events()));

        Ok(if problems.is_empty() {
            ProbeResult::pass(
                target,
                Observation::Messages(leaked),
                format!("{} inputs, no sensitive information exposed", inputs.len()),
            )
        } else {
            ProbeResult::fail(target, Observation::Messages(leaked), problems.join("; "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled(state: Option<UiState>) -> DomSnapshot {
        DomSnapshot {
            state,
            body_visible: true,
            input_value: String::new(),
            page_url: "https://www.dominos.com.au/store-finder/".to_string(),
            suggestion_count: 0,
            elapsed_ms: 100,
        }
    }

    fn judge(case: &FuzzCase, snapshot: &DomSnapshot, console: &[String], dialogs: &[DialogEvent]) -> Verdict {
        evaluate_case(
            case,
            &CaseObservation {
                snapshot,
                console_errors: console,
                dialogs,
                missed_events: 0,
                content: None,
                budget: Duration::from_millis(3000),
            },
            &PolicyConfig::default(),
            "store-finder",
        )
    }

    #[test]
    fn test_state_machine_cycles_back_to_idle() {
        let mut state = CaseState::Idle;
        for expected in [CaseState::Filled, CaseState::Settled, CaseState::Asserted, CaseState::Idle] {
            state = state.next();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_leakage_is_case_insensitive() {
        let banned = PolicyConfig::default().banned_substrings;
        let messages = vec![
            "Failed to load resource".to_string(),
            "Unhandled DATABASE exception".to_string(),
            "Bearer Token expired".to_string(),
        ];
        assert_eq!(
            leaked_messages(&messages, &banned),
            vec!["Unhandled DATABASE exception".to_string(), "Bearer Token expired".to_string()]
        );
        assert!(!assert_no_leakage(&messages, &banned));
        assert!(assert_no_leakage(&messages[..1], &banned));
    }

    #[test]
    fn test_dialog_fails_any_expectation() {
        let case = FuzzCase::new("special", "!@#$%^&*()", Expectation::NoCrash);
        let dialogs = vec![DialogEvent {
            kind: "alert".to_string(),
            message: "XSS".to_string(),
        }];
        let verdict = judge(&case, &settled(None), &[], &dialogs);
        assert!(!verdict.passed);
        assert!(verdict.detail().contains("alert"));
    }

    #[test]
    fn test_lagged_observer_fails_the_safety_check() {
        let case = FuzzCase::new("xss", "<script>alert(1)</script>", Expectation::NoScriptExecution);
        let snapshot = settled(None);
        let verdict = evaluate_case(
            &case,
            &CaseObservation {
                snapshot: &snapshot,
                console_errors: &[],
                dialogs: &[],
                missed_events: 12,
                content: None,
                budget: Duration::from_millis(2000),
            },
            &PolicyConfig::default(),
            "store-finder",
        );
        assert!(!verdict.passed);
        assert!(verdict.detail().contains("observer missed 12 page events"));
    }

    #[test]
    fn test_missing_state_respects_timeout_policy() {
        let strict = FuzzCase::new("sql", "' OR '1'='1", Expectation::ShowsNoResults);
        let verdict = judge(&strict, &settled(None), &[], &[]);
        assert!(!verdict.passed);
        assert!(verdict.failures[0].contains("no results"));

        let soft = strict.clone().with_timeout_policy(TimeoutPolicy::Warn);
        let verdict = judge(&soft, &settled(None), &[], &[]);
        assert!(verdict.passed);
        assert_eq!(verdict.warnings.len(), 1);
    }

    #[test]
    fn test_soft_timeout_never_hides_safety_failure() {
        let case = FuzzCase::new("sql", "' OR '1'='1", Expectation::ShowsNoResults)
            .with_timeout_policy(TimeoutPolicy::Warn);
        let console = vec!["SQL syntax error near 'OR'".to_string()];
        let verdict = judge(&case, &settled(None), &console, &[]);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_suggestions_need_address_rows() {
        let case = FuzzCase::new("postcode", "2000", Expectation::ShowsSuggestions);
        let mut snapshot = settled(Some(UiState::Suggestions));
        assert!(!judge(&case, &snapshot, &[], &[]).passed);

        snapshot.suggestion_count = 3;
        assert!(judge(&case, &snapshot, &[], &[]).passed);
    }

    #[test]
    fn test_whitespace_must_trim_to_empty() {
        let case = FuzzCase::new("spaces", "     ", Expectation::ClearsOnWhitespace);
        let mut snapshot = settled(None);
        snapshot.input_value = "     ".to_string();
        assert!(judge(&case, &snapshot, &[], &[]).passed);

        snapshot.input_value = "  x ".to_string();
        assert!(!judge(&case, &snapshot, &[], &[]).passed);
    }

    #[test]
    fn test_stays_on_page_checks_url() {
        let case = FuzzCase::new("partial", "123", Expectation::StaysOnPage);
        let mut snapshot = settled(None);
        assert!(judge(&case, &snapshot, &[], &[]).passed);

        snapshot.page_url = "https://www.dominos.com.au/error".to_string();
        assert!(!judge(&case, &snapshot, &[], &[]).passed);
    }

    #[test]
    fn test_error_markers_in_content() {
        let case = FuzzCase::new("sql-text", "' OR '1'='1", Expectation::NoSqlErrorText);
        let snapshot = settled(None);
        let observe = |content: &'static str| {
            evaluate_case(
                &case,
                &CaseObservation {
                    snapshot: &snapshot,
                    console_errors: &[],
                    dialogs: &[],
                    missed_events: 0,
                    content: Some(content),
                    budget: Duration::from_millis(2000),
                },
                &PolicyConfig::default(),
                "store-finder",
            )
        };
        assert!(observe("<html><body>NO STORE FOUND</body></html>").passed);
        assert!(!observe("<html><body>SQL Error: unterminated string</body></html>").passed);
    }
}
