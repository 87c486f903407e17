//! Main runner that loads scenarios, drives the browser, and collects results

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::{pin_mut, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use sitecheck_common::{
    FuzzCase, HarnessConfig, LinkCategory, Observation, ProbeResult, ProbeTarget,
};

use crate::error::{E2eError, E2eResult};
use crate::fuzz::FuzzHarness;
use crate::links::{self, LinkAuditor};
use crate::page::Page;
use crate::playwright::{PlaywrightConfig, PlaywrightDriver};
use crate::scenario::{ScenarioKind, ScenarioSpec};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub kind: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub probes: Vec<ProbeResult>,
    /// One line per failed probe
    pub failures: Vec<String>,
    /// Harness error that stopped the scenario early
    pub error: Option<String>,
}

impl ScenarioResult {
    fn from_probes(spec: &ScenarioSpec, probes: Vec<ProbeResult>, duration_ms: u64) -> Self {
        let failures = links::failures(&probes);
        Self {
            name: spec.name.clone(),
            kind: spec.kind.name().to_string(),
            passed: failures.is_empty(),
            duration_ms,
            probes,
            failures,
            error: None,
        }
    }

    fn from_error(spec: &ScenarioSpec, error: &E2eError, duration_ms: u64) -> Self {
        Self {
            name: spec.name.clone(),
            kind: spec.kind.name().to_string(),
            passed: false,
            duration_ms,
            probes: vec![],
            failures: vec![],
            error: Some(error.to_string()),
        }
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    /// Tally `results` into a suite
    pub fn new(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<ScenarioResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            started_at,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub harness: HarnessConfig,
    /// Directory of scenario files; the built-in catalog when `None`
    pub scenarios_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            harness: HarnessConfig::default(),
            scenarios_dir: None,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Runs scenarios one after another, isolating each failure
pub struct TestRunner {
    config: HarnessConfig,
    auditor: LinkAuditor,
    harness: FuzzHarness,

    /// Started on the first scenario that needs a page
    driver: Option<Arc<PlaywrightDriver>>,

    scenarios_dir: Option<PathBuf>,
    output_dir: PathBuf,
}

impl TestRunner {
    pub fn new(config: RunnerConfig) -> E2eResult<Self> {
        config.harness.validate()?;
        Ok(Self {
            auditor: LinkAuditor::new(&config.harness.http)?,
            harness: FuzzHarness::new(&config.harness),
            config: config.harness,
            driver: None,
            scenarios_dir: config.scenarios_dir,
            output_dir: config.output_dir,
        })
    }

    /// Replace the link auditor (e.g. one with a custom client)
    pub fn with_auditor(mut self, auditor: LinkAuditor) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Scenarios from the configured directory, or the built-in catalog
    pub fn load_scenarios(&self) -> E2eResult<Vec<ScenarioSpec>> {
        match &self.scenarios_dir {
            Some(dir) => ScenarioSpec::load_all(dir),
            None => ScenarioSpec::builtin(),
        }
    }

    /// Run every scenario
    pub async fn run_all(&mut self) -> E2eResult<SuiteResult> {
        let specs = self.load_scenarios()?;
        Ok(self.run_specs(&specs).await)
    }

    /// Run scenarios carrying a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<SuiteResult> {
        let specs = self.load_scenarios()?;
        let filtered: Vec<ScenarioSpec> = ScenarioSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        Ok(self.run_specs(&filtered).await)
    }

    /// Run a specific scenario by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<ScenarioResult> {
        let specs = self.load_scenarios()?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::ScenarioParse(format!("Scenario not found: {}", name)))?;

        Ok(self.run_scenario(&spec).await)
    }

    /// Run only the HTTP link catalogs, optionally of one category. No browser.
    pub async fn run_links_only(&mut self, category: Option<LinkCategory>) -> E2eResult<SuiteResult> {
        let specs: Vec<ScenarioSpec> = self
            .load_scenarios()?
            .into_iter()
            .filter(|s| match &s.kind {
                ScenarioKind::LinkCatalog { category: c, .. } => category.map_or(true, |want| *c == want),
                _ => false,
            })
            .collect();
        Ok(self.run_specs(&specs).await)
    }

    /// Run a list of scenarios sequentially
    pub async fn run_specs(&mut self, specs: &[ScenarioSpec]) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(specs.len());

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            let result = self.run_scenario(spec).await;
            if result.passed {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else if let Some(e) = &result.error {
                error!("✗ {} - {}", result.name, e);
            } else {
                error!("✗ {} - {}", result.name, result.failures.join("; "));
            }
            results.push(result);
        }

        let suite = SuiteResult::new(started_at, start.elapsed().as_millis() as u64, results);

        info!("");
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        suite
    }

    /// Run one scenario. Harness errors become a failed result.
    pub async fn run_scenario(&mut self, spec: &ScenarioSpec) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let outcome = if spec.needs_browser() {
            self.run_in_browser(spec).await
        } else {
            self.run_links(spec).await
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(probes) => ScenarioResult::from_probes(spec, probes, duration_ms),
            Err(e) => ScenarioResult::from_error(spec, &e, duration_ms),
        }
    }

    async fn run_links(&self, spec: &ScenarioSpec) -> E2eResult<Vec<ProbeResult>> {
        let entries = spec.link_entries()?;
        Ok(self.auditor.check_links(&entries).await)
    }

    async fn ensure_driver(&mut self) -> E2eResult<Arc<PlaywrightDriver>> {
        if let Some(driver) = &self.driver {
            return Ok(Arc::clone(driver));
        }
        let driver = PlaywrightDriver::launch(PlaywrightConfig::from(&self.config)).await?;
        self.driver = Some(Arc::clone(&driver));
        Ok(driver)
    }

    /// Fresh browser context per scenario, closed afterwards
    async fn run_in_browser(&mut self, spec: &ScenarioSpec) -> E2eResult<Vec<ProbeResult>> {
        let driver = self.ensure_driver().await?;
        let session = driver.new_session().await?;

        let outcome = self.run_on_page(spec, &session).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close page for {}: {}", spec.name, e);
        }
        outcome
    }

    /// Navigate `page` to the scenario's page and run its checks there
    pub async fn run_on_page<P: Page + ?Sized>(
        &self,
        spec: &ScenarioSpec,
        page: &P,
    ) -> E2eResult<Vec<ProbeResult>> {
        if spec.needs_browser() {
            let url = self.config.page_url(&spec.page)?;
            page.goto(url.as_str()).await?;
        }

        let policy = &self.config.policy;
        let probes = match &spec.kind {
            ScenarioKind::LinkCatalog { .. } => self.run_links(spec).await?,

            ScenarioKind::AppStoreLink => {
                vec![self.check_store_anchor(page, &links::app_store_anchor(policy), LinkCategory::AppStore).await?]
            }

            ScenarioKind::PlayStoreLink => {
                vec![self.check_store_anchor(page, &links::play_store_anchor(), LinkCategory::PlayStore).await?]
            }

            ScenarioKind::FooterLinks { limit } => {
                let limit = limit.unwrap_or(policy.footer_link_limit);
                let hrefs = links::discover_footer_links(page, &self.config.selectors.footer, limit);
                pin_mut!(hrefs);

                let mut probes = Vec::new();
                while let Some(href) = hrefs.next().await {
                    let name = format!("footer link {}", probes.len() + 1);
                    let probe = match href {
                        Ok(href) => self.auditor.check_href(&name, &href, LinkCategory::Footer).await,
                        Err(e) => {
                            warn!("{}: {}", name, e);
                            ProbeResult::fail(
                                ProbeTarget::Page { name: name.clone() },
                                Observation::None,
                                format!("{}: {}", name, e),
                            )
                        }
                    };
                    probes.push(probe);
                }
                probes
            }

            ScenarioKind::VoidLinks => {
                let offenders = links::check_void_links(page).await?;
                vec![messages_probe("void-links", offenders, "every javascript:void(0) link is labelled")]
            }

            ScenarioKind::ConsoleErrors { ignore } => {
                let mut ignored = policy.console_ignore.clone();
                ignored.extend(ignore.iter().cloned());
                let critical = links::check_no_console_errors(page, &ignored).await?;
                vec![messages_probe("console-errors", critical, "no critical console errors")]
            }

            ScenarioKind::FuzzCatalog { cases, repeat } => {
                let mut probes = Vec::new();
                let mut first_round: Vec<bool> = Vec::with_capacity(cases.len());

                for round in 0..*repeat {
                    for (i, case) in cases.iter().enumerate() {
                        let probe = self.fuzz_case(page, case).await;
                        if round == 0 {
                            first_round.push(probe.passed);
                        } else if first_round[i] != probe.passed {
                            probes.push(ProbeResult::fail(
                                ProbeTarget::Fuzz(case.clone()),
                                Observation::None,
                                format!(
                                    "{}: outcome changed on run {} (first run passed: {})",
                                    case.name,
                                    round + 1,
                                    first_round[i]
                                ),
                            ));
                        }
                        probes.push(probe);
                    }
                }
                probes
            }

            ScenarioKind::ClearAffordance { input } => {
                vec![self.harness.assert_clear_affordance(page, input).await?]
            }

            ScenarioKind::LeakageSweep { inputs } => {
                vec![self.harness.leakage_sweep(page, inputs).await?]
            }
        };

        Ok(probes)
    }

    /// Run one fuzz case; a driver error fails only that case
    async fn fuzz_case<P: Page + ?Sized>(&self, page: &P, case: &FuzzCase) -> ProbeResult {
        match self.harness.run_case(page, case).await {
            Ok(probe) => probe,
            Err(e) => {
                error!("{}: {}", case.name, e);
                if let Err(reset) = page.clear(&self.harness.selectors().search_box).await {
                    warn!("{}: could not reset input: {}", case.name, reset);
                }
                ProbeResult::fail(
                    ProbeTarget::Fuzz(case.clone()),
                    Observation::None,
                    format!("{}: {}", case.name, e),
                )
            }
        }
    }

    /// First anchor matching `anchor`: App Store links must pass the format
    /// policy before they are probed. A page without an App Store link
    /// passes; the Google Play link is required.
    async fn check_store_anchor<P: Page + ?Sized>(
        &self,
        page: &P,
        anchor: &sitecheck_common::Target,
        category: LinkCategory,
    ) -> E2eResult<ProbeResult> {
        let label = match category {
            LinkCategory::AppStore => "App Store",
            _ => "Google Play",
        };
        let target = ProbeTarget::Page {
            name: label.to_string(),
        };

        if page.count(anchor).await? == 0 {
            let detail = format!("no {} link", label);
            return Ok(if category == LinkCategory::AppStore {
                info!("No {} link on the page", label);
                ProbeResult::pass(target, Observation::None, detail)
            } else {
                ProbeResult::fail(target, Observation::None, detail)
            });
        }

        let href = match page.attribute(anchor, 0, "href").await? {
            Some(href) => href,
            None => {
                return Ok(ProbeResult::fail(
                    target,
                    Observation::None,
                    format!("{} link has no href", label),
                ))
            }
        };

        if category == LinkCategory::AppStore
            && !links::check_app_store_link_format(&href, &self.config.policy)
        {
            return Ok(ProbeResult::fail(
                target,
                Observation::None,
                format!(
                    "{} - App Store link must use {} instead of {}",
                    href, self.config.policy.app_store_domain, self.config.policy.deprecated_app_store_domain
                ),
            ));
        }

        Ok(self.auditor.check_href(label, &href, category).await)
    }

    /// Stop the browser driver if one was started
    pub async fn shutdown(&mut self) -> E2eResult<()> {
        if let Some(driver) = self.driver.take() {
            driver.shutdown().await?;
        }
        Ok(())
    }

    /// Write suite results to `<output>/test-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        write_results_to(&self.output_dir, results)
    }
}

/// Write suite results as pretty JSON into `dir`
pub fn write_results_to(dir: &Path, results: &SuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Pass when `messages` is empty, otherwise fail listing them
fn messages_probe(name: &str, messages: Vec<String>, ok: &str) -> ProbeResult {
    let target = ProbeTarget::Page {
        name: name.to_string(),
    };
    if messages.is_empty() {
        ProbeResult::pass(target, Observation::Messages(messages), ok)
    } else {
        let detail = messages.join(" | ");
        ProbeResult::fail(target, Observation::Messages(messages), detail)
    }
}
