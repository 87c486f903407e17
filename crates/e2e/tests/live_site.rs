use sitecheck_common::HarnessConfig;
use sitecheck_e2e::runner::RunnerConfig;
use sitecheck_e2e::TestRunner;

/// Full built-in catalog against the production site
///
/// Marked ignored because it needs network access, Node.js and an installed
/// Playwright browser. Run with `--ignored`.
#[tokio::test]
#[ignore]
async fn builtin_catalog_against_live_site() {
    let output = tempfile::tempdir().unwrap();
    let mut runner = TestRunner::new(RunnerConfig {
        harness: HarnessConfig::default(),
        scenarios_dir: None,
        output_dir: output.path().to_path_buf(),
    })
    .unwrap();

    let suite = runner.run_all().await.unwrap();
    runner.shutdown().await.unwrap();
    runner.write_results(&suite).unwrap();

    for result in suite.results.iter().filter(|r| !r.passed) {
        eprintln!(
            "{}: {}",
            result.name,
            result.error.clone().unwrap_or_else(|| result.failures.join("; "))
        );
    }
    assert!(suite.success(), "{} of {} scenarios failed", suite.failed, suite.total);
}

/// Link catalogs only; needs network access but no browser
#[tokio::test]
#[ignore]
async fn link_catalogs_against_live_site() {
    let mut runner = TestRunner::new(RunnerConfig::default()).unwrap();
    let suite = runner.run_links_only(None).await.unwrap();
    assert!(suite.total >= 3);
    assert!(suite.success(), "{:?}", suite.results.iter().flat_map(|r| r.failures.clone()).collect::<Vec<_>>());
}
