//! Run scenarios

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use tracing::warn;

use sitecheck_e2e::runner::{RunnerConfig, SuiteResult};
use sitecheck_e2e::TestRunner;

use super::{scenarios_dir, Context};
use crate::output::{print_info, print_suite};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory of scenario files (built-in catalog when omitted)
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only the scenario with this name
    #[arg(short, long, conflicts_with = "tag")]
    pub name: Option<String>,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,
}

/// Returns whether every scenario passed
pub async fn execute(args: RunArgs, ctx: &Context) -> Result<bool> {
    let mut runner = TestRunner::new(RunnerConfig {
        harness: ctx.load_config()?,
        scenarios_dir: scenarios_dir(&args.scenarios)?,
        output_dir: args.output,
    })?;

    let outcome = match (&args.name, &args.tag) {
        (Some(name), _) => {
            let started_at = chrono::Utc::now();
            let start = Instant::now();
            runner
                .run_test(name)
                .await
                .map(|result| SuiteResult::new(started_at, start.elapsed().as_millis() as u64, vec![result]))
        }
        (None, Some(tag)) => runner.run_tagged(tag).await,
        (None, None) => runner.run_all().await,
    };

    // Stop the browser even when loading scenarios failed
    if let Err(e) = runner.shutdown().await {
        warn!("Driver shutdown failed: {}", e);
    }
    let suite = outcome?;

    if suite.total == 0 {
        print_info("No scenarios matched.");
    }
    runner.write_results(&suite)?;

    print_suite(&suite, ctx.format);
    Ok(suite.success())
}
