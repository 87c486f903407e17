//! Probe link catalogs over HTTP only

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sitecheck_common::{LinkCategory, ProbeResult};
use sitecheck_e2e::runner::RunnerConfig;
use sitecheck_e2e::TestRunner;

use super::{scenarios_dir, Context};
use crate::output::{print_list, print_suite, OutputFormat};

#[derive(Args, Debug)]
pub struct LinksArgs {
    /// Only catalogs of this category (navigation, social, partner, ...)
    #[arg(short, long)]
    pub category: Option<LinkCategory>,

    /// Directory of scenario files (built-in catalog when omitted)
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,
}

/// Returns whether every link passed
pub async fn execute(args: LinksArgs, ctx: &Context) -> Result<bool> {
    let mut runner = TestRunner::new(RunnerConfig {
        harness: ctx.load_config()?,
        scenarios_dir: scenarios_dir(&args.scenarios)?,
        ..Default::default()
    })?;

    let suite = runner.run_links_only(args.category).await?;

    if ctx.format == OutputFormat::Table {
        let probes: Vec<ProbeResult> = suite
            .results
            .iter()
            .flat_map(|r| r.probes.iter().cloned())
            .collect();
        print_list(&probes, ctx.format);
    }
    print_suite(&suite, ctx.format);

    Ok(suite.success())
}
