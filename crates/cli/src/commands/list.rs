//! List scenarios

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sitecheck_e2e::ScenarioSpec;

use super::{scenarios_dir, Context};
use crate::output::{print_list, ScenarioDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Directory of scenario files (built-in catalog when omitted)
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Only scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

pub fn execute(args: ListArgs, ctx: &Context) -> Result<bool> {
    let specs = match scenarios_dir(&args.scenarios)? {
        Some(dir) => ScenarioSpec::load_all(&dir)?,
        None => ScenarioSpec::builtin()?,
    };

    let rows: Vec<ScenarioDisplay> = match &args.tag {
        Some(tag) => ScenarioSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .map(ScenarioDisplay::from)
            .collect(),
        None => specs.iter().map(ScenarioDisplay::from).collect(),
    };

    print_list(&rows, ctx.format);
    Ok(true)
}
