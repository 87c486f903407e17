//! Write a default config file

use anyhow::{bail, Result};
use clap::Args;

use sitecheck_common::HarnessConfig;

use super::Context;
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitArgs, ctx: &Context) -> Result<bool> {
    if ctx.config_path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            ctx.config_path.display()
        );
    }

    HarnessConfig::default().save(&ctx.config_path)?;
    print_success(&format!("Wrote {}", ctx.config_path.display()));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(Some(dir.path().join("sitecheck.toml")), OutputFormat::Table);

        assert!(execute(InitArgs { force: false }, &ctx).unwrap());
        assert!(execute(InitArgs { force: false }, &ctx).is_err());
        assert!(execute(InitArgs { force: true }, &ctx).unwrap());

        let loaded = ctx.load_config().unwrap();
        assert_eq!(loaded.policy.footer_link_limit, 20);
    }
}
