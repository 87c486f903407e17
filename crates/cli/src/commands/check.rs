//! Evaluate the App Store link policy for one href

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use sitecheck_e2e::links::check_app_store_link_format;

use super::Context;
use crate::output::{print_error, print_success, OutputFormat};

#[derive(Args, Debug)]
pub struct CheckFormatArgs {
    /// Link to check, e.g. https://apps.apple.com/au/app/...
    pub href: String,
}

#[derive(Serialize)]
struct FormatVerdict<'a> {
    href: &'a str,
    valid: bool,
    expected_domain: &'a str,
    deprecated_domain: &'a str,
}

pub fn execute(args: CheckFormatArgs, ctx: &Context) -> Result<bool> {
    let config = ctx.load_config()?;
    let policy = &config.policy;
    let valid = check_app_store_link_format(&args.href, policy);

    match ctx.format {
        OutputFormat::Table => {
            if valid {
                print_success(&format!("{} uses {}", args.href, policy.app_store_domain));
            } else {
                print_error(&format!(
                    "{} must use {} and not {}",
                    args.href, policy.app_store_domain, policy.deprecated_app_store_domain
                ));
            }
        }
        format => {
            let verdict = FormatVerdict {
                href: &args.href,
                valid,
                expected_domain: &policy.app_store_domain,
                deprecated_domain: &policy.deprecated_app_store_domain,
            };
            let text = if format == OutputFormat::Json {
                serde_json::to_string_pretty(&verdict)?
            } else {
                serde_yaml::to_string(&verdict)?
            };
            println!("{}", text);
        }
    }

    Ok(valid)
}
