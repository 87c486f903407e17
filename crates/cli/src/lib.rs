//! SiteCheck CLI
//!
//! Command-line interface for running link audits and store-search fuzz
//! scenarios against a site.

pub mod commands;
pub mod output;
