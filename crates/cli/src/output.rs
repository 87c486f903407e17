//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use sitecheck_common::{Observation, ProbeResult};
use sitecheck_e2e::{ScenarioResult, ScenarioSpec, SuiteResult};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn status_cell(passed: bool) -> String {
    if passed {
        "✓ pass".green().to_string()
    } else {
        "✗ fail".red().to_string()
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

impl TableDisplay for ScenarioResult {
    fn headers() -> Vec<&'static str> {
        vec!["Status", "Scenario", "Kind", "Probes", "Duration", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let detail = match &self.error {
            Some(e) => e.clone(),
            None => self.failures.join("\n"),
        };
        vec![
            status_cell(self.passed),
            self.name.clone(),
            self.kind.clone(),
            self.probes.len().to_string(),
            format!("{} ms", self.duration_ms),
            truncate(&detail, 200),
        ]
    }
}

impl TableDisplay for ProbeResult {
    fn headers() -> Vec<&'static str> {
        vec!["Status", "Target", "Observed", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let observed = match &self.observed {
            Observation::Status(code) => code.to_string(),
            Observation::Transport(_) => "transport error".to_string(),
            Observation::Dom(snapshot) => match snapshot.state {
                Some(state) => state.to_string(),
                None => "settled".to_string(),
            },
            Observation::Messages(messages) => format!("{} message(s)", messages.len()),
            Observation::None => "-".to_string(),
        };
        vec![
            status_cell(self.passed),
            self.target.label().to_string(),
            observed,
            truncate(&self.detail, 120),
        ]
    }
}

/// Scenario listing row
#[derive(Serialize)]
pub struct ScenarioDisplay {
    pub name: String,
    pub kind: String,
    pub page: String,
    pub tags: Vec<String>,
    pub browser: bool,
}

impl From<&ScenarioSpec> for ScenarioDisplay {
    fn from(spec: &ScenarioSpec) -> Self {
        Self {
            name: spec.name.clone(),
            kind: spec.kind.name().to_string(),
            page: spec.page.clone(),
            tags: spec.tags.clone(),
            browser: spec.needs_browser(),
        }
    }
}

impl TableDisplay for ScenarioDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Kind", "Page", "Tags", "Browser"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.kind.clone(),
            self.page.clone(),
            self.tags.join(", "),
            if self.browser { "yes" } else { "no" }.to_string(),
        ]
    }
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }
            println!("{}", table(items));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
    }
}

/// Print a suite: one row per scenario plus a summary line
pub fn print_suite(suite: &SuiteResult, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{}", table(&suite.results));
            let summary = format!(
                "{} passed, {} failed, {} total ({} ms)",
                suite.passed, suite.failed, suite.total, suite.duration_ms
            );
            if suite.success() {
                print_success(&summary);
            } else {
                print_error(&summary);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(suite).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(suite).unwrap_or_default());
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}
