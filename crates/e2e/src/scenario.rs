//! Declarative YAML scenario files

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use sitecheck_common::{FuzzCase, LinkCategory, LinkEntry, StatusRange};

use crate::error::{E2eError, E2eResult};

/// Scenario files shipped with the crate
const BUILTIN: &[(&str, &str)] = &[
    ("app-store-link.yaml", include_str!("../scenarios/app-store-link.yaml")),
    ("play-store-link.yaml", include_str!("../scenarios/play-store-link.yaml")),
    ("navigation-links.yaml", include_str!("../scenarios/navigation-links.yaml")),
    ("social-links.yaml", include_str!("../scenarios/social-links.yaml")),
    ("partner-links.yaml", include_str!("../scenarios/partner-links.yaml")),
    ("footer-links.yaml", include_str!("../scenarios/footer-links.yaml")),
    ("void-links.yaml", include_str!("../scenarios/void-links.yaml")),
    ("console-errors.yaml", include_str!("../scenarios/console-errors.yaml")),
    ("store-finder-fuzz.yaml", include_str!("../scenarios/store-finder-fuzz.yaml")),
    ("store-finder-leakage.yaml", include_str!("../scenarios/store-finder-leakage.yaml")),
    ("store-finder-clear.yaml", include_str!("../scenarios/store-finder-clear.yaml")),
];

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Page path, joined onto the configured base URL
    #[serde(default = "default_page")]
    pub page: String,

    #[serde(flatten)]
    pub kind: ScenarioKind,
}

fn default_page() -> String {
    "/".to_string()
}

fn default_repeat() -> u32 {
    1
}

fn default_clear_input() -> String {
    "2000".to_string()
}

/// A catalog link as written in a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub name: String,
    pub url: String,

    /// Overrides the category's status range
    #[serde(default)]
    pub expect: Option<StatusRange>,
}

/// What a scenario does
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Probe a fixed list of URLs over HTTP
    LinkCatalog {
        category: LinkCategory,
        links: Vec<LinkSpec>,
    },

    /// First App Store anchor on the page: format policy, then reachability
    AppStoreLink,

    /// First Google Play anchor on the page must be reachable
    PlayStoreLink,

    /// Probe the http anchors found in the footer
    FooterLinks {
        /// Defaults to the policy's footer link limit
        #[serde(default)]
        limit: Option<usize>,
    },

    /// `javascript:void(0)` anchors need onclick or aria-label
    VoidLinks,

    /// Reload and collect console errors
    ConsoleErrors {
        /// Added to the configured ignore list
        #[serde(default)]
        ignore: Vec<String>,
    },

    /// Run fuzz cases against the search box, in order
    FuzzCatalog {
        cases: Vec<FuzzCase>,

        /// Run the catalog this many times; outcomes must not change
        #[serde(default = "default_repeat")]
        repeat: u32,
    },

    /// Fill, click the clear control, expect an empty input
    ClearAffordance {
        #[serde(default = "default_clear_input")]
        input: String,
    },

    /// Submit several inputs, then scan everything logged meanwhile
    LeakageSweep { inputs: Vec<String> },
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::LinkCatalog { .. } => "link_catalog",
            ScenarioKind::AppStoreLink => "app_store_link",
            ScenarioKind::PlayStoreLink => "play_store_link",
            ScenarioKind::FooterLinks { .. } => "footer_links",
            ScenarioKind::VoidLinks => "void_links",
            ScenarioKind::ConsoleErrors { .. } => "console_errors",
            ScenarioKind::FuzzCatalog { .. } => "fuzz_catalog",
            ScenarioKind::ClearAffordance { .. } => "clear_affordance",
            ScenarioKind::LeakageSweep { .. } => "leakage_sweep",
        }
    }
}

impl ScenarioSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by file name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        ensure_unique_names(&specs)?;
        Ok(specs)
    }

    /// The scenarios embedded in the binary
    pub fn builtin() -> E2eResult<Vec<Self>> {
        let specs = BUILTIN
            .iter()
            .map(|(file, yaml)| {
                Self::from_yaml(yaml)
                    .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", file, e)))
            })
            .collect::<E2eResult<Vec<_>>>()?;
        ensure_unique_names(&specs)?;
        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Link catalogs run over plain HTTP; everything else needs a page
    pub fn needs_browser(&self) -> bool {
        !matches!(self.kind, ScenarioKind::LinkCatalog { .. })
    }

    /// Catalog entries with their status ranges resolved
    pub fn link_entries(&self) -> E2eResult<Vec<LinkEntry>> {
        match &self.kind {
            ScenarioKind::LinkCatalog { category, links } => links
                .iter()
                .map(|link| -> E2eResult<LinkEntry> {
                    let entry = LinkEntry::new(&link.name, &link.url, *category)?;
                    Ok(match link.expect {
                        Some(range) => entry.with_expected(range),
                        None => entry,
                    })
                })
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    /// Reject scenarios that cannot run
    pub fn validate(&self) -> E2eResult<()> {
        let invalid = |reason: &str| E2eError::ScenarioParse(format!("{}: {}", self.name, reason));

        if self.name.trim().is_empty() {
            return Err(E2eError::ScenarioParse("scenario name is empty".to_string()));
        }

        match &self.kind {
            ScenarioKind::LinkCatalog { links, .. } => {
                if links.is_empty() {
                    return Err(invalid("link catalog has no links"));
                }
                if let Some(link) = links.iter().find(|l| l.expect.is_some_and(|r| r.is_empty())) {
                    return Err(invalid(&format!("{}: expected status range is empty", link.name)));
                }
                self.link_entries()
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            ScenarioKind::FuzzCatalog { cases, repeat } => {
                if cases.is_empty() {
                    return Err(invalid("fuzz catalog has no cases"));
                }
                if *repeat == 0 {
                    return Err(invalid("repeat must be at least 1"));
                }
            }
            ScenarioKind::FooterLinks { limit: Some(0) } => {
                return Err(invalid("footer link limit must be non-zero"));
            }
            ScenarioKind::ClearAffordance { input } if input.is_empty() => {
                return Err(invalid("clear affordance needs a non-empty input"));
            }
            ScenarioKind::LeakageSweep { inputs } if inputs.is_empty() => {
                return Err(invalid("leakage sweep has no inputs"));
            }
            _ => {}
        }

        Ok(())
    }
}

fn ensure_unique_names(specs: &[ScenarioSpec]) -> E2eResult<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(E2eError::ScenarioParse(format!(
                "duplicate scenario name: {}",
                spec.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecheck_common::{Expectation, InputMode};

    #[test]
    fn test_parse_link_catalog() {
        let yaml = r#"
name: social-links
description: Social media profiles
tags:
  - links
kind: link_catalog
category: social
links:
  - name: Facebook
    url: https://www.facebook.com/DominosAustralia
  - name: Instagram
    url: https://www.instagram.com/dominos_au
    expect:
      min: 200
      max: 300
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.page, "/");
        assert!(!spec.needs_browser());

        let entries = spec.link_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].expected, StatusRange::ok_or_redirect());
        assert_eq!(entries[1].expected, StatusRange { min: 200, max: 300 });
    }

    #[test]
    fn test_parse_fuzz_catalog() {
        let yaml = r#"
name: search-fuzz
page: /store-finder/
kind: fuzz_catalog
repeat: 2
cases:
  - name: postcode
    input: "2000"
    expectation: shows_suggestions
    mode: keystroke
  - name: sql
    input: "' OR '1'='1"
    expectation: shows_no_results
    on_timeout: warn
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert!(spec.needs_browser());
        match spec.kind {
            ScenarioKind::FuzzCatalog { cases, repeat } => {
                assert_eq!(repeat, 2);
                assert_eq!(cases[0].input, "2000");
                assert_eq!(cases[0].mode, InputMode::Keystroke);
                assert_eq!(cases[1].expectation, Expectation::ShowsNoResults);
                assert_eq!(cases[1].mode, InputMode::BulkFill);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_unit_kind_and_defaults() {
        let spec = ScenarioSpec::from_yaml("name: apple\nkind: app_store_link\n").unwrap();
        assert!(matches!(spec.kind, ScenarioKind::AppStoreLink));
        assert_eq!(spec.kind.name(), "app_store_link");

        let spec = ScenarioSpec::from_yaml("name: clear\nkind: clear_affordance\n").unwrap();
        assert!(matches!(spec.kind, ScenarioKind::ClearAffordance { ref input } if input == "2000"));
    }

    #[test]
    fn test_rejects_unusable_scenarios() {
        assert!(ScenarioSpec::from_yaml("name: x\nkind: fuzz_catalog\ncases: []\n").is_err());
        assert!(ScenarioSpec::from_yaml("name: x\nkind: leakage_sweep\ninputs: []\n").is_err());
        assert!(ScenarioSpec::from_yaml(
            "name: x\nkind: link_catalog\ncategory: partner\nlinks:\n  - name: rel\n    url: /jobs\n"
        )
        .is_err());
        assert!(ScenarioSpec::from_yaml("name: x\nkind: teleport\n").is_err());
    }

    #[test]
    fn test_rejects_inverted_status_range() {
        let yaml = r#"
name: inverted
kind: link_catalog
category: social
links:
  - name: Facebook
    url: https://www.facebook.com/example
    expect: { min: 300, max: 200 }
"#;
        let err = ScenarioSpec::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Facebook: expected status range is empty"));
    }

    #[test]
    fn test_builtin_catalog_parses() {
        let specs = ScenarioSpec::builtin().unwrap();
        assert_eq!(specs.len(), BUILTIN.len());

        let smoke = ScenarioSpec::filter_by_tag(&specs, "store-finder");
        assert!(smoke.iter().all(|s| s.page.contains("store-finder")));
        assert!(specs.iter().any(|s| matches!(s.kind, ScenarioKind::LinkCatalog { category: LinkCategory::Navigation, .. })));
    }
}
