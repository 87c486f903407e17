//! SiteCheck harness
//!
//! This crate drives a real browser from Rust to audit a site's outbound links
//! and to fuzz its store search box:
//! - Keeps one Node/Playwright driver process alive per run (JSON lines over stdio)
//! - Probes link catalogs over plain HTTP with reqwest
//! - Parses declarative YAML scenario files
//! - Observes console messages and native dialogs per page
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TestRunner (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run_specs(&[ScenarioSpec]) -> SuiteResult                  │
//! │    ├── link_catalog        -> LinkAuditor (reqwest)         │
//! │    └── everything else     -> PlaywrightDriver              │
//! │          └── BrowserSession: Page (one context each)        │
//! │                ├── links:  app/play store, footer, void,    │
//! │                │           console errors                   │
//! │                └── fuzz:   FuzzHarness::run_case,           │
//! │                            clear affordance, leakage sweep  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioSpec (YAML)                                        │
//! │    ├── name, description, tags, page                        │
//! │    └── kind: link_catalog | fuzz_catalog | ...              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fuzz;
pub mod links;
pub mod observer;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod scenario;

pub use error::{E2eError, E2eResult};
pub use fuzz::FuzzHarness;
pub use links::LinkAuditor;
pub use observer::PageObserver;
pub use page::{ConsoleMessage, DialogEvent, Page, PageEvent, PageEventKind};
pub use playwright::{BrowserSession, PlaywrightConfig, PlaywrightDriver};
pub use runner::{RunnerConfig, ScenarioResult, SuiteResult, TestRunner};
pub use scenario::{ScenarioKind, ScenarioSpec};
