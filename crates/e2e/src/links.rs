//! Link auditing: reachability probes and link policy checks

use std::time::Duration;

use futures::stream::{self, Stream};
use tracing::{debug, info, warn};

use sitecheck_common::config::{HttpConfig, PolicyConfig};
use sitecheck_common::{
    LinkCategory, LinkEntry, Locator, Observation, ProbeResult, ProbeTarget, Target,
};

use crate::error::E2eResult;
use crate::observer::PageObserver;
use crate::page::Page;

/// Issues GET requests against catalog URLs and judges the status code
#[derive(Debug, Clone)]
pub struct LinkAuditor {
    client: reqwest::Client,
}

impl LinkAuditor {
    pub fn new(config: &HttpConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (e.g. with a different redirect policy)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Probe one link. The body is never read.
    pub async fn check_link(&self, entry: &LinkEntry) -> ProbeResult {
        debug!("GET {} ({})", entry.url, entry.name);

        match self.client.get(entry.url.clone()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if entry.expected.contains(status) {
                    ProbeResult::pass(
                        ProbeTarget::Link(entry.clone()),
                        Observation::Status(status),
                        format!("{} - Status: {}", entry.url, status),
                    )
                } else {
                    ProbeResult::fail(
                        ProbeTarget::Link(entry.clone()),
                        Observation::Status(status),
                        format!(
                            "{}: {} - Status: {} (expected {})",
                            entry.name, entry.url, status, entry.expected
                        ),
                    )
                }
            }
            Err(e) => ProbeResult::fail(
                ProbeTarget::Link(entry.clone()),
                Observation::Transport(e.to_string()),
                format!("{}: {} - Error: {}", entry.name, entry.url, e),
            ),
        }
    }

    /// Probe every entry in order; one result per entry
    pub async fn check_links(&self, entries: &[LinkEntry]) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            results.push(self.check_link(entry).await);
        }
        results
    }

    /// Probe an href scraped from the page
    pub async fn check_href(&self, name: &str, href: &str, category: LinkCategory) -> ProbeResult {
        match LinkEntry::new(name, href, category) {
            Ok(entry) => self.check_link(&entry).await,
            Err(e) => ProbeResult::fail(
                ProbeTarget::Page {
                    name: name.to_string(),
                },
                Observation::None,
                format!("{} - {}", href, e),
            ),
        }
    }
}

/// Detail line of every failed probe, one per broken link
pub fn failures(results: &[ProbeResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.detail.clone())
        .collect()
}

/// App Store links must use the current domain and never the deprecated one
pub fn check_app_store_link_format(href: &str, policy: &PolicyConfig) -> bool {
    href.contains(&policy.app_store_domain) && !href.contains(&policy.deprecated_app_store_domain)
}

/// Anchors pointing at either App Store domain
pub fn app_store_anchor(policy: &PolicyConfig) -> Target {
    Target::new(Locator::css(&format!(
        "a[href*=\"{}\"], a[href*=\"{}\"]",
        policy.deprecated_app_store_domain, policy.app_store_domain
    )))
}

pub fn play_store_anchor() -> Target {
    Target::new(Locator::css("a[href*=\"play.google.com\"]"))
}

pub fn void_anchor() -> Target {
    Target::new(Locator::css("a[href=\"javascript:void(0)\"]"))
}

/// Lazily read the hrefs of http anchors inside `footer`.
///
/// Only the first `limit` anchors are looked at; `javascript:` hrefs are
/// skipped. A failed href read is yielded as an error and discovery moves
/// on to the next anchor; a failed count ends the stream.
pub fn discover_footer_links<'a, P: Page + ?Sized>(
    page: &'a P,
    footer: &str,
    limit: usize,
) -> impl Stream<Item = E2eResult<String>> + 'a {
    let anchors = Target::new(Locator::css(&format!("{} a[href^=\"http\"]", footer)));

    stream::unfold(
        (0usize, None::<usize>, anchors),
        move |(mut index, mut bound, anchors)| async move {
            loop {
                let end = match bound {
                    Some(end) => end,
                    None => match page.count(&anchors).await {
                        Ok(count) => {
                            info!("Testing {} of {} footer links", count.min(limit), count);
                            bound = Some(count.min(limit));
                            count.min(limit)
                        }
                        Err(e) => return Some((Err(e), (index, Some(0), anchors))),
                    },
                };
                if index >= end {
                    return None;
                }

                let nth = index;
                index += 1;
                match page.attribute(&anchors, nth, "href").await {
                    Ok(Some(href)) if !href.contains("javascript:") => {
                        return Some((Ok(href), (index, bound, anchors)))
                    }
                    Ok(_) => continue,
                    Err(e) => return Some((Err(e), (index, bound, anchors))),
                }
            }
        },
    )
}

/// Reload the page and return console errors not covered by `ignore`
pub async fn check_no_console_errors<P: Page + ?Sized>(
    page: &P,
    ignore: &[String],
) -> E2eResult<Vec<String>> {
    let mut observer = PageObserver::attach(page);
    page.reload().await?;

    let critical: Vec<String> = observer
        .console_errors()
        .into_iter()
        .filter(|error| !ignore.iter().any(|known| error.contains(known.as_str())))
        .collect();

    if !critical.is_empty() {
        warn!("{} console error(s) after reload", critical.len());
    }
    Ok(critical)
}

/// `javascript:void(0)` anchors that have neither `onclick` nor `aria-label`
pub async fn check_void_links<P: Page + ?Sized>(page: &P) -> E2eResult<Vec<String>> {
    let anchors = void_anchor();
    let count = page.count(&anchors).await?;
    if count > 0 {
        warn!(
            "Found {} javascript:void(0) links - consider adding ARIA labels for accessibility",
            count
        );
    }

    let mut offenders = Vec::new();
    for nth in 0..count {
        let has_onclick = page.attribute(&anchors, nth, "onclick").await?.is_some();
        let has_aria_label = page.attribute(&anchors, nth, "aria-label").await?.is_some();
        if !has_onclick && !has_aria_label {
            offenders.push(format!(
                "javascript:void(0) link #{} has neither onclick nor aria-label",
                nth
            ));
        }
    }
    Ok(offenders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://apps.apple.com/au/app/dominos/id123" => true ; "current domain")]
    #[test_case("https://itunes.apple.com/au/app/dominos/id123" => false ; "deprecated domain")]
    #[test_case("https://apps.apple.com/redirect?to=itunes.apple.com" => false ; "mentions deprecated domain")]
    #[test_case("https://play.google.com/store/apps/details?id=au.com.dominos" => false ; "not an app store link")]
    fn test_app_store_link_format(href: &str) -> bool {
        check_app_store_link_format(href, &PolicyConfig::default())
    }

    #[test]
    fn test_failures_keeps_one_message_per_broken_link() {
        let ok = LinkEntry::new("Menu", "https://example.com/menu/", LinkCategory::Navigation).unwrap();
        let broken = LinkEntry::new("Offers", "https://example.com/offers/", LinkCategory::Navigation).unwrap();
        let results = vec![
            ProbeResult::pass(ProbeTarget::Link(ok), Observation::Status(200), "ok"),
            ProbeResult::fail(ProbeTarget::Link(broken.clone()), Observation::Status(404), "offers 404"),
            ProbeResult::fail(ProbeTarget::Link(broken), Observation::Status(500), "offers 500"),
        ];

        assert_eq!(failures(&results), vec!["offers 404".to_string(), "offers 500".to_string()]);
    }

    #[test]
    fn test_app_store_anchor_matches_both_domains() {
        let target = app_store_anchor(&PolicyConfig::default());
        let selector = target.primary.to_string();
        assert!(selector.contains("itunes.apple.com"));
        assert!(selector.contains("apps.apple.com"));
    }
}
