//! Playwright browser automation
//!
//! A single Node.js driver process runs [`DRIVER_SCRIPT`] and keeps one browser
//! open for the whole run. Requests and responses are JSON lines on the
//! driver's stdin/stdout, matched by id; console and dialog events arrive on
//! the same stream and are fanned out over a broadcast channel. Every dialog
//! is dismissed by the driver as soon as it opens.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use sitecheck_common::config::{BrowserKind, HarnessConfig};
use sitecheck_common::Target;

use crate::error::{E2eError, E2eResult};
use crate::page::{ConsoleMessage, DialogEvent, Page, PageEvent, PageEventKind};

/// Events buffered per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 1024;

/// Node.js side of the bridge
pub const DRIVER_SCRIPT: &str = r##"
const readline = require('readline');
const playwright = require('playwright');

const config = JSON.parse(process.argv[2]);
const pages = new Map();
let browser = null;
let nextPage = 1;

function emit(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

function build(page, locator) {
  switch (locator.by) {
    case 'role': {
      let found = page.getByRole(locator.role, locator.name ? { name: locator.name } : {});
      if (locator.has_text) {
        found = found.filter({ hasText: new RegExp(locator.has_text) });
      }
      return found;
    }
    case 'css':
      return page.locator(locator.selector);
    case 'text':
      return page.getByText(locator.text);
    default:
      throw new Error('unknown locator: ' + locator.by);
  }
}

async function resolve(page, target) {
  const primary = build(page, target.primary);
  if (target.fallback && (await primary.count()) === 0) {
    return build(page, target.fallback);
  }
  return primary;
}

const ops = {
  async open() {
    const context = await browser.newContext({
      viewport: { width: config.viewport_width, height: config.viewport_height },
    });
    const page = await context.newPage();
    page.setDefaultTimeout(config.action_timeout_ms);
    page.setDefaultNavigationTimeout(config.navigation_timeout_ms);
    const id = nextPage++;
    page.on('console', (msg) => emit({ event: 'console', page: id, level: msg.type(), text: msg.text() }));
    page.on('dialog', async (dialog) => {
      emit({ event: 'dialog', page: id, kind: dialog.type(), message: dialog.message() });
      await dialog.dismiss().catch(() => {});
    });
    pages.set(id, { context, page });
    return id;
  },
  async close(req, session) {
    pages.delete(req.page);
    await session.context.close();
    return null;
  },
  async goto(req, session) {
    await session.page.goto(req.url, { waitUntil: 'networkidle' });
    return null;
  },
  async reload(req, session) {
    await session.page.reload({ waitUntil: 'networkidle' });
    return null;
  },
  async fill(req, session) {
    await (await resolve(session.page, req.target)).first().fill(req.value);
    return null;
  },
  async clear(req, session) {
    await (await resolve(session.page, req.target)).first().clear();
    return null;
  },
  async press_sequentially(req, session) {
    await (await resolve(session.page, req.target)).first().pressSequentially(req.text, { delay: req.delay_ms });
    return null;
  },
  async input_value(req, session) {
    return await (await resolve(session.page, req.target)).first().inputValue();
  },
  async is_visible(req, session) {
    const found = await resolve(session.page, req.target);
    return (await found.count()) > 0 && (await found.first().isVisible());
  },
  async click(req, session) {
    await (await resolve(session.page, req.target)).first().click();
    return null;
  },
  async count(req, session) {
    return await (await resolve(session.page, req.target)).count();
  },
  async attribute(req, session) {
    const found = await resolve(session.page, req.target);
    if (req.nth >= (await found.count())) {
      return null;
    }
    return await found.nth(req.nth).getAttribute(req.name);
  },
  async content(req, session) {
    return await session.page.content();
  },
  async url(req, session) {
    return session.page.url();
  },
  async shutdown() {
    setImmediate(async () => {
      await browser.close().catch(() => {});
      process.exit(0);
    });
    return null;
  },
};

async function handle(req) {
  try {
    const op = ops[req.op];
    if (!op) {
      throw new Error('unknown op: ' + req.op);
    }
    let session = null;
    if (req.page !== undefined) {
      session = pages.get(req.page);
      if (!session) {
        throw new Error('unknown page: ' + req.page);
      }
    }
    const result = await op(req, session);
    emit({ id: req.id, ok: true, result: result === undefined ? null : result });
  } catch (error) {
    emit({ id: req.id, ok: false, error: String((error && error.message) || error) });
  }
}

(async () => {
  try {
    browser = await playwright[config.browser].launch({ headless: config.headless });
  } catch (error) {
    emit({ event: 'fatal', message: String((error && error.message) || error) });
    process.exit(1);
  }
  emit({ event: 'ready' });

  const input = readline.createInterface({ input: process.stdin });
  for await (const line of input) {
    if (line.trim().length === 0) {
      continue;
    }
    let req;
    try {
      req = JSON.parse(line);
    } catch (error) {
      emit({ event: 'fatal', message: 'bad request: ' + line });
      continue;
    }
    handle(req);
  }
  await browser.close().catch(() => {});
})();
"##;

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub node_binary: PathBuf,
    pub node_path: Option<PathBuf>,

    /// Bound on the driver becoming ready
    pub startup_timeout: Duration,

    /// Bound on any single request/response round trip
    pub request_timeout: Duration,

    /// Playwright navigation timeout
    pub navigation_timeout: Duration,

    /// Playwright per-action timeout (fill, click, ...)
    pub action_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_binary: PathBuf::from("node"),
            node_path: None,
            startup_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(45),
            navigation_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&HarnessConfig> for PlaywrightConfig {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            browser: config.browser.browser,
            headless: config.browser.headless,
            viewport_width: config.browser.viewport_width,
            viewport_height: config.browser.viewport_height,
            node_binary: config.browser.node_binary.clone(),
            node_path: config.browser.node_path.clone(),
            request_timeout: Duration::from_millis(config.timeouts.driver_request_ms),
            navigation_timeout: Duration::from_millis(config.timeouts.navigation_ms),
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    id: u64,
    op: &'a str,
    #[serde(flatten)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    Ready,
    Fatal { message: String },
    Console { page: u64, level: String, text: String },
    Dialog { page: u64, kind: String, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
    Response(WireResponse),
    Event(WireEvent),
}

type PendingMap = parking_lot::Mutex<HashMap<u64, oneshot::Sender<WireResponse>>>;

/// Handle to the running driver process
pub struct PlaywrightDriver {
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
    pending: Arc<PendingMap>,
    events: broadcast::Sender<PageEvent>,
    next_id: AtomicU64,
    request_timeout: Duration,

    /// Holds the driver script on disk while the process runs
    _script_dir: tempfile::TempDir,
}

impl PlaywrightDriver {
    /// Spawn the driver and wait until its browser is up
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Arc<Self>> {
        Self::check_playwright_installed(&config)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("sitecheck-driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;

        let launch_args = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "viewport_width": config.viewport_width,
            "viewport_height": config.viewport_height,
            "navigation_timeout_ms": config.navigation_timeout.as_millis() as u64,
            "action_timeout_ms": config.action_timeout.as_millis() as u64,
        });

        let mut cmd = TokioCommand::new(&config.node_binary);
        cmd.arg(&script_path)
            .arg(launch_args.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::Playwright(format!(
                "Failed to spawn {}: {}",
                config.node_binary.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Protocol("driver stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Protocol("driver stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| E2eError::Protocol("driver stderr not captured".to_string()))?;

        let pending: Arc<PendingMap> = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(read_driver_output(
            stdout,
            Arc::clone(&pending),
            events.clone(),
            ready_tx,
        ));
        tokio::spawn(log_driver_stderr(stderr));

        match timeout(config.startup_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(message))) => {
                return Err(E2eError::Playwright(format!("browser launch failed: {}", message)))
            }
            Ok(Err(_)) => {
                return Err(E2eError::DriverExited(
                    "driver exited before becoming ready".to_string(),
                ))
            }
            Err(_) => return Err(E2eError::Timeout("Playwright driver startup".to_string())),
        }

        info!(
            "Playwright driver ready ({}, headless: {})",
            config.browser.as_str(),
            config.headless
        );

        Ok(Arc::new(Self {
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
            pending,
            events,
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout,
            _script_dir: script_dir,
        }))
    }

    /// Check that node can resolve the `playwright` package
    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let mut cmd = Command::new(&config.node_binary);
        cmd.args(["-e", "require.resolve('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        match cmd.status() {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Open a new isolated browser context with one page
    pub async fn new_session(self: &Arc<Self>) -> E2eResult<BrowserSession> {
        let result = self.call("open", json!({}), self.request_timeout).await?;
        let page = result
            .as_u64()
            .ok_or_else(|| E2eError::Protocol(format!("open returned {}", result)))?;
        debug!("Opened page {}", page);

        Ok(BrowserSession {
            driver: Arc::clone(self),
            page,
            closed: AtomicBool::new(false),
        })
    }

    /// Send one request and wait at most `budget` for its response
    async fn call(&self, op: &str, params: Value, budget: Duration) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&WireRequest { id, op, params })?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        debug!("-> #{} {}", id, op);

        {
            let mut stdin = self.stdin.lock().await;
            let written = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            }
            .await;
            if let Err(e) = written {
                self.pending.lock().remove(&id);
                return Err(E2eError::DriverExited(e.to_string()));
            }
        }

        match timeout(budget, rx).await {
            Ok(Ok(response)) if response.ok => Ok(response.result),
            Ok(Ok(response)) => Err(E2eError::Playwright(
                response
                    .error
                    .unwrap_or_else(|| format!("{} failed", op)),
            )),
            Ok(Err(_)) => Err(E2eError::DriverExited(format!("no response to {}", op))),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(E2eError::Timeout(format!(
                    "driver response to {} after {} ms",
                    op,
                    budget.as_millis()
                )))
            }
        }
    }

    /// Close the browser and wait for the driver to exit
    pub async fn shutdown(&self) -> E2eResult<()> {
        info!("Stopping Playwright driver");

        if let Err(e) = self.call("shutdown", json!({}), Duration::from_secs(5)).await {
            warn!("Driver shutdown request failed: {}", e);
        }

        let mut child = self.child.lock().await;
        match timeout(Duration::from_secs(10), child.wait()).await {
            Ok(Ok(status)) => debug!("Driver exited with {}", status),
            Ok(Err(e)) => warn!("Failed to reap driver: {}", e),
            Err(_) => {
                warn!("Driver did not exit, killing it");
                child.start_kill()?;
            }
        }

        Ok(())
    }
}

/// Route driver stdout lines to pending requests and event subscribers
async fn read_driver_output(
    stdout: ChildStdout,
    pending: Arc<PendingMap>,
    events: broadcast::Sender<PageEvent>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading driver output: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Incoming>(&line) {
            Ok(Incoming::Response(response)) => {
                let waiter = pending.lock().remove(&response.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!("Dropping response to abandoned request #{}", response.id),
                }
            }
            Ok(Incoming::Event(WireEvent::Ready)) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Incoming::Event(WireEvent::Fatal { message })) => {
                error!("Playwright driver: {}", message);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(message));
                }
            }
            Ok(Incoming::Event(WireEvent::Console { page, level, text })) => {
                debug!("[page {} console.{}] {}", page, level, text);
                // No subscribers is fine: nobody is observing this page
                let _ = events.send(PageEvent {
                    page,
                    kind: PageEventKind::Console(ConsoleMessage { level, text }),
                });
            }
            Ok(Incoming::Event(WireEvent::Dialog {
                page,
                kind,
                message,
            })) => {
                warn!("[page {}] native {} dialog dismissed: {}", page, kind, message);
                let _ = events.send(PageEvent {
                    page,
                    kind: PageEventKind::Dialog(DialogEvent { kind, message }),
                });
            }
            Err(_) => debug!("Driver output: {}", line),
        }
    }

    // Dropping the senders wakes every waiter with DriverExited
    pending.lock().clear();
}

async fn log_driver_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!("Playwright driver stderr: {}", line);
    }
}

/// One browser context and page, owned by a single scenario
pub struct BrowserSession {
    driver: Arc<PlaywrightDriver>,
    page: u64,
    closed: AtomicBool,
}

impl BrowserSession {
    async fn request(&self, op: &str, params: Value) -> E2eResult<Value> {
        self.request_with_budget(op, params, self.driver.request_timeout)
            .await
    }

    async fn request_with_budget(
        &self,
        op: &str,
        mut params: Value,
        budget: Duration,
    ) -> E2eResult<Value> {
        params["page"] = json!(self.page);
        self.driver.call(op, params, budget).await
    }

    /// Close the browser context
    pub async fn close(&self) -> E2eResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("Closing page {}", self.page);
        self.request("close", json!({})).await.map(|_| ())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        // Best effort: the scenario was cancelled before closing its context
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let driver = Arc::clone(&self.driver);
            let page = self.page;
            handle.spawn(async move {
                let budget = driver.request_timeout;
                if let Err(e) = driver.call("close", json!({ "page": page }), budget).await {
                    debug!("Late close of page {} failed: {}", page, e);
                }
            });
        }
    }
}

fn expect_string(op: &str, value: Value) -> E2eResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(E2eError::Protocol(format!("{} returned {}", op, other))),
    }
}

fn expect_bool(op: &str, value: Value) -> E2eResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| E2eError::Protocol(format!("{} returned {}", op, value)))
}

#[async_trait]
impl Page for BrowserSession {
    fn id(&self) -> u64 {
        self.page
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.driver.events.subscribe()
    }

    async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("Navigating page {} to {}", self.page, url);
        self.request("goto", json!({ "url": url })).await.map(|_| ())
    }

    async fn reload(&self) -> E2eResult<()> {
        self.request("reload", json!({})).await.map(|_| ())
    }

    async fn fill(&self, target: &Target, value: &str) -> E2eResult<()> {
        self.request("fill", json!({ "target": target, "value": value }))
            .await
            .map(|_| ())
    }

    async fn clear(&self, target: &Target) -> E2eResult<()> {
        self.request("clear", json!({ "target": target }))
            .await
            .map(|_| ())
    }

    async fn press_sequentially(
        &self,
        target: &Target,
        text: &str,
        delay: Duration,
    ) -> E2eResult<()> {
        // Typing time grows with the payload; the request bound has to as well
        let typing = delay * text.chars().count() as u32;
        self.request_with_budget(
            "press_sequentially",
            json!({ "target": target, "text": text, "delay_ms": delay.as_millis() as u64 }),
            self.driver.request_timeout + typing,
        )
        .await
        .map(|_| ())
    }

    async fn input_value(&self, target: &Target) -> E2eResult<String> {
        let value = self.request("input_value", json!({ "target": target })).await?;
        expect_string("input_value", value)
    }

    async fn is_visible(&self, target: &Target) -> E2eResult<bool> {
        let value = self.request("is_visible", json!({ "target": target })).await?;
        expect_bool("is_visible", value)
    }

    async fn click(&self, target: &Target) -> E2eResult<()> {
        self.request("click", json!({ "target": target }))
            .await
            .map(|_| ())
    }

    async fn count(&self, target: &Target) -> E2eResult<usize> {
        let value = self.request("count", json!({ "target": target })).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Protocol(format!("count returned {}", value)))
    }

    async fn attribute(
        &self,
        target: &Target,
        nth: usize,
        name: &str,
    ) -> E2eResult<Option<String>> {
        let value = self
            .request(
                "attribute",
                json!({ "target": target, "nth": nth, "name": name }),
            )
            .await?;
        match value {
            Value::Null => Ok(None),
            other => expect_string("attribute", other).map(Some),
        }
    }

    async fn content(&self) -> E2eResult<String> {
        let value = self.request("content", json!({})).await?;
        expect_string("content", value)
    }

    async fn url(&self) -> E2eResult<String> {
        let value = self.request("url", json!({})).await?;
        expect_string("url", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecheck_common::Locator;

    #[test]
    fn test_request_flattens_params() {
        let target = Target::new(Locator::role("textbox", "Search")).or(Locator::css("input"));
        let line = serde_json::to_value(WireRequest {
            id: 7,
            op: "fill",
            params: json!({ "page": 2, "target": target, "value": "2000" }),
        })
        .unwrap();

        assert_eq!(line["id"], 7);
        assert_eq!(line["op"], "fill");
        assert_eq!(line["page"], 2);
        assert_eq!(line["target"]["primary"]["by"], "role");
        assert_eq!(line["target"]["primary"]["name"], "Search");
        assert_eq!(line["target"]["fallback"]["selector"], "input");
    }

    #[test]
    fn test_incoming_distinguishes_responses_and_events() {
        let response: Incoming =
            serde_json::from_str(r#"{"id":3,"ok":true,"result":"2000"}"#).unwrap();
        assert!(matches!(response, Incoming::Response(WireResponse { id: 3, ok: true, .. })));

        let failure: Incoming =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":"Timeout 10000ms exceeded"}"#)
                .unwrap();
        match failure {
            Incoming::Response(r) => assert_eq!(r.error.as_deref(), Some("Timeout 10000ms exceeded")),
            other => panic!("expected response, got {:?}", other),
        }

        let dialog: Incoming = serde_json::from_str(
            r#"{"event":"dialog","page":1,"kind":"alert","message":"XSS"}"#,
        )
        .unwrap();
        assert!(matches!(
            dialog,
            Incoming::Event(WireEvent::Dialog { page: 1, .. })
        ));

        let ready: Incoming = serde_json::from_str(r#"{"event":"ready"}"#).unwrap();
        assert!(matches!(ready, Incoming::Event(WireEvent::Ready)));
    }

    #[test]
    fn test_config_from_harness_config() {
        let mut harness = HarnessConfig::default();
        harness.browser.browser = BrowserKind::Webkit;
        harness.timeouts.navigation_ms = 12_000;

        let config = PlaywrightConfig::from(&harness);
        assert_eq!(config.browser, BrowserKind::Webkit);
        assert_eq!(config.navigation_timeout, Duration::from_secs(12));
        assert!(config.headless);
    }

    #[test]
    fn test_driver_script_handles_every_page_operation() {
        for op in [
            "open", "close", "goto", "reload", "fill", "clear", "press_sequentially",
            "input_value", "is_visible", "click", "count", "attribute", "content", "url",
            "shutdown",
        ] {
            assert!(
                DRIVER_SCRIPT.contains(&format!("async {}(", op)),
                "driver script is missing op {}",
                op
            );
        }
        assert!(DRIVER_SCRIPT.contains("dialog.dismiss()"));
    }
}
