use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element as DomElement;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{bounded, BrowserSession, Element, Locator};
use crate::error::SessionError;

#[derive(Clone, Debug)]
pub struct ChromeConfig {
    /// DevTools websocket of an already running browser; a local Chrome is
    /// launched when unset.
    pub connect_url: Option<String>,
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub nav_timeout: Duration,
    pub user_agent: String,
}

/// Live browser session over the Chrome DevTools Protocol (`chromiumoxide`).
///
/// Elements returned by the driver are kept in a per-page registry; handles
/// are `<generation>:<index>` into it and go stale once the document changes.
pub struct ChromeSession {
    browser: Option<Browser>,
    launched: bool,
    handler: JoinHandle<()>,
    page: Page,
    nav_timeout: Duration,
    current: Option<String>,
    generation: u64,
    registry: Vec<DomElement>,
}

fn cdp(e: CdpError) -> SessionError {
    SessionError::Browser(e.to_string())
}

impl ChromeSession {
    pub async fn start(cfg: ChromeConfig) -> Result<Self, SessionError> {
        let (browser, mut handler) = match &cfg.connect_url {
            Some(url) => bounded("connect browser", cfg.nav_timeout, async { Browser::connect(url.clone()).await.map_err(cdp) }).await?,
            None => {
                let mut builder = BrowserConfig::builder()
                    .window_size(1920, 1080)
                    .request_timeout(cfg.nav_timeout)
                    .arg(format!("--user-agent={}", cfg.user_agent));
                if !cfg.headless {
                    builder = builder.with_head();
                }
                if let Some(path) = &cfg.executable {
                    builder = builder.chrome_executable(path);
                }
                let config = builder.build().map_err(SessionError::Browser)?;
                bounded("launch browser", cfg.nav_timeout, async { Browser::launch(config).await.map_err(cdp) }).await?
            }
        };

        // the handler drives the websocket; the browser is unusable without it
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser connection closed: {e}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(cdp(e));
            }
        };

        Ok(Self {
            browser: Some(browser),
            launched: cfg.connect_url.is_none(),
            handler,
            page,
            nav_timeout: cfg.nav_timeout,
            current: None,
            generation: 0,
            registry: Vec::new(),
        })
    }

    fn new_document(&mut self, url: Option<String>) {
        self.generation += 1;
        self.registry.clear();
        self.current = url;
    }

    fn register(&mut self, found: Vec<DomElement>) -> Vec<Element> {
        found
            .into_iter()
            .map(|el| {
                self.registry.push(el);
                Element(format!("{}:{}", self.generation, self.registry.len() - 1))
            })
            .collect()
    }

    fn lookup(&self, el: &Element) -> Result<&DomElement, SessionError> {
        registry_index(&el.0, self.generation)
            .and_then(|idx| self.registry.get(idx))
            .ok_or_else(|| SessionError::StaleElement(el.0.clone()))
    }
}

/// Index into the registry when `handle` belongs to the current generation.
fn registry_index(handle: &str, generation: u64) -> Option<usize> {
    let (gen_part, idx) = handle.split_once(':')?;
    if gen_part.parse::<u64>().ok()? != generation {
        return None;
    }
    idx.parse().ok()
}

/// CSS selector for a locator, plus the link text to filter on.
fn selector(locator: &Locator) -> (&str, Option<&str>) {
    match locator {
        Locator::Css(s) | Locator::Tag(s) => (s.as_str(), None),
        Locator::LinkText(t) => ("a", Some(t.as_str())),
    }
}

fn same_document(a: Option<&str>, b: Option<&str>) -> bool {
    let strip = |u: Option<&str>| u.map(|u| u.split('#').next().unwrap_or(u).to_string());
    strip(a) == strip(b)
}

/// What a click did to the address bar.
#[derive(Debug, PartialEq, Eq)]
enum AfterClick {
    NewDocument(Option<String>),
    SameDocument(Option<String>),
    Unknown,
}

/// The click itself has already succeeded; a failed URL read only leaves the
/// current document as it was.
fn after_click<E: std::fmt::Display>(current: Option<&str>, refreshed: Result<Option<String>, E>) -> AfterClick {
    match refreshed {
        Ok(now) if !same_document(current, now.as_deref()) => AfterClick::NewDocument(now),
        Ok(now) => AfterClick::SameDocument(now),
        Err(e) => {
            debug!("url unknown after click: {e}");
            AfterClick::Unknown
        }
    }
}

fn scalar(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn kind(&self) -> &'static str { "chrome" }

    fn current_url(&self) -> Option<&str> { self.current.as_deref() }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if self.browser.is_none() { return Err(SessionError::Closed); }
        let page = &self.page;
        bounded("navigate", self.nav_timeout, async {
            page.goto(url)
                .await
                .map(|_| ())
                .map_err(|e| SessionError::Navigation { url: url.to_string(), reason: e.to_string() })
        })
        .await?;
        let landed = self.page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());
        self.new_document(Some(landed));
        Ok(())
    }

    async fn find_all(&mut self, scope: Option<&Element>, locator: &Locator) -> Result<Vec<Element>, SessionError> {
        if self.browser.is_none() { return Err(SessionError::Closed); }
        let (css, link_text) = selector(locator);
        let found = match scope {
            Some(el) => self.lookup(el)?.find_elements(css).await,
            None => self.page.find_elements(css).await,
        }
        .map_err(cdp)?;

        let mut matched = Vec::with_capacity(found.len());
        for el in found {
            if let Some(want) = link_text {
                let text = el.inner_text().await.map_err(cdp)?.unwrap_or_default();
                if text.trim() != want.trim() { continue; }
            }
            matched.push(el);
        }
        Ok(self.register(matched))
    }

    async fn read_text(&mut self, el: &Element) -> Result<String, SessionError> {
        Ok(self.lookup(el)?.inner_text().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn read_attribute(&mut self, el: &Element, name: &str) -> Result<Option<String>, SessionError> {
        let dom = self.lookup(el)?;
        // properties first so links come back absolute, raw attribute otherwise
        if let Some(v) = dom.property(name).await.map_err(cdp)?.and_then(scalar) {
            return Ok(Some(v));
        }
        dom.attribute(name).await.map_err(cdp)
    }

    async fn read_inner_html(&mut self, el: &Element) -> Result<String, SessionError> {
        Ok(self.lookup(el)?.inner_html().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn click(&mut self, el: &Element) -> Result<(), SessionError> {
        self.lookup(el)?.click().await.map_err(cdp)?;
        let refreshed = self.page.url().await;
        match after_click(self.current.as_deref(), refreshed) {
            AfterClick::NewDocument(now) => self.new_document(now),
            AfterClick::SameDocument(Some(now)) => self.current = Some(now),
            AfterClick::SameDocument(None) | AfterClick::Unknown => {}
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let Some(mut browser) = self.browser.take() else { return Ok(()) };
        self.registry.clear();
        let res = if self.launched {
            let closed = bounded("close browser", self.nav_timeout, async { browser.close().await.map(|_| ()).map_err(cdp) }).await;
            let _ = browser.wait().await;
            closed
        } else {
            // attached browsers outlive the run; only the tab is ours
            let page = self.page.clone();
            bounded("close tab", self.nav_timeout, async move { page.close().await.map_err(cdp) }).await
        };
        self.handler.abort();
        res
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // aborted runs never reach close(); dropping `Browser` kills a launched process
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_locators_to_selectors() {
        assert_eq!(selector(&Locator::css("pre > a")), ("pre > a", None));
        assert_eq!(selector(&Locator::tag("h3")), ("h3", None));
        assert_eq!(selector(&Locator::link_text("DOWNLOADS / FIRMWARE")), ("a", Some("DOWNLOADS / FIRMWARE")));
    }

    #[test]
    fn handles_expire_with_the_document() {
        assert_eq!(registry_index("3:7", 3), Some(7));
        assert_eq!(registry_index("2:7", 3), None);
        assert_eq!(registry_index("garbage", 3), None);
        assert_eq!(registry_index("3:x", 3), None);
    }

    #[test]
    fn fragment_changes_keep_the_document() {
        let page = Some("https://www.tp-link.com/de/support/download/archer-c7/");
        assert!(same_document(page, Some("https://www.tp-link.com/de/support/download/archer-c7/#Firmware")));
        assert!(!same_document(page, Some("https://www.tp-link.com/de/support/download/archer-c6/")));
        assert!(same_document(None, None));
    }

    #[test]
    fn unreadable_url_after_click_keeps_the_document() {
        let page = Some("https://www.linksys.com/support/EA8300/");
        assert_eq!(after_click(page, Err::<Option<String>, _>("websocket closed")), AfterClick::Unknown);
        assert_eq!(
            after_click::<&str>(page, Ok(Some("https://www.linksys.com/support/EA8300/#downloads".into()))),
            AfterClick::SameDocument(Some("https://www.linksys.com/support/EA8300/#downloads".into()))
        );
        assert_eq!(
            after_click::<&str>(page, Ok(Some("https://www.linksys.com/support/EA9500/".into()))),
            AfterClick::NewDocument(Some("https://www.linksys.com/support/EA9500/".into()))
        );
    }

    #[test]
    fn reads_scalar_properties() {
        assert_eq!(scalar(json!("https://x.test/a")), Some("https://x.test/a".into()));
        assert_eq!(scalar(json!(3)), Some("3".into()));
        assert_eq!(scalar(Value::Null), None);
    }
}
