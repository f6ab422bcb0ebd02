use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::fetch::Fetch;
use super::text::inner_text;
use super::{bounded, BrowserSession, Element, Locator};
use crate::error::SessionError;

struct Page {
    url: Url,
    source: String,
}

/// Session over server-rendered HTML. Pages are fetched through a [`Fetch`]
/// and queried with `scraper`; there is no script engine, so collapsed panels
/// are already present in the markup and expansion settles immediately.
///
/// Element handles are `<generation>:<child-index path>` and go stale on the
/// next navigation.
pub struct StaticSession {
    fetcher: Arc<dyn Fetch>,
    nav_timeout: Duration,
    page: Option<Page>,
    generation: u64,
    closed: bool,
}

impl StaticSession {
    pub fn new(fetcher: Arc<dyn Fetch>, nav_timeout: Duration) -> Self {
        Self { fetcher, nav_timeout, page: None, generation: 0, closed: false }
    }

    fn page(&self) -> Result<&Page, SessionError> {
        if self.closed { return Err(SessionError::Closed); }
        self.page.as_ref().ok_or(SessionError::NoPage)
    }

    fn resolve_url(&self, url: &str) -> Result<Url, SessionError> {
        match Url::parse(url) {
            Ok(u) => Ok(u),
            Err(_) => {
                let base = self.page.as_ref().map(|p| &p.url).ok_or_else(|| SessionError::Navigation {
                    url: url.to_string(),
                    reason: "relative url without a current page".into(),
                })?;
                base.join(url).map_err(|e| SessionError::Navigation { url: url.to_string(), reason: e.to_string() })
            }
        }
    }

    fn query(&self, scope: Option<&Element>, locator: &Locator) -> Result<Vec<Element>, SessionError> {
        let page = self.page()?;
        let doc = Html::parse_document(&page.source);
        let root = match scope {
            Some(el) => self.lookup(&doc, el)?,
            None => doc.root_element(),
        };
        let matched: Vec<ElementRef<'_>> = match locator {
            Locator::Css(s) | Locator::Tag(s) => {
                let sel = Selector::parse(s).map_err(|_| SessionError::InvalidLocator(s.clone()))?;
                root.select(&sel).collect()
            }
            Locator::LinkText(t) => {
                let sel = Selector::parse("a").map_err(|_| SessionError::InvalidLocator("a".into()))?;
                root.select(&sel).filter(|a| inner_text(*a).trim() == t.trim()).collect()
            }
        };
        Ok(matched.into_iter().map(|el| self.handle(el)).collect())
    }

    fn handle(&self, el: ElementRef<'_>) -> Element {
        let mut path = Vec::new();
        let mut node = *el;
        while let Some(parent) = node.parent() {
            path.push(node.prev_siblings().count().to_string());
            node = parent;
        }
        path.reverse();
        Element(format!("{}:{}", self.generation, path.join(".")))
    }

    fn lookup<'a>(&self, doc: &'a Html, el: &Element) -> Result<ElementRef<'a>, SessionError> {
        let stale = || SessionError::StaleElement(el.0.clone());
        let (generation, path) = el.0.split_once(':').ok_or_else(stale)?;
        if generation.parse::<u64>().ok() != Some(self.generation) {
            return Err(stale());
        }
        let mut node = doc.tree.root();
        for idx in path.split('.').filter(|s| !s.is_empty()) {
            let idx: usize = idx.parse().map_err(|_| stale())?;
            node = node.children().nth(idx).ok_or_else(stale)?;
        }
        ElementRef::wrap(node).ok_or_else(stale)
    }

    fn with_element<T>(&self, el: &Element, f: impl FnOnce(ElementRef<'_>, &Url) -> T) -> Result<T, SessionError> {
        let page = self.page()?;
        let doc = Html::parse_document(&page.source);
        let found = self.lookup(&doc, el)?;
        Ok(f(found, &page.url))
    }
}

enum ClickAction {
    Follow(Url),
    Fragment(String),
    Nothing,
}

#[async_trait]
impl BrowserSession for StaticSession {
    fn kind(&self) -> &'static str { "static" }

    fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|p| p.url.as_str())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if self.closed { return Err(SessionError::Closed); }
        let target = self.resolve_url(url)?;
        let source = bounded("navigate", self.nav_timeout, self.fetcher.fetch_text(target.as_str())).await?;
        self.generation += 1;
        self.page = Some(Page { url: target, source });
        Ok(())
    }

    async fn find_all(&mut self, scope: Option<&Element>, locator: &Locator) -> Result<Vec<Element>, SessionError> {
        self.query(scope, locator)
    }

    async fn read_text(&mut self, el: &Element) -> Result<String, SessionError> {
        self.with_element(el, |e, _| inner_text(e))
    }

    async fn read_attribute(&mut self, el: &Element, name: &str) -> Result<Option<String>, SessionError> {
        self.with_element(el, |e, base| {
            let raw = e.value().attr(name)?;
            if matches!(name, "href" | "src") {
                // mirror the DOM property: links come back absolute
                Some(base.join(raw).map(|u| u.to_string()).unwrap_or_else(|_| raw.to_string()))
            } else {
                Some(raw.to_string())
            }
        })
    }

    async fn read_inner_html(&mut self, el: &Element) -> Result<String, SessionError> {
        self.with_element(el, |e, _| e.inner_html())
    }

    async fn click(&mut self, el: &Element) -> Result<(), SessionError> {
        let action = self.with_element(el, |e, base| {
            if e.value().name() != "a" { return ClickAction::Nothing; }
            match e.value().attr("href").map(str::trim) {
                Some(h) if h.starts_with('#') => ClickAction::Fragment(h.trim_start_matches('#').to_string()),
                Some(h) if h.is_empty() || h.starts_with("javascript:") => ClickAction::Nothing,
                Some(h) => base.join(h).map(ClickAction::Follow).unwrap_or(ClickAction::Nothing),
                None => ClickAction::Nothing,
            }
        })?;
        match action {
            ClickAction::Follow(target) => self.navigate(target.as_str()).await,
            ClickAction::Fragment(frag) => {
                if let Some(page) = self.page.as_mut() { page.url.set_fragment(Some(&frag)); }
                Ok(())
            }
            ClickAction::Nothing => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closed = true;
        self.page = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixture::FixtureFetcher;

    const SITE: &str = "https://example.test/";

    fn session(fetcher: FixtureFetcher) -> StaticSession {
        StaticSession::new(Arc::new(fetcher), Duration::from_secs(5))
    }

    fn fixture() -> FixtureFetcher {
        FixtureFetcher::new()
            .page(SITE, r##"<html><body>
                <ul id="list"><li><a href="a/">First</a></li><li><a href="/b/file.bin">Second</a></li></ul>
                <a href="#Firmware">Firmware</a>
                <div class="panel"><div>inner</div></div>
            </body></html>"##)
            .page("https://example.test/a/", "<html><body><h1>A page</h1></body></html>")
    }

    #[tokio::test]
    async fn finds_scoped_elements_and_resolves_links() {
        let mut s = session(fixture());
        s.navigate(SITE).await.unwrap();
        let list = s.find(None, &Locator::css("#list")).await.unwrap().unwrap();
        let links = s.find_all(Some(&list), &Locator::tag("a")).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(s.read_text(&links[1]).await.unwrap(), "Second");
        assert_eq!(
            s.read_attribute(&links[1], "href").await.unwrap().as_deref(),
            Some("https://example.test/b/file.bin")
        );
    }

    #[tokio::test]
    async fn scoped_query_excludes_the_scope_itself() {
        let mut s = session(fixture());
        s.navigate(SITE).await.unwrap();
        let panel = s.find(None, &Locator::css("div.panel")).await.unwrap().unwrap();
        let divs = s.find_all(Some(&panel), &Locator::tag("div")).await.unwrap();
        assert_eq!(divs.len(), 1);
        assert_eq!(s.read_text(&divs[0]).await.unwrap(), "inner");
    }

    #[tokio::test]
    async fn link_text_locator_and_click_navigation() {
        let mut s = session(fixture());
        s.navigate(SITE).await.unwrap();
        let first = s.find(None, &Locator::link_text("First")).await.unwrap().unwrap();
        s.click(&first).await.unwrap();
        assert_eq!(s.current_url(), Some("https://example.test/a/"));
        // the old handle belongs to the previous page
        assert!(matches!(s.read_text(&first).await, Err(SessionError::StaleElement(_))));
    }

    #[tokio::test]
    async fn fragment_click_keeps_page() {
        let mut s = session(fixture());
        s.navigate(SITE).await.unwrap();
        let tab = s.find(None, &Locator::css("a[href='#Firmware']")).await.unwrap().unwrap();
        s.click(&tab).await.unwrap();
        assert_eq!(s.current_url(), Some("https://example.test/#Firmware"));
        assert_eq!(s.read_text(&tab).await.unwrap(), "Firmware");
    }

    #[tokio::test]
    async fn navigation_failure_and_closed_session() {
        let mut s = session(fixture());
        assert!(s.navigate("https://example.test/missing").await.is_err());
        assert!(matches!(s.find(None, &Locator::css("a")).await, Err(SessionError::NoPage)));
        s.close().await.unwrap();
        assert!(matches!(s.navigate(SITE).await, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn wait_until_times_out_on_missing_element() {
        let mut s = session(fixture());
        s.navigate(SITE).await.unwrap();
        let cond = crate::session::WaitCondition::Rendered { scope: None, locator: Locator::css("#never") };
        let err = s.wait_until(&cond, Duration::from_millis(30), Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout { .. }));
    }
}
