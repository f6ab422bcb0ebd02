//! Click-to-reveal panels as a two-phase protocol: request the expansion,
//! then read the revealed content once it renders or the wait expires.

use std::time::Duration;

use crate::error::ExpansionError;
use crate::session::{BrowserSession, Element, Locator, WaitCondition};

/// An expansion that was requested but not yet observed.
#[derive(Debug)]
#[must_use = "an expansion is only useful once read"]
pub struct PendingExpansion {
    container: String,
    panel: Option<Element>,
}

pub async fn request_expansion(
    session: &mut dyn BrowserSession,
    container: &str,
    toggle: &Element,
    panel: Option<Element>,
) -> Result<PendingExpansion, ExpansionError> {
    session.click(toggle).await.map_err(|e| ExpansionError::from_session(container, e))?;
    Ok(PendingExpansion { container: container.to_string(), panel })
}

impl PendingExpansion {
    /// Wait until a `ready` match inside the panel renders text, then return
    /// all matches. Content that stays collapsed is an error, not an empty list.
    pub async fn read(
        self,
        session: &mut dyn BrowserSession,
        ready: &Locator,
        timeout: Duration,
        poll: Duration,
    ) -> Result<Vec<Element>, ExpansionError> {
        let cond = WaitCondition::Rendered { scope: self.panel.clone(), locator: ready.clone() };
        session
            .wait_until(&cond, timeout, poll)
            .await
            .map_err(|e| ExpansionError::from_session(self.container.clone(), e))?;
        session
            .find_all(self.panel.as_ref(), ready)
            .await
            .map_err(|e| ExpansionError::from_session(self.container, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::error::SessionError;
    use crate::session::fixture::FixtureFetcher;
    use crate::session::static_html::StaticSession;

    const PAGE: &str = "https://vendor.test/support";

    async fn session() -> StaticSession {
        let fetcher = FixtureFetcher::new().page(PAGE, r#"<html><body>
            <div class="toggle">Version 1</div>
            <div class="panel"><h3>Firmware</h3><h3>Release notes</h3></div>
            <div class="toggle">Version 2</div>
            <div class="panel"><p>nothing here</p></div>
        </body></html>"#);
        let mut s = StaticSession::new(Arc::new(fetcher), Duration::from_secs(5));
        s.navigate(PAGE).await.unwrap();
        s
    }

    #[tokio::test]
    async fn reads_revealed_content() {
        let mut s = session().await;
        let toggles = s.find_all(None, &Locator::css("div.toggle")).await.unwrap();
        let panels = s.find_all(None, &Locator::css("div.panel")).await.unwrap();
        let pending = request_expansion(&mut s, "Version 1", &toggles[0], Some(panels[0].clone())).await.unwrap();
        let titles = pending
            .read(&mut s, &Locator::tag("h3"), Duration::from_millis(50), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(titles.len(), 2);
    }

    #[tokio::test]
    async fn expansion_that_never_settles_is_an_error() {
        let mut s = session().await;
        let toggles = s.find_all(None, &Locator::css("div.toggle")).await.unwrap();
        let panels = s.find_all(None, &Locator::css("div.panel")).await.unwrap();
        let pending = request_expansion(&mut s, "Version 2", &toggles[1], Some(panels[1].clone())).await.unwrap();
        let err = pending
            .read(&mut s, &Locator::tag("h3"), Duration::from_millis(30), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.container, "Version 2");
        assert!(err.reason.contains("timed out"));
    }

    /// Accordion whose content is always in the DOM but renders empty until
    /// some polls after the toggle was clicked.
    struct Accordion {
        clicked: bool,
        renders_after: usize,
        reads: usize,
    }

    #[async_trait]
    impl BrowserSession for Accordion {
        fn kind(&self) -> &'static str { "accordion" }
        fn current_url(&self) -> Option<&str> { Some(PAGE) }
        async fn navigate(&mut self, _url: &str) -> Result<(), SessionError> { Ok(()) }
        async fn find_all(&mut self, _scope: Option<&Element>, _locator: &Locator) -> Result<Vec<Element>, SessionError> {
            Ok(vec![Element("0:title".into())])
        }
        async fn read_text(&mut self, _el: &Element) -> Result<String, SessionError> {
            if !self.clicked { return Ok(String::new()); }
            self.reads += 1;
            Ok(if self.reads > self.renders_after { "Firmware".into() } else { String::new() })
        }
        async fn read_attribute(&mut self, _el: &Element, _name: &str) -> Result<Option<String>, SessionError> { Ok(None) }
        async fn read_inner_html(&mut self, _el: &Element) -> Result<String, SessionError> { Ok(String::new()) }
        async fn click(&mut self, _el: &Element) -> Result<(), SessionError> {
            self.clicked = true;
            Ok(())
        }
        async fn close(&mut self) -> Result<(), SessionError> { Ok(()) }
    }

    #[tokio::test]
    async fn waits_for_collapsed_content_to_render() {
        let mut s = Accordion { clicked: false, renders_after: 3, reads: 0 };
        let toggle = Element("0:toggle".into());
        let pending = request_expansion(&mut s, "Version 1", &toggle, None).await.unwrap();
        let titles = pending
            .read(&mut s, &Locator::tag("h3"), Duration::from_secs(1), Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(titles.len(), 1);
        assert!(s.reads > 3);
        assert_eq!(s.read_text(&titles[0]).await.unwrap(), "Firmware");
    }

    #[tokio::test]
    async fn content_that_stays_hidden_is_an_error() {
        let mut s = Accordion { clicked: false, renders_after: usize::MAX, reads: 0 };
        let toggle = Element("0:toggle".into());
        let pending = request_expansion(&mut s, "Version 3", &toggle, None).await.unwrap();
        let err = pending
            .read(&mut s, &Locator::tag("h3"), Duration::from_millis(30), Duration::from_millis(5))
            .await
            .unwrap_err();
        assert_eq!(err.container, "Version 3");
        assert!(err.reason.contains("timed out"));
    }
}
