//! Browser-session capability consumed by traversal and extraction.
//!
//! A session has exactly one current page. Every call takes `&mut self`, so two
//! steps against the same session can never run concurrently.

pub mod chrome;
pub mod fetch;
pub mod static_html;
pub mod text;

#[cfg(test)]
pub mod fixture;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SessionError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    LinkText(String),
    Tag(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self { Locator::Css(s.into()) }
    pub fn link_text(s: impl Into<String>) -> Self { Locator::LinkText(s.into()) }
    pub fn tag(s: impl Into<String>) -> Self { Locator::Tag(s.into()) }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={s}"),
            Locator::LinkText(s) => write!(f, "link_text={s}"),
            Locator::Tag(s) => write!(f, "tag={s}"),
        }
    }
}

/// Opaque handle to an element on the session's current page.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Element(pub(crate) String);

#[derive(Clone, Debug)]
pub enum WaitCondition {
    /// At least one match of the locator (optionally inside `scope`) renders
    /// non-empty text. Collapsed content is in the DOM but renders empty.
    Rendered { scope: Option<Element>, locator: Locator },
}

#[async_trait]
pub trait BrowserSession: Send {
    fn kind(&self) -> &'static str;

    fn current_url(&self) -> Option<&str>;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    async fn find_all(&mut self, scope: Option<&Element>, locator: &Locator) -> Result<Vec<Element>, SessionError>;

    async fn find(&mut self, scope: Option<&Element>, locator: &Locator) -> Result<Option<Element>, SessionError> {
        Ok(self.find_all(scope, locator).await?.into_iter().next())
    }

    async fn read_text(&mut self, el: &Element) -> Result<String, SessionError>;

    async fn read_attribute(&mut self, el: &Element, name: &str) -> Result<Option<String>, SessionError>;

    async fn read_inner_html(&mut self, el: &Element) -> Result<String, SessionError>;

    async fn click(&mut self, el: &Element) -> Result<(), SessionError>;

    /// Poll until `cond` holds or `timeout` elapses.
    async fn wait_until(&mut self, cond: &WaitCondition, timeout: Duration, poll: Duration) -> Result<(), SessionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let satisfied = match cond {
                WaitCondition::Rendered { scope, locator } => {
                    match self.find_all(scope.as_ref(), locator).await {
                        Ok(found) => {
                            let mut shown = false;
                            for el in &found {
                                if matches!(self.read_text(el).await, Ok(t) if !t.trim().is_empty()) {
                                    shown = true;
                                    break;
                                }
                            }
                            shown
                        }
                        Err(SessionError::StaleElement(id)) => return Err(SessionError::StaleElement(id)),
                        Err(_) => false,
                    }
                }
            };
            if satisfied { return Ok(()); }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::Timeout { what: format!("wait for {cond:?}"), after: timeout });
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Run one session call under a deadline; expiry surfaces as `SessionError::Timeout`.
pub async fn bounded<T, F>(what: &str, after: Duration, fut: F) -> Result<T, SessionError>
where
    F: std::future::Future<Output = Result<T, SessionError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(SessionError::Timeout { what: what.to_string(), after }),
    }
}
