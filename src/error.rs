use std::time::Duration;

use thiserror::Error;

/// Failure of a single browser-session call.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },
    #[error("element handle {0} is stale")]
    StaleElement(String),
    #[error("invalid locator {0:?}")]
    InvalidLocator(String),
    #[error("no page loaded")]
    NoPage,
    #[error("session already closed")]
    Closed,
    #[error("browser error: {0}")]
    Browser(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// The vendor's entry point could not be reached; aborts that vendor's run only.
#[derive(Debug, Error)]
#[error("{vendor}: could not access entry point {url}: {source}")]
pub struct ConnectionError {
    pub vendor: &'static str,
    pub url: String,
    #[source]
    pub source: SessionError,
}

/// A container (directory, category, product, panel) could not be expanded.
#[derive(Debug, Error)]
#[error("could not expand {container}: {reason}")]
pub struct ExpansionError {
    pub container: String,
    pub reason: String,
}

impl ExpansionError {
    pub fn new(container: impl Into<String>, reason: impl ToString) -> Self {
        Self { container: container.into(), reason: reason.to_string() }
    }

    pub fn from_session(container: impl Into<String>, err: SessionError) -> Self {
        Self::new(container, err)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("manufacturer must not be empty")]
    EmptyManufacturer,
}
