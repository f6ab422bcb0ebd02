use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::fetch::Fetch;
use crate::error::SessionError;

/// In-memory site: URL → body. Unknown URLs fail like an unreachable host.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for FixtureFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, SessionError> {
        self.calls.lock().unwrap().push(url.to_string());
        // fragments never reach the server
        let key = url.split('#').next().unwrap_or(url);
        self.pages
            .get(key)
            .cloned()
            .ok_or_else(|| SessionError::Navigation { url: url.to_string(), reason: "http status 404 Not Found".into() })
    }
}
