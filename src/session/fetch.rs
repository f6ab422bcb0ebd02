use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::SessionError;

/// Plain HTTP retrieval of a page or an auxiliary text resource.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, SessionError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, SessionError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SessionError::Navigation { url: url.to_string(), reason: format!("http status {status}") });
        }
        let text = resp.text().await?;
        Ok(text)
    }
}
