//! Session and run settings from `FWSCRAPE_*` variables (`.env` is loaded
//! first); CLI flags override them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;

use crate::error::{ConnectionError, SessionError};
use crate::orchestrator::ScraperFactory;
use crate::session::fetch::{Fetch, HttpFetcher};
use crate::session::static_html::StaticSession;
use crate::session::chrome::{ChromeConfig, ChromeSession};
use crate::session::BrowserSession;
use crate::vendors::{self, Vendor, VendorOptions, VendorScraper};

const DEFAULT_NAV_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_OUT_DIR: &str = "scraped_metadata";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// fetch server-rendered HTML over HTTP
    Static,
    /// drive Chrome over the DevTools protocol
    Chrome,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionConfig {
    pub kind: SessionKind,
    /// attach to a running browser instead of launching one
    pub chrome_url: Option<String>,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub nav_timeout: Duration,
    pub user_agent: String,
}

#[derive(Clone, Debug)]
pub struct ScrapeConfig {
    pub session: SessionConfig,
    pub options: VendorOptions,
    pub out_dir: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                kind: SessionKind::Static,
                chrome_url: None,
                chrome_path: None,
                headless: true,
                nav_timeout: Duration::from_secs(DEFAULT_NAV_TIMEOUT_SECS),
                user_agent: format!("fwscrape/{}", env!("CARGO_PKG_VERSION")),
            },
            options: VendorOptions {
                max_products: None,
                wait_timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
                poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            },
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values keep their defaults.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(kind) = var("FWSCRAPE_SESSION") {
            if let Ok(parsed) = SessionKind::from_str(kind.trim(), true) {
                cfg.session.kind = parsed;
            }
        }
        if let Some(url) = var("FWSCRAPE_CHROME_URL").filter(|v| !v.trim().is_empty()) {
            cfg.session.chrome_url = Some(url);
        }
        if let Some(path) = var("FWSCRAPE_CHROME_PATH").filter(|v| !v.trim().is_empty()) {
            cfg.session.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = var("FWSCRAPE_HEADLESS") {
            cfg.session.headless = !matches!(flag.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Some(secs) = var("FWSCRAPE_NAV_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.session.nav_timeout = Duration::from_secs(secs);
        }
        if let Some(ua) = var("FWSCRAPE_USER_AGENT") {
            cfg.session.user_agent = ua;
        }
        if let Some(ms) = var("FWSCRAPE_WAIT_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.options.wait_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = var("FWSCRAPE_POLL_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.options.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(dir) = var("FWSCRAPE_OUT_DIR") {
            cfg.out_dir = PathBuf::from(dir);
        }
        cfg
    }
}

/// Opens one session per vendor as configured.
pub struct SessionFactory {
    cfg: SessionConfig,
    options: VendorOptions,
    fetcher: Arc<dyn Fetch>,
}

impl SessionFactory {
    pub fn new(cfg: &ScrapeConfig) -> Result<Self, SessionError> {
        let fetcher = HttpFetcher::new(cfg.session.nav_timeout, &cfg.session.user_agent)?;
        Ok(Self { cfg: cfg.session.clone(), options: cfg.options, fetcher: Arc::new(fetcher) })
    }

    async fn session(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        let session: Box<dyn BrowserSession> = match self.cfg.kind {
            SessionKind::Static => Box::new(StaticSession::new(self.fetcher.clone(), self.cfg.nav_timeout)),
            SessionKind::Chrome => Box::new(
                ChromeSession::start(ChromeConfig {
                    connect_url: self.cfg.chrome_url.clone(),
                    executable: self.cfg.chrome_path.clone(),
                    headless: self.cfg.headless,
                    nav_timeout: self.cfg.nav_timeout,
                    user_agent: self.cfg.user_agent.clone(),
                })
                .await?,
            ),
        };
        Ok(session)
    }
}

#[async_trait]
impl ScraperFactory for SessionFactory {
    async fn open(&self, vendor: Vendor) -> Result<Box<dyn VendorScraper>, ConnectionError> {
        let session = self.session().await.map_err(|source| ConnectionError {
            vendor: vendor.manufacturer(),
            url: vendor.entry_url().to_string(),
            source,
        })?;
        Ok(vendors::build(vendor, session, self.fetcher.clone(), self.options))
    }
}
