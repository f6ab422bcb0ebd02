//! Per-vendor scraping strategies behind one interface.

pub mod avm;
pub mod linksys;
pub mod swisscom;
pub mod tplink;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;

use crate::error::{ConnectionError, SessionError};
use crate::record::FirmwareRecord;
use crate::session::fetch::Fetch;
use crate::session::{BrowserSession, Locator};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::Scrape;
use crate::traverse::WalkStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vendor {
    Avm,
    Linksys,
    Swisscom,
    #[value(name = "tp-link", alias = "tplink")]
    #[serde(rename = "tp-link")]
    TpLink,
}

impl Vendor {
    pub const ALL: [Vendor; 4] = [Vendor::Avm, Vendor::Linksys, Vendor::Swisscom, Vendor::TpLink];

    pub fn slug(self) -> &'static str {
        match self {
            Vendor::Avm => "avm",
            Vendor::Linksys => "linksys",
            Vendor::Swisscom => "swisscom",
            Vendor::TpLink => "tp-link",
        }
    }

    pub fn manufacturer(self) -> &'static str {
        match self {
            Vendor::Avm => "AVM",
            Vendor::Linksys => "Linksys",
            Vendor::Swisscom => "Swisscom",
            Vendor::TpLink => "TP-Link",
        }
    }

    pub fn entry_url(self) -> &'static str {
        match self {
            Vendor::Avm => avm::ENTRY_URL,
            Vendor::Linksys => linksys::ENTRY_URL,
            Vendor::Swisscom => swisscom::ENTRY_URL,
            Vendor::TpLink => tplink::ENTRY_URL,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manufacturer())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VendorOptions {
    /// Upper bound on products (sitemap vendors) or records (portal vendors).
    pub max_products: Option<usize>,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for VendorOptions {
    fn default() -> Self {
        Self { max_products: None, wait_timeout: Duration::from_secs(3), poll_interval: Duration::from_millis(100) }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeStats {
    pub categories: usize,
    pub expansion_failures: usize,
    pub skipped_items: usize,
    pub leaves: usize,
    pub field_failures: usize,
}

impl ScrapeStats {
    pub fn from_walk(walk: WalkStats, field_failures: usize) -> Self {
        Self {
            categories: walk.categories,
            expansion_failures: walk.expansion_failures,
            skipped_items: walk.skipped_items,
            leaves: walk.leaves,
            field_failures,
        }
    }
}

#[async_trait]
pub trait VendorScraper: Send {
    fn vendor(&self) -> Vendor;

    /// Open the vendor's entry point and run one-time page setup.
    async fn connect(&mut self, log: &LogCtx<Scrape>) -> Result<(), ConnectionError>;

    /// Best-effort record sequence in traversal order. Never fails as a whole.
    async fn scrape_metadata(&mut self, log: &LogCtx<Scrape>) -> Vec<FirmwareRecord>;

    fn stats(&self) -> ScrapeStats;

    async fn close(&mut self) -> Result<(), SessionError>;
}

pub fn build(
    vendor: Vendor,
    session: Box<dyn BrowserSession>,
    fetcher: Arc<dyn Fetch>,
    options: VendorOptions,
) -> Box<dyn VendorScraper> {
    match vendor {
        Vendor::Avm => Box::new(avm::AvmScraper::new(session, fetcher, options)),
        Vendor::Linksys => Box::new(linksys::LinksysScraper::new(session, options)),
        Vendor::Swisscom => Box::new(swisscom::SwisscomScraper::new(session, options)),
        Vendor::TpLink => Box::new(tplink::TpLinkScraper::new(session, options)),
    }
}

pub(crate) async fn open_entry(session: &mut dyn BrowserSession, vendor: Vendor, log: &LogCtx<Scrape>) -> Result<(), ConnectionError> {
    let url = vendor.entry_url();
    session
        .navigate(url)
        .await
        .map_err(|source| ConnectionError { vendor: vendor.manufacturer(), url: url.to_string(), source })?;
    log.info(format!("connected to {url} ({} session)", session.kind()));
    Ok(())
}

/// Click a blocking control (cookie banner, region overlay) if it is there.
pub(crate) async fn dismiss_once(session: &mut dyn BrowserSession, what: &str, locator: &Locator, log: &LogCtx<Scrape>) {
    match session.find(None, locator).await {
        Ok(Some(el)) => match session.click(&el).await {
            Ok(()) => log.debug(format!("dismissed {what}")),
            Err(e) => log.debug(format!("could not dismiss {what}: {e}")),
        },
        Ok(None) => log.debug(format!("no {what} shown")),
        Err(e) => log.debug(format!("no {what} shown: {e}")),
    }
}

/// Navigate only when the session is elsewhere.
pub(crate) async fn ensure_page(session: &mut dyn BrowserSession, url: &str) -> Result<(), SessionError> {
    if session.current_url() == Some(url) {
        return Ok(());
    }
    session.navigate(url).await
}
