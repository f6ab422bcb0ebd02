//! Swisscom: one page of tabbed panels. Categories and products are keyed by
//! `data-panel` / `data-id` values because the visible labels are localized.

use async_trait::async_trait;

use super::{dismiss_once, ensure_page, open_entry, ScrapeStats, Vendor, VendorOptions, VendorScraper};
use crate::error::{ConnectionError, ExpansionError, SessionError};
use crate::extract::{Accessor, Extractor, Instruction, Source, Transform};
use crate::record::FirmwareRecord;
use crate::session::{BrowserSession, Element, Locator};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::Scrape;
use crate::traverse::category::{walk_portal, PortalCatalog};
use crate::traverse::{CatalogNode, LeafCandidate, NodeKind};

pub const ENTRY_URL: &str = "https://www.swisscom.ch/en/residential/help/device/firmware.html";

const ACCEPT_COOKIES: &str = "div.modal.modal--open div.modal__body div.button-group button.button--primary";
const CATEGORY_TABS: &str = "sdx-tabs > div .tab-link";
const TAB_LINK: &str = ".tab-link";
const DOWNLOAD_LINK: &str = "span > div > a";
const VERSION_HEADER: &str = "div.accordion__toggle > div.accordion__header > h4";

// Used when the live category heading is empty.
const CATEGORY_LABELS: &[(&str, &str)] = &[
    ("internetrouter", "Internet router"),
    ("heimvernetzung", "Home networking accessories"),
    ("festnetz", "Fixed-network telephony"),
    ("bluetv", "Swisscom blue tv"),
];

pub struct SwisscomScraper {
    session: Box<dyn BrowserSession>,
    options: VendorOptions,
    stats: ScrapeStats,
}

impl SwisscomScraper {
    pub fn new(session: Box<dyn BrowserSession>, options: VendorOptions) -> Self {
        Self { session, options, stats: ScrapeStats::default() }
    }
}

#[async_trait]
impl VendorScraper for SwisscomScraper {
    fn vendor(&self) -> Vendor { Vendor::Swisscom }

    async fn connect(&mut self, log: &LogCtx<Scrape>) -> Result<(), ConnectionError> {
        open_entry(self.session.as_mut(), Vendor::Swisscom, log).await?;
        dismiss_once(self.session.as_mut(), "cookie consent", &Locator::css(ACCEPT_COOKIES), log).await;
        Ok(())
    }

    async fn scrape_metadata(&mut self, log: &LogCtx<Scrape>) -> Vec<FirmwareRecord> {
        let ex = Extractor::new(log);
        let mut catalog = SwisscomCatalog { session: self.session.as_mut(), ex: &ex };
        let (records, walk) = walk_portal(&mut catalog, self.options.max_products, log).await;
        self.stats = ScrapeStats::from_walk(walk, ex.failures());
        records
    }

    fn stats(&self) -> ScrapeStats { self.stats }

    async fn close(&mut self) -> Result<(), SessionError> { self.session.close().await }
}

fn category_url(category: &str) -> String {
    format!("{ENTRY_URL}#tab1={category}")
}

fn product_url(category: &str, product: &str) -> String {
    format!("{ENTRY_URL}#tab1={category}&tab={product}")
}

fn fallback_label(category_id: &str) -> Option<&'static str> {
    CATEGORY_LABELS.iter().find(|(id, _)| *id == category_id).map(|(_, label)| *label)
}

struct SwisscomCatalog<'a, 'l> {
    session: &'a mut dyn BrowserSession,
    ex: &'a Extractor<'l>,
}

pub struct ProductTab {
    category: String,
    product: String,
    url: String,
    panel: Element,
}

impl<'a, 'l> SwisscomCatalog<'a, 'l> {
    /// `data-panel` values of every `.tab-link` in scope.
    async fn panel_ids(&mut self, source_id: &str, scope: Option<&Element>, locator: &Locator) -> Result<Vec<String>, SessionError> {
        let tabs = self.session.find_all(scope, locator).await?;
        let mut ids = Vec::with_capacity(tabs.len());
        for tab in &tabs {
            if let Some(id) = self.ex.read(self.session, source_id, tab, "panel id", Accessor::Attribute("data-panel")).await {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl<'a, 'l> PortalCatalog for SwisscomCatalog<'a, 'l> {
    type Category = String;
    type Product = String;
    type Leaf = ProductTab;

    async fn categories(&mut self) -> Result<Vec<CatalogNode<String>>, ExpansionError> {
        ensure_page(self.session, ENTRY_URL).await.map_err(|e| ExpansionError::from_session(ENTRY_URL, e))?;
        let ids = self
            .panel_ids(ENTRY_URL, None, &Locator::css(CATEGORY_TABS))
            .await
            .map_err(|e| ExpansionError::from_session(ENTRY_URL, e))?;
        if ids.is_empty() {
            return Err(ExpansionError::new(ENTRY_URL, "no category tabs"));
        }

        let src = Source::page(ENTRY_URL);
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            let heading = Instruction::text("category label", Locator::css(format!("div[data-id='{id}'] h2")));
            let label = match self.ex.extract(self.session, &src, &heading).await {
                Some(label) => label,
                None => fallback_label(&id).map(str::to_string).unwrap_or_else(|| id.clone()),
            };
            nodes.push(CatalogNode { handle: id, label, kind: NodeKind::Container, parent: None });
        }
        Ok(nodes)
    }

    async fn products(&mut self, category: &CatalogNode<String>) -> Result<Vec<CatalogNode<String>>, ExpansionError> {
        let url = category_url(&category.handle);
        ensure_page(self.session, &url).await.map_err(|e| ExpansionError::from_session(url.clone(), e))?;
        let locator = Locator::css(format!("div[data-id='{}'] {TAB_LINK}", category.handle));
        let ids = self.panel_ids(&url, None, &locator).await.map_err(|e| ExpansionError::from_session(url.clone(), e))?;
        if ids.is_empty() {
            return Err(ExpansionError::new(url, "no product tabs"));
        }
        Ok(ids
            .into_iter()
            .map(|id| CatalogNode { label: id.clone(), handle: id, kind: NodeKind::Container, parent: Some(category.handle.clone()) })
            .collect())
    }

    async fn leaves(&mut self, product: &CatalogNode<String>) -> Result<Vec<ProductTab>, ExpansionError> {
        let category = product.parent.clone().unwrap_or_default();
        let url = category_url(&category);
        ensure_page(self.session, &url).await.map_err(|e| ExpansionError::from_session(url.clone(), e))?;
        let panel = self
            .session
            .find(None, &Locator::css(format!("div[data-id='{}']", product.handle)))
            .await
            .map_err(|e| ExpansionError::from_session(url.clone(), e))?;
        Ok(panel
            .map(|panel| ProductTab {
                url: product_url(&category, &product.handle),
                category,
                product: product.handle.clone(),
                panel,
            })
            .into_iter()
            .collect())
    }

    async fn extract(&mut self, leaf: LeafCandidate<ProductTab>) -> Option<FirmwareRecord> {
        let tab = &leaf.item;
        let page = Source::page(&tab.url);
        let within = Source::within(&tab.url, &tab.panel);

        let mut rec = FirmwareRecord::new(Vendor::Swisscom.manufacturer()).ok()?;
        rec.product_type = leaf.top_level().map(str::to_string);
        let name = Instruction::text("product name", Locator::css(format!("a[data-track-label='{}'] h6", tab.product)));
        rec.product_name = self.ex.extract(self.session, &page, &name).await;
        let link = Instruction::attr("download link", Locator::css(DOWNLOAD_LINK), "href").required();
        rec.download_link = self.ex.extract(self.session, &within, &link).await;
        let version = Instruction::inner_html("version", Locator::css(VERSION_HEADER))
            .then(Transform::After("Version "))
            .then(Transform::TrimEndMatches(')'))
            .then(Transform::Trim);
        rec.version = self.ex.extract(self.session, &within, &version).await;
        rec.insert_extra("category_id", tab.category.as_str());
        Some(rec)
    }
}
