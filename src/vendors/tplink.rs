//! TP-Link: category list on the download center, one page per product with a
//! "Firmware" tab that gates eligibility.

use async_trait::async_trait;

use super::{dismiss_once, ensure_page, open_entry, ScrapeStats, Vendor, VendorOptions, VendorScraper};
use crate::error::{ConnectionError, ExpansionError, SessionError};
use crate::extract::{Accessor, Extractor, Instruction, Source, Transform};
use crate::record::FirmwareRecord;
use crate::session::{BrowserSession, Locator};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::Scrape;
use crate::traverse::category::{walk_portal, PortalCatalog};
use crate::traverse::{CatalogNode, LeafCandidate, NodeKind};

pub const ENTRY_URL: &str = "https://www.tp-link.com/en/support/download/";

const REGION_OVERLAY_CLOSE: &str = "body > div.page-content-wrapper > div.tp-local-switcher > div > span";
const CATEGORIES: &str = "#list > div.item";
const CATEGORY_NAME: &str = "h2 > span.tp-m-hide";
const PRODUCT_LINKS: &str = "div.item-box > span > a";
const FIRMWARE_TAB: &str = "a[href='#Firmware']";
const MODEL_NAME: &str = "#model-version-name";
const HARDWARE_VERSION: &str = "#verison-hidden";
const RESOURCE_NAME: &str = "#content_Firmware > table > tbody > tr.basic-info > th.download-resource-name";
const RELEASE_DATE: &str = "#content_Firmware > table > tbody > tr.detail-info > td:nth-child(1) > span:nth-child(2)";
const DOWNLOAD_REGION_DIALOG: &str = "#content_Firmware > table > tbody > tr.basic-info > th.download-resource-btnbox > div > div > div > a.tp-dialog-btn.tp-dialog-btn-white.ga-click";
const DOWNLOAD_SIMPLE: &str = "#content_Firmware > table > tbody > tr.basic-info > th.download-resource-btnbox > a";

pub struct TpLinkScraper {
    session: Box<dyn BrowserSession>,
    options: VendorOptions,
    stats: ScrapeStats,
}

impl TpLinkScraper {
    pub fn new(session: Box<dyn BrowserSession>, options: VendorOptions) -> Self {
        Self { session, options, stats: ScrapeStats::default() }
    }
}

#[async_trait]
impl VendorScraper for TpLinkScraper {
    fn vendor(&self) -> Vendor { Vendor::TpLink }

    async fn connect(&mut self, log: &LogCtx<Scrape>) -> Result<(), ConnectionError> {
        open_entry(self.session.as_mut(), Vendor::TpLink, log).await?;
        dismiss_once(self.session.as_mut(), "region overlay", &Locator::css(REGION_OVERLAY_CLOSE), log).await;
        Ok(())
    }

    async fn scrape_metadata(&mut self, log: &LogCtx<Scrape>) -> Vec<FirmwareRecord> {
        let ex = Extractor::new(log);
        let mut catalog = TpLinkCatalog { session: self.session.as_mut(), ex: &ex };
        let (records, walk) = walk_portal(&mut catalog, self.options.max_products, log).await;
        self.stats = ScrapeStats::from_walk(walk, ex.failures());
        records
    }

    fn stats(&self) -> ScrapeStats { self.stats }

    async fn close(&mut self) -> Result<(), SessionError> { self.session.close().await }
}

struct TpLinkCatalog<'a, 'l> {
    session: &'a mut dyn BrowserSession,
    ex: &'a Extractor<'l>,
}

#[async_trait]
impl<'a, 'l> PortalCatalog for TpLinkCatalog<'a, 'l> {
    /// position in the category list
    type Category = usize;
    type Product = String;
    type Leaf = String;

    async fn categories(&mut self) -> Result<Vec<CatalogNode<usize>>, ExpansionError> {
        ensure_page(self.session, ENTRY_URL).await.map_err(|e| ExpansionError::from_session(ENTRY_URL, e))?;
        let items = self
            .session
            .find_all(None, &Locator::css(CATEGORIES))
            .await
            .map_err(|e| ExpansionError::from_session(ENTRY_URL, e))?;
        if items.is_empty() {
            return Err(ExpansionError::new(ENTRY_URL, "no product categories"));
        }
        let mut nodes = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let src = Source::within(ENTRY_URL, item);
            let label = self
                .ex
                .extract(self.session, &src, &Instruction::text("category name", Locator::css(CATEGORY_NAME)))
                .await
                .unwrap_or_else(|| format!("category {}", i + 1));
            nodes.push(CatalogNode { handle: i, label, kind: NodeKind::Container, parent: None });
        }
        Ok(nodes)
    }

    async fn products(&mut self, category: &CatalogNode<usize>) -> Result<Vec<CatalogNode<String>>, ExpansionError> {
        let container = category.label.as_str();
        ensure_page(self.session, ENTRY_URL).await.map_err(|e| ExpansionError::from_session(container, e))?;
        let items = self
            .session
            .find_all(None, &Locator::css(CATEGORIES))
            .await
            .map_err(|e| ExpansionError::from_session(container, e))?;
        let item = items
            .get(category.handle)
            .ok_or_else(|| ExpansionError::new(container, "category vanished from the list"))?;
        let links = self
            .session
            .find_all(Some(item), &Locator::css(PRODUCT_LINKS))
            .await
            .map_err(|e| ExpansionError::from_session(container, e))?;
        if links.is_empty() {
            return Err(ExpansionError::new(container, format!("no {PRODUCT_LINKS} links")));
        }
        let mut products = Vec::with_capacity(links.len());
        for link in &links {
            if let Some(url) = self.ex.read(self.session, container, link, "product url", Accessor::Attribute("href")).await {
                products.push(CatalogNode { label: url.clone(), handle: url, kind: NodeKind::Container, parent: Some(category.label.clone()) });
            }
        }
        Ok(products)
    }

    async fn leaves(&mut self, product: &CatalogNode<String>) -> Result<Vec<String>, ExpansionError> {
        let url = product.handle.as_str();
        self.session.navigate(url).await.map_err(|e| ExpansionError::from_session(url, e))?;
        let tab = self
            .session
            .find(None, &Locator::css(FIRMWARE_TAB))
            .await
            .map_err(|e| ExpansionError::from_session(url, e))?;
        let Some(tab) = tab else { return Ok(Vec::new()) };
        self.session.click(&tab).await.map_err(|e| ExpansionError::from_session(url, e))?;
        Ok(vec![url.to_string()])
    }

    async fn extract(&mut self, leaf: LeafCandidate<String>) -> Option<FirmwareRecord> {
        let src = Source::page(&leaf.item);
        let mut rec = FirmwareRecord::new(Vendor::TpLink.manufacturer()).ok()?;
        rec.product_type = leaf.top_level().map(str::to_string);

        let model = self.ex.extract(self.session, &src, &Instruction::text("product name", Locator::css(MODEL_NAME))).await;
        let hardware = self.ex.extract(self.session, &src, &Instruction::text("hardware version", Locator::css(HARDWARE_VERSION))).await;
        rec.product_name = model.map(|m| m + hardware.as_deref().unwrap_or_default());

        // resource names look like "Archer C7(EU)_V5_230512"; drop the model prefix
        let version = Instruction::text("version", Locator::css(RESOURCE_NAME)).then(Transform::AfterFirst('_'));
        rec.version = self.ex.extract(self.session, &src, &version).await;

        let date = self.ex.extract(self.session, &src, &Instruction::text("release date", Locator::css(RELEASE_DATE))).await;
        rec.set_release_date(date);

        let links = [
            Instruction::attr("download link", Locator::css(DOWNLOAD_REGION_DIALOG), "href"),
            Instruction::attr("download link", Locator::css(DOWNLOAD_SIMPLE), "href").required(),
        ];
        rec.download_link = self.ex.first_of(self.session, &src, &links).await;
        Some(rec)
    }
}
