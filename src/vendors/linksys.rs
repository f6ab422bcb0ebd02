//! Linksys: sitemap → product page → firmware page with accordion panels,
//! one panel per hardware version, one `h3` per regional firmware.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::{ensure_page, open_entry, ScrapeStats, Vendor, VendorOptions, VendorScraper};
use crate::error::{ConnectionError, ExpansionError, SessionError};
use crate::extract::{Accessor, Extractor, Instruction, Pick, Source};
use crate::record::sanitize::strip_disallowed;
use crate::record::FirmwareRecord;
use crate::session::{BrowserSession, Element, Locator};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::Scrape;
use crate::traverse::category::{walk_portal, PortalCatalog};
use crate::traverse::expand::request_expansion;
use crate::traverse::{CatalogNode, LeafCandidate, NodeKind};
use crate::util::time::parse_iso;

pub const ENTRY_URL: &str = "https://www.linksys.com/sitemap";

const SITEMAP_LINK: &str = "a.sitemap-list__link";
const FIRMWARE_LINK_TEXT: &str = "DOWNLOADS / FIRMWARE";
const PRODUCT_NAME: &str = "div.product-family-name.h3";
const PANEL_TOGGLE: &str = "div.article-accordian.daccordion-is-closed";
const PANEL: &str = "div.article-accordian-content.collapse-me";
const ALL_REGIONS: &str = "Firmware all regions";

pub struct LinksysScraper {
    session: Box<dyn BrowserSession>,
    options: VendorOptions,
    stats: ScrapeStats,
}

impl LinksysScraper {
    pub fn new(session: Box<dyn BrowserSession>, options: VendorOptions) -> Self {
        Self { session, options, stats: ScrapeStats::default() }
    }
}

#[async_trait]
impl VendorScraper for LinksysScraper {
    fn vendor(&self) -> Vendor { Vendor::Linksys }

    async fn connect(&mut self, log: &LogCtx<Scrape>) -> Result<(), ConnectionError> {
        open_entry(self.session.as_mut(), Vendor::Linksys, log).await
    }

    async fn scrape_metadata(&mut self, log: &LogCtx<Scrape>) -> Vec<FirmwareRecord> {
        let ex = Extractor::new(log);
        let mut catalog = LinksysCatalog {
            session: self.session.as_mut(),
            ex: &ex,
            options: self.options,
            panel_failures: 0,
        };
        // the product cap applies to sitemap links, not to records
        let (records, walk) = walk_portal(&mut catalog, None, log).await;
        let panel_failures = catalog.panel_failures;
        self.stats = ScrapeStats::from_walk(walk, ex.failures());
        self.stats.expansion_failures += panel_failures;
        records
    }

    fn stats(&self) -> ScrapeStats { self.stats }

    async fn close(&mut self) -> Result<(), SessionError> { self.session.close().await }
}

struct LinksysCatalog<'a, 'l> {
    session: &'a mut dyn BrowserSession,
    ex: &'a Extractor<'l>,
    options: VendorOptions,
    panel_failures: usize,
}

/// One regional firmware inside an expanded panel.
pub struct FirmwareItem {
    page: String,
    product_name: Option<String>,
    panel: Element,
    index: usize,
    region: String,
}

#[async_trait]
impl<'a, 'l> PortalCatalog for LinksysCatalog<'a, 'l> {
    type Category = ();
    type Product = String;
    type Leaf = FirmwareItem;

    async fn categories(&mut self) -> Result<Vec<CatalogNode<()>>, ExpansionError> {
        Ok(vec![CatalogNode { handle: (), label: "sitemap".into(), kind: NodeKind::Container, parent: None }])
    }

    async fn products(&mut self, category: &CatalogNode<()>) -> Result<Vec<CatalogNode<String>>, ExpansionError> {
        ensure_page(self.session, ENTRY_URL).await.map_err(|e| ExpansionError::from_session(ENTRY_URL, e))?;
        let links = self
            .session
            .find_all(None, &Locator::css(SITEMAP_LINK))
            .await
            .map_err(|e| ExpansionError::from_session(ENTRY_URL, e))?;
        if links.is_empty() {
            return Err(ExpansionError::new(ENTRY_URL, format!("no {SITEMAP_LINK} links")));
        }
        let take = self.options.max_products.unwrap_or(usize::MAX);
        let mut products = Vec::new();
        for link in links.iter().take(take) {
            if let Some(url) = self.ex.read(self.session, ENTRY_URL, link, "product url", Accessor::Attribute("href")).await {
                products.push(CatalogNode { label: url.clone(), handle: url, kind: NodeKind::Container, parent: Some(category.label.clone()) });
            }
        }
        Ok(products)
    }

    async fn leaves(&mut self, product: &CatalogNode<String>) -> Result<Vec<FirmwareItem>, ExpansionError> {
        let url = product.handle.as_str();
        self.session.navigate(url).await.map_err(|e| ExpansionError::from_session(url, e))?;

        let button = self
            .session
            .find(None, &Locator::link_text(FIRMWARE_LINK_TEXT))
            .await
            .map_err(|e| ExpansionError::from_session(url, e))?;
        let Some(button) = button else { return Ok(Vec::new()) };

        let src = Source::page(url);
        let product_name = self
            .ex
            .extract(self.session, &src, &Instruction::text("product name", Locator::css(PRODUCT_NAME)))
            .await
            .map(|n| strip_disallowed(&n));
        let firmware_url = self
            .ex
            .read(self.session, url, &button, "firmware page", Accessor::Attribute("href"))
            .await
            .ok_or_else(|| ExpansionError::new(url, "firmware link without target"))?;
        self.session
            .navigate(&firmware_url)
            .await
            .map_err(|e| ExpansionError::from_session(firmware_url.clone(), e))?;

        let toggles = self
            .session
            .find_all(None, &Locator::css(PANEL_TOGGLE))
            .await
            .map_err(|e| ExpansionError::from_session(firmware_url.clone(), e))?;
        let panels = self
            .session
            .find_all(None, &Locator::css(PANEL))
            .await
            .map_err(|e| ExpansionError::from_session(firmware_url.clone(), e))?;

        let mut items = Vec::new();
        for (i, panel) in panels.iter().enumerate() {
            let container = format!("{firmware_url} panel {}", i + 1);
            let titles = match toggles.get(i) {
                Some(toggle) => {
                    let read = match request_expansion(self.session, &container, toggle, Some(panel.clone())).await {
                        Ok(pending) => {
                            pending
                                .read(self.session, &Locator::tag("h3"), self.options.wait_timeout, self.options.poll_interval)
                                .await
                        }
                        Err(e) => Err(e),
                    };
                    match read {
                        Ok(titles) => titles,
                        Err(e) => {
                            self.panel_failures += 1;
                            self.ex.log().warn(e.to_string());
                            continue;
                        }
                    }
                }
                // already open
                None => self.ex.elements(self.session, &Source::within(&container, panel), "panel titles", &Locator::tag("h3")).await,
            };

            for (j, title) in titles.iter().enumerate() {
                let Some(text) = self.ex.read(self.session, &container, title, "panel title", Accessor::Text).await else { continue };
                if !text.contains("Firmware") { continue; }
                let region = if text.trim() == "Firmware" { ALL_REGIONS.to_string() } else { text.trim().to_string() };
                items.push(FirmwareItem {
                    page: firmware_url.clone(),
                    product_name: product_name.clone(),
                    panel: panel.clone(),
                    index: j,
                    region,
                });
            }
        }
        Ok(items)
    }

    async fn extract(&mut self, leaf: LeafCandidate<FirmwareItem>) -> Option<FirmwareRecord> {
        let item = leaf.item;
        let id = format!("{} [{}]", item.page, item.region);
        let src = Source::within(&id, &item.panel);
        let layouts = [
            (Locator::tag("p"), Pick::NthMatching(item.index, starts_with_v)),
            (Locator::tag("div"), Pick::Nth(item.index)),
        ];
        let (layout, block) = self.ex.first_element_of(self.session, &src, "firmware block", &layouts).await?;
        if layout > 0 {
            self.ex.log().debug(format!("{id}: using panel layout"));
        }
        let text = self.ex.read(self.session, &id, &block, "firmware block", Accessor::Text).await?;

        let mut rec = FirmwareRecord::new(Vendor::Linksys.manufacturer()).ok()?;
        rec.product_name = item.product_name;
        rec.version = self.ex.derive("version", &id, || parse_version(&text));
        rec.set_release_date(self.ex.derive("release date", &id, || parse_date(&text)));
        rec.download_link = self
            .ex
            .extract(self.session, &Source::within(&id, &block), &Instruction::attr("download link", Locator::tag("a"), "href"))
            .await;
        rec.insert_extra("region", item.region);
        Some(rec)
    }
}

fn starts_with_v(text: &str) -> bool {
    text.trim_start().starts_with('V')
}

type BlockPattern = fn(&[&str], &str) -> Option<String>;

// Version layouts seen on firmware blocks, tried in order.
const VERSION_PATTERNS: &[BlockPattern] = &[version_second_token, version_after_prefix, version_second_line, version_scan_text];

// Date layouts: "Latest Date:  03/04/2022", "Released on 03/04/2022", free text.
const DATE_PATTERNS: &[BlockPattern] = &[date_after_double_space, date_third_token, date_third_token_next_line, date_scan_text];

fn version_second_token(lines: &[&str], _: &str) -> Option<String> {
    lines.first()?.split(' ').nth(1).and_then(clean_version)
}

fn version_after_prefix(lines: &[&str], _: &str) -> Option<String> {
    lines.first()?.get(4..).and_then(clean_version)
}

fn version_second_line(lines: &[&str], _: &str) -> Option<String> {
    lines.get(1)?.split(' ').nth(1).and_then(clean_version)
}

fn version_scan_text(_: &[&str], text: &str) -> Option<String> {
    version_scan().captures(text).map(|c| c[1].to_string())
}

fn date_after_double_space(lines: &[&str], _: &str) -> Option<String> {
    lines.get(1)?.split("  ").nth(1).and_then(|t| parse_iso(t.trim()))
}

fn date_third_token(lines: &[&str], _: &str) -> Option<String> {
    lines.get(1)?.split(' ').nth(2).and_then(parse_iso)
}

fn date_third_token_next_line(lines: &[&str], _: &str) -> Option<String> {
    lines.get(2)?.split(' ').nth(2).and_then(parse_iso)
}

fn date_scan_text(_: &[&str], text: &str) -> Option<String> {
    date_scan().find_iter(text).find_map(|m| parse_iso(m.as_str()))
}

fn lines_of(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

fn parse_version(text: &str) -> Option<String> {
    let lines = lines_of(text);
    VERSION_PATTERNS.iter().find_map(|p| p(&lines, text))
}

fn parse_date(text: &str) -> Option<String> {
    let lines = lines_of(text);
    DATE_PATTERNS.iter().find_map(|p| p(&lines, text))
}

fn clean_version(token: &str) -> Option<String> {
    let t = token.trim().trim_end_matches([',', ':']);
    let t = match t.strip_prefix(['V', 'v']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => t,
    };
    if t.starts_with(|c: char| c.is_ascii_digit()) { Some(t.to_string()) } else { None }
}

fn version_scan() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bv(?:er(?:sion)?\.?)?\s*(\d+(?:\.\d+)+)").expect("static regex"))
}

fn date_scan() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").expect("static regex"))
}
