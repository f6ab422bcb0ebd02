//! AVM: plain directory listings with `info_en.txt` sheets next to the images.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use super::{open_entry, ScrapeStats, Vendor, VendorOptions, VendorScraper};
use crate::error::{ConnectionError, SessionError};
use crate::extract::Extractor;
use crate::record::{FirmwareRecord, ReportFields};
use crate::session::fetch::Fetch;
use crate::session::{BrowserSession, Locator};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase, Scrape};
use crate::traverse::directory::{DirectoryLeaf, DirectoryWalk};
use crate::traverse::LeafCandidate;

pub const ENTRY_URL: &str = "https://download.avm.de/";
const REPORT_FILE: &str = "info_en.txt";

pub struct AvmScraper {
    session: Box<dyn BrowserSession>,
    fetcher: Arc<dyn Fetch>,
    options: VendorOptions,
    stats: ScrapeStats,
}

impl AvmScraper {
    pub fn new(session: Box<dyn BrowserSession>, fetcher: Arc<dyn Fetch>, options: VendorOptions) -> Self {
        Self { session, fetcher, options, stats: ScrapeStats::default() }
    }

    fn walk(&self) -> DirectoryWalk {
        DirectoryWalk {
            entry_url: ENTRY_URL.to_string(),
            entry_locator: Locator::css("pre > a"),
            leaf_extensions: vec![".image", ".exe", ".zip", ".dmg"],
            skip_extensions: vec![".txt"],
            excluded: vec!["../", "archive/"],
            report_file: Some(REPORT_FILE),
            cap: self.options.max_products,
        }
    }
}

#[async_trait]
impl VendorScraper for AvmScraper {
    fn vendor(&self) -> Vendor { Vendor::Avm }

    async fn connect(&mut self, log: &LogCtx<Scrape>) -> Result<(), ConnectionError> {
        open_entry(self.session.as_mut(), Vendor::Avm, log).await
    }

    async fn scrape_metadata(&mut self, log: &LogCtx<Scrape>) -> Vec<FirmwareRecord> {
        let ex = Extractor::new(log);
        let walk = self.walk();
        let (leaves, walk_stats) = walk.walk(self.session.as_mut(), log).instrument(log.span(&Phase::Discover)).await;
        log.info(format!("found {} firmware files", leaves.len()));

        // one fetch per directory, shared by all of its files
        let mut reports: HashMap<String, Option<ReportFields>> = HashMap::new();
        let mut records = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            let report = match &leaf.item.report_url {
                Some(url) => {
                    if !reports.contains_key(url) {
                        let fields = read_report(&ex, self.fetcher.as_ref(), url).await;
                        reports.insert(url.clone(), fields);
                    }
                    reports.get(url).cloned().flatten()
                }
                None => None,
            };
            match build_record(leaf, report.as_ref()) {
                Ok(rec) => records.push(rec),
                Err(e) => log.error(format!("{}: {e}", leaf.item.url)),
            }
        }

        self.stats = ScrapeStats::from_walk(walk_stats, ex.failures());
        records
    }

    fn stats(&self) -> ScrapeStats { self.stats }

    async fn close(&mut self) -> Result<(), SessionError> { self.session.close().await }
}

async fn read_report(ex: &Extractor<'_>, fetcher: &dyn Fetch, url: &str) -> Option<ReportFields> {
    let report = ex.fetch_report(fetcher, url).await?;
    Some(ReportFields {
        product_name: ex.report_value(&report, url, "product name", "Product", ':'),
        version: ex.report_value(&report, url, "version", "Version", ':'),
        release_date: ex.report_value(&report, url, "release date", "Release", ':'),
    })
}

fn build_record(leaf: &LeafCandidate<DirectoryLeaf>, report: Option<&ReportFields>) -> Result<FirmwareRecord, crate::error::RecordError> {
    let mut rec = FirmwareRecord::new(Vendor::Avm.manufacturer())?;
    rec.download_link = Some(leaf.item.url.clone());
    rec.product_type = leaf.top_level().map(str::to_string);
    if let Some(fields) = report {
        rec.fill_from(fields);
    }
    if let Some(info_url) = &leaf.item.report_url {
        rec.insert_extra("info_url", info_url.as_str());
    }
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::record::RecordStatus;
    use crate::session::fixture::FixtureFetcher;
    use crate::session::static_html::StaticSession;
    use crate::telemetry;

    fn listing(entries: &[&str]) -> String {
        let links: Vec<String> = entries.iter().map(|e| format!(r#"<a href="{e}">{e}</a>"#)).collect();
        format!("<html><body><h1>Index of /</h1><pre>{}</pre></body></html>", links.join("\n"))
    }

    fn site() -> Arc<FixtureFetcher> {
        Arc::new(
            FixtureFetcher::new()
                .page(ENTRY_URL, &listing(&["../", "archive/", "fooA/", "fooB/"]))
                .page("https://download.avm.de/fooA/", &listing(&["../", "image1.image", "info_en.txt"]))
                .page("https://download.avm.de/fooA/info_en.txt", "Product: Foo A\nVersion: 1.0\nRelease: 2023-05-01\n")
                .page("https://download.avm.de/fooB/", &listing(&["../", "image2.exe"])),
        )
    }

    fn scraper(fetcher: Arc<FixtureFetcher>, max_products: Option<usize>) -> AvmScraper {
        let session = StaticSession::new(fetcher.clone(), Duration::from_secs(5));
        let options = VendorOptions { max_products, ..VendorOptions::default() };
        AvmScraper::new(Box::new(session), fetcher, options)
    }

    #[tokio::test]
    async fn directory_scenario_yields_report_and_bare_records() {
        let log = telemetry::scrape();
        let mut s = scraper(site(), None);
        s.connect(&log).await.unwrap();
        let records = s.scrape_metadata(&log).await;
        assert_eq!(records.len(), 2);

        let a = &records[0];
        assert_eq!(a.manufacturer, "AVM");
        assert_eq!(a.product_name.as_deref(), Some("Foo A"));
        assert_eq!(a.version.as_deref(), Some("1.0"));
        assert_eq!(a.release_date.as_deref(), Some("2023-05-01"));
        assert!(a.download_link.as_deref().unwrap().ends_with("image1.image"));
        assert_eq!(a.product_type.as_deref(), Some("fooA"));
        assert_eq!(a.additional_data["info_url"], "https://download.avm.de/fooA/info_en.txt");

        let b = &records[1];
        assert_eq!(b.product_name, None);
        assert_eq!(b.version, None);
        assert!(b.download_link.as_deref().unwrap().ends_with("image2.exe"));
        assert!(b.additional_data.is_empty());
        assert_eq!(b.status(), RecordStatus::Resolved);
        assert_eq!(s.stats().leaves, 2);
    }

    #[tokio::test]
    async fn report_is_fetched_once_per_directory() {
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .page(ENTRY_URL, &listing(&["box/"]))
                .page("https://download.avm.de/box/", &listing(&["a.image", "b.zip", "info_en.txt"]))
                .page("https://download.avm.de/box/info_en.txt", "Product: Box\nRelease: 19.06.2023\n"),
        );
        let log = telemetry::scrape();
        let mut s = scraper(fetcher.clone(), None);
        let records = s.scrape_metadata(&log).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.release_date.as_deref() == Some("2023-06-19")));
        let report_fetches = fetcher.calls().iter().filter(|u| u.ends_with("info_en.txt")).count();
        assert_eq!(report_fetches, 1);
        // missing Version line is a recovered field failure
        assert_eq!(s.stats().field_failures, 1);
    }

    #[tokio::test]
    async fn unreachable_entry_is_a_connection_error() {
        let log = telemetry::scrape();
        let mut s = scraper(Arc::new(FixtureFetcher::new()), None);
        let err = s.connect(&log).await.unwrap_err();
        assert_eq!(err.vendor, "AVM");
        assert_eq!(err.url, ENTRY_URL);
    }

    #[tokio::test]
    async fn scraping_twice_is_stable() {
        let log = telemetry::scrape();
        let first = scraper(site(), None).scrape_metadata(&log).await;
        let second = scraper(site(), None).scrape_metadata(&log).await;
        assert_eq!(first, second);
    }
}
