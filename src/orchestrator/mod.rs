//! Runs vendor scrapers side by side, one task and one session per vendor.

pub mod types;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::error::ConnectionError;
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::{Phase, Scrape};
use crate::vendors::{Vendor, VendorScraper};

use self::types::{RunOutput, VendorOutcome, VendorRun};

/// Builds a ready scraper (with its own session) for one vendor.
#[async_trait]
pub trait ScraperFactory: Send + Sync {
    async fn open(&self, vendor: Vendor) -> Result<Box<dyn VendorScraper>, ConnectionError>;
}

pub struct Orchestrator {
    factory: Arc<dyn ScraperFactory>,
    log: LogCtx<Scrape>,
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn ScraperFactory>, log: LogCtx<Scrape>) -> Self {
        Self { factory, log }
    }

    /// Scrape every vendor to completion. A vendor that fails, panics or is
    /// cancelled is reported; the others keep running.
    pub async fn run(&self, vendors: &[Vendor], cancel: CancellationToken) -> RunOutput {
        let mut set = JoinSet::new();
        for &vendor in vendors {
            let factory = self.factory.clone();
            let log = self.log;
            let cancel = cancel.clone();
            set.spawn(async move {
                let span = info_span!("vendor", vendor = vendor.slug());
                let mut task = tokio::spawn(scrape_vendor(factory, vendor, log).instrument(span));
                tokio::select! {
                    res = &mut task => match res {
                        Ok(run) => run,
                        Err(e) if e.is_panic() => VendorRun::failed(vendor, VendorOutcome::Panicked(panic_message(e.into_panic()))),
                        Err(_) => VendorRun::failed(vendor, VendorOutcome::Cancelled),
                    },
                    _ = cancel.cancelled() => {
                        // dropping the scrape future releases its session
                        task.abort();
                        let _ = task.await;
                        VendorRun::failed(vendor, VendorOutcome::Cancelled)
                    }
                }
            });
        }

        let mut out = RunOutput::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(run) => {
                    self.log.vendor_summary(&run.report());
                    out.runs.push(run);
                }
                Err(e) => self.log.error(format!("vendor supervisor failed: {e}")),
            }
        }
        out.runs.sort_by_key(|r| r.vendor);
        out
    }
}

async fn scrape_vendor(factory: Arc<dyn ScraperFactory>, vendor: Vendor, log: LogCtx<Scrape>) -> VendorRun {
    let mut scraper = match factory.open(vendor).instrument(log.span(&Phase::Connect)).await {
        Ok(s) => s,
        Err(e) => {
            log.error(e.to_string());
            return VendorRun::failed(vendor, VendorOutcome::ConnectionFailed(e.to_string()));
        }
    };

    if let Err(e) = scraper.connect(&log).instrument(log.span(&Phase::Connect)).await {
        log.error(e.to_string());
        if let Err(close) = scraper.close().await {
            log.warn(format!("closing session: {close}"));
        }
        return VendorRun::failed(vendor, VendorOutcome::ConnectionFailed(e.to_string()));
    }

    let records = scraper.scrape_metadata(&log).await;
    let stats = scraper.stats();
    if let Err(e) = scraper.close().await {
        log.warn(format!("closing session: {e}"));
    }
    VendorRun { vendor, outcome: VendorOutcome::Completed, records, stats }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::error::SessionError;
    use crate::record::FirmwareRecord;
    use crate::vendors::ScrapeStats;

    #[derive(Clone, Copy)]
    enum Behavior {
        Records(usize),
        Unreachable,
        Panics,
        Hangs,
    }

    struct MockScraper {
        vendor: Vendor,
        behavior: Behavior,
        closed: Arc<AtomicBool>,
    }

    impl Drop for MockScraper {
        fn drop(&mut self) { self.closed.store(true, Ordering::SeqCst); }
    }

    #[async_trait]
    impl VendorScraper for MockScraper {
        fn vendor(&self) -> Vendor { self.vendor }

        async fn connect(&mut self, _log: &LogCtx<Scrape>) -> Result<(), ConnectionError> {
            match self.behavior {
                Behavior::Unreachable => Err(ConnectionError { vendor: self.vendor.manufacturer(), url: self.vendor.entry_url().into(), source: SessionError::NoPage }),
                _ => Ok(()),
            }
        }

        async fn scrape_metadata(&mut self, _log: &LogCtx<Scrape>) -> Vec<FirmwareRecord> {
            match self.behavior {
                Behavior::Records(n) => (0..n)
                    .map(|i| {
                        let mut r = FirmwareRecord::new(self.vendor.manufacturer()).unwrap();
                        if i % 2 == 0 { r.download_link = Some(format!("https://fw.test/{i}.bin")); }
                        r
                    })
                    .collect(),
                Behavior::Panics => panic!("layout changed"),
                Behavior::Hangs => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Vec::new()
                }
                Behavior::Unreachable => Vec::new(),
            }
        }

        fn stats(&self) -> ScrapeStats { ScrapeStats::default() }

        async fn close(&mut self) -> Result<(), SessionError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockFactory {
        behaviors: Vec<(Vendor, Behavior)>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ScraperFactory for MockFactory {
        async fn open(&self, vendor: Vendor) -> Result<Box<dyn VendorScraper>, ConnectionError> {
            let behavior = self.behaviors.iter().find(|(v, _)| *v == vendor).map(|(_, b)| *b).unwrap_or(Behavior::Records(0));
            Ok(Box::new(MockScraper { vendor, behavior, closed: self.closed.clone() }))
        }
    }

    fn run_of(out: &RunOutput, vendor: Vendor) -> &VendorRun {
        out.runs.iter().find(|r| r.vendor == vendor).unwrap()
    }

    fn orchestrator(behaviors: Vec<(Vendor, Behavior)>) -> (Orchestrator, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let factory = MockFactory { behaviors, closed: closed.clone() };
        (Orchestrator::new(Arc::new(factory), crate::telemetry::scrape()), closed)
    }

    #[tokio::test]
    async fn failing_vendors_do_not_stop_others() {
        let (orch, _) = orchestrator(vec![
            (Vendor::Avm, Behavior::Records(3)),
            (Vendor::Linksys, Behavior::Unreachable),
            (Vendor::Swisscom, Behavior::Panics),
            (Vendor::TpLink, Behavior::Records(2)),
        ]);
        let out = orch.run(&Vendor::ALL, CancellationToken::new()).await;
        assert_eq!(out.runs.len(), 4);
        assert_eq!(out.total_records(), 5);
        assert_eq!(out.total_partial(), 2);
        assert_eq!(out.failed_vendors(), 2);
        assert!(matches!(run_of(&out, Vendor::Linksys).outcome, VendorOutcome::ConnectionFailed(_)));
        assert_eq!(run_of(&out, Vendor::Swisscom).outcome, VendorOutcome::Panicked("layout changed".into()));
        assert_eq!(run_of(&out, Vendor::TpLink).report().records, 2);
    }

    #[tokio::test]
    async fn cancellation_releases_the_session() {
        let (orch, closed) = orchestrator(vec![(Vendor::Avm, Behavior::Hangs)]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let out = orch.run(&[Vendor::Avm], cancel).await;
        assert_eq!(out.runs[0].outcome, VendorOutcome::Cancelled);
        assert!(closed.load(Ordering::SeqCst));
    }
}
