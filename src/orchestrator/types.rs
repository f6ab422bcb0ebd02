use std::fmt;

use serde::Serialize;

use crate::record::FirmwareRecord;
use crate::vendors::{ScrapeStats, Vendor};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum VendorOutcome {
    Completed,
    ConnectionFailed(String),
    Cancelled,
    Panicked(String),
}

impl VendorOutcome {
    pub fn is_failure(&self) -> bool { !matches!(self, VendorOutcome::Completed) }
}

impl fmt::Display for VendorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorOutcome::Completed => f.write_str("completed"),
            VendorOutcome::ConnectionFailed(msg) => write!(f, "connection failed ({msg})"),
            VendorOutcome::Cancelled => f.write_str("cancelled"),
            VendorOutcome::Panicked(msg) => write!(f, "panicked ({msg})"),
        }
    }
}

/// Per-vendor summary line of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VendorReport {
    pub vendor: &'static str,
    pub outcome: VendorOutcome,
    pub records: usize,
    pub partial: usize,
    pub expansion_failures: usize,
    pub skipped_items: usize,
    pub field_failures: usize,
}

/// Everything one vendor produced; appended to the run output in one step.
#[derive(Debug)]
pub struct VendorRun {
    pub vendor: Vendor,
    pub outcome: VendorOutcome,
    pub records: Vec<FirmwareRecord>,
    pub stats: ScrapeStats,
}

impl VendorRun {
    pub fn failed(vendor: Vendor, outcome: VendorOutcome) -> Self {
        Self { vendor, outcome, records: Vec::new(), stats: ScrapeStats::default() }
    }

    pub fn report(&self) -> VendorReport {
        VendorReport {
            vendor: self.vendor.slug(),
            outcome: self.outcome.clone(),
            records: self.records.len(),
            partial: self.records.iter().filter(|r| !r.is_resolved()).count(),
            expansion_failures: self.stats.expansion_failures,
            skipped_items: self.stats.skipped_items,
            field_failures: self.stats.field_failures,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunOutput {
    pub runs: Vec<VendorRun>,
}

impl RunOutput {
    pub fn reports(&self) -> Vec<VendorReport> {
        self.runs.iter().map(VendorRun::report).collect()
    }

    pub fn total_records(&self) -> usize { self.runs.iter().map(|r| r.records.len()).sum() }

    pub fn total_partial(&self) -> usize {
        self.runs.iter().flat_map(|r| &r.records).filter(|r| !r.is_resolved()).count()
    }

    pub fn failed_vendors(&self) -> usize { self.runs.iter().filter(|r| r.outcome.is_failure()).count() }
}
