use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{info, debug, warn, error, Span};
use uuid::Uuid;

use crate::orchestrator::types::VendorReport;
use crate::output::config::OutputConfig;
use crate::output::presenter::Presenter;
use crate::output::types::{Envelope, RunMeta};

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

/// Logging handle for one operation. Cheap to copy; passed explicitly from the
/// orchestrator down to scrapers and the field extractor.
pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) run_id: Uuid,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> Clone for LogCtx<O> {
    fn clone(&self) -> Self { *self }
}

impl<O: OpMarker> Copy for LogCtx<O> {}

impl<O: OpMarker> LogCtx<O> {
    fn op_name(&self) -> &'static str { O::NAME }

    pub fn run_id(&self) -> Uuid { self.run_id }

    pub fn root_span(&self) -> Span { O::root_span() }

    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.root_span();
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), run_id = %self.run_id, "start");
        } else {
            info!(op = %self.op_name(), run_id = %self.run_id, details = %details, "start");
        }
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.span(ph);
        let details = kv_to_string(fields);
        if details.is_empty() {
            debug!(op = %self.op_name(), phase = ph.name(), "span_start");
        } else {
            debug!(op = %self.op_name(), phase = ph.name(), details = %details, "span_start");
        }
        span
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn debug(&self, msg: impl AsRef<str>) { if self.json { debug!(op = %self.op_name(), "{}", msg.as_ref()); } else { debug!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }
    pub fn error(&self, msg: impl AsRef<str>) { if self.json { error!(op = %self.op_name(), "{}", msg.as_ref()); } else { error!("{}", msg.as_ref()); } }

    pub fn info_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        let details = kv_to_string(kv);
        if self.json { info!(op = %self.op_name(), details = %details, "{}", msg); }
        else { info!("{} {}", msg, details); }
    }

    pub fn debug_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        let details = kv_to_string(kv);
        if self.json { debug!(op = %self.op_name(), details = %details, "{}", msg); }
        else { debug!("{} {}", msg, details); }
    }

    pub fn plan<T: Serialize>(&self, plan: &T) -> Result<()> {
        let env = Envelope::plan(self.op_name(), self.run_id, plan);
        Presenter::from_config(OutputConfig::from_env()).emit(&env)?;
        Ok(())
    }

    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> {
        self.result_with_meta(result, None)
    }

    pub fn result_with_meta<T: Serialize>(&self, result: &T, meta: Option<RunMeta>) -> Result<()> {
        let env = Envelope::result(self.op_name(), self.run_id, result, meta);
        Presenter::from_config(OutputConfig::from_env()).emit(&env)?;
        Ok(())
    }
}

// Scrape-specific helpers remain available on the typed context
impl LogCtx<crate::telemetry::ops::scrape::Scrape> {
    pub fn vendor_summary(&self, r: &VendorReport) {
        let outcome = &r.outcome;
        if self.json {
            info!(op = %self.op_name(), vendor = r.vendor, outcome = %outcome, records = r.records, partial = r.partial,
                expansion_failures = r.expansion_failures, skipped = r.skipped_items, field_failures = r.field_failures, "vendor_summary");
        } else {
            info!("✅ {} — {} records={} partial={} expansion_failures={} skipped={} field_failures={}",
                r.vendor, outcome, r.records, r.partial, r.expansion_failures, r.skipped_items, r.field_failures);
        }
    }

    pub fn totals(&self, records: usize, partial: usize, failed_vendors: usize) {
        if self.json { info!(op = %self.op_name(), records, partial, failed_vendors, "scrape_totals"); }
        else { info!("📊 Scrape totals — records={} partial={} failed_vendors={}", records, partial, failed_vendors); }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}
