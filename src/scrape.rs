use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ScrapeConfig, SessionFactory, SessionKind};
use crate::orchestrator::types::VendorReport;
use crate::orchestrator::Orchestrator;
use crate::output::config::OutputConfig;
use crate::output::records::{records_path, write_records};
use crate::output::types::RunMeta;
use crate::telemetry::{self};
use crate::telemetry::ops::scrape::Phase as ScrapePhase;
use crate::vendors::Vendor;

#[derive(Args, Debug)]
pub struct ScrapeCmd {
    /// Vendors to scrape (all when omitted)
    #[arg(value_enum)] vendors: Vec<Vendor>,
    #[arg(long)] max_products: Option<usize>,
    #[arg(long, value_enum)] session: Option<SessionKind>,
    /// DevTools websocket of a running browser (chrome sessions)
    #[arg(long)] chrome_url: Option<String>,
    /// Show the browser window (chrome sessions)
    #[arg(long, default_value_t = false)] headed: bool,
    #[arg(long)] out_dir: Option<PathBuf>,
    #[arg(long, default_value_t = false)] apply: bool,
}

#[derive(Serialize)]
struct PlannedVendor { vendor: &'static str, entry_url: &'static str, output: String }

#[derive(Serialize)]
struct ScrapePlan {
    session: SessionKind,
    headless: bool,
    max_products: Option<usize>,
    vendors: Vec<PlannedVendor>,
}

#[derive(Serialize)]
struct ScrapeResult {
    records: usize,
    partial: usize,
    failed_vendors: usize,
    vendors: Vec<VendorReport>,
    files: Vec<String>,
}

fn resolve(args: &ScrapeCmd) -> (Vec<Vendor>, ScrapeConfig) {
    let mut cfg = ScrapeConfig::from_env();
    if let Some(kind) = args.session { cfg.session.kind = kind; }
    if let Some(url) = &args.chrome_url { cfg.session.chrome_url = Some(url.clone()); }
    if args.headed { cfg.session.headless = false; }
    if let Some(dir) = &args.out_dir { cfg.out_dir = dir.clone(); }
    if args.max_products.is_some() { cfg.options.max_products = args.max_products; }

    let mut vendors = if args.vendors.is_empty() { Vendor::ALL.to_vec() } else { args.vendors.clone() };
    vendors.sort();
    vendors.dedup();
    (vendors, cfg)
}

pub async fn run(args: ScrapeCmd) -> Result<()> {
    let log = telemetry::scrape();
    let (vendors, cfg) = resolve(&args);
    let _g = log
        .root_span_kv([
            ("run_id", log.run_id().to_string()),
            ("vendors", vendors.iter().map(|v| v.slug()).collect::<Vec<_>>().join(",")),
            ("session", format!("{:?}", cfg.session.kind)),
            ("max_products", format!("{:?}", cfg.options.max_products)),
            ("out_dir", cfg.out_dir.display().to_string()),
            ("apply", args.apply.to_string()),
        ])
        .entered();

    // Plan-only
    if !args.apply {
        let _sp = log.span(&ScrapePhase::Plan).entered();
        let planned: Vec<PlannedVendor> = vendors
            .iter()
            .map(|v| PlannedVendor {
                vendor: v.slug(),
                entry_url: v.entry_url(),
                output: records_path(&cfg.out_dir, v.slug()).display().to_string(),
            })
            .collect();
        if telemetry::config::json_mode() {
            let plan = ScrapePlan {
                session: cfg.session.kind,
                headless: cfg.session.headless,
                max_products: cfg.options.max_products,
                vendors: planned,
            };
            log.plan(&plan)?;
        } else {
            log.info(format!(
                "📝 Scrape plan: session={:?} headless={} max_products={:?}",
                cfg.session.kind, cfg.session.headless, cfg.options.max_products
            ));
            for p in &planned { log.info(format!("  {} {} → {}", p.vendor, p.entry_url, p.output)); }
            log.info("   Use --apply to scrape.");
        }
        return Ok(());
    }

    let t0 = Instant::now();
    let factory = SessionFactory::new(&cfg).context("build http client")?;
    let orchestrator = Orchestrator::new(Arc::new(factory), log);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let out = orchestrator.run(&vendors, cancel).await;

    let pretty = OutputConfig::from_env().pretty;
    let mut files = Vec::new();
    for run in &out.runs {
        if run.outcome.is_failure() && run.records.is_empty() { continue; }
        let path = write_records(&cfg.out_dir, run.vendor.slug(), &run.records, pretty)
            .instrument(log.span_kv(&ScrapePhase::Write, [("vendor", run.vendor.slug().to_string())]))
            .await?;
        log.info_kv("wrote records", [("vendor", run.vendor.slug().to_string()), ("records", run.records.len().to_string()), ("path", path.display().to_string())]);
        files.push(path.display().to_string());
    }

    log.totals(out.total_records(), out.total_partial(), out.failed_vendors());

    if telemetry::config::json_mode() {
        let res = ScrapeResult {
            records: out.total_records(),
            partial: out.total_partial(),
            failed_vendors: out.failed_vendors(),
            vendors: out.reports(),
            files,
        };
        let meta = RunMeta {
            duration_ms: t0.elapsed().as_millis() as u64,
            outcomes: out.runs.iter().map(|r| (r.vendor.slug(), r.outcome.clone())).collect(),
        };
        log.result_with_meta(&res, Some(meta))?;
    }
    Ok(())
}
