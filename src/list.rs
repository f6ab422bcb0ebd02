use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::config::ScrapeConfig;
use crate::output::records::records_path;
use crate::telemetry::{self};
use crate::telemetry::ops::vendors::Phase as VendorsPhase;
use crate::vendors::Vendor;

#[derive(Args, Debug)]
pub struct VendorsCmd {
    #[arg(long)] out_dir: Option<std::path::PathBuf>,
}

#[derive(Serialize)]
struct VendorRow { vendor: &'static str, manufacturer: &'static str, entry_url: &'static str, output: String }

pub async fn run(args: VendorsCmd) -> Result<()> {
    let log = telemetry::vendors();
    let out_dir = args.out_dir.unwrap_or_else(|| ScrapeConfig::from_env().out_dir);
    let _g = log.root_span_kv([("out_dir", out_dir.display().to_string())]).entered();
    let _s = log.span(&VendorsPhase::List).entered();

    let rows: Vec<VendorRow> = Vendor::ALL
        .iter()
        .map(|v| VendorRow {
            vendor: v.slug(),
            manufacturer: v.manufacturer(),
            entry_url: v.entry_url(),
            output: records_path(&out_dir, v.slug()).display().to_string(),
        })
        .collect();

    if telemetry::config::json_mode() {
        log.result(&rows)?;
    } else {
        for r in &rows {
            log.info(format!("{:<9} {:<9} {}", r.vendor, r.manufacturer, r.entry_url));
        }
    }
    Ok(())
}
