use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;

mod config;
mod error;
mod extract;
mod list;
mod orchestrator;
mod output;
mod record;
mod scrape;
mod session;
mod telemetry;
mod traverse;
mod util;
mod vendors;

#[derive(Parser)]
#[command(name = "fwscrape", about = "Firmware metadata scraper for vendor download portals")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported vendors and their entry points
    Vendors(list::VendorsCmd),
    /// Scrape one or more vendor portals into per-vendor JSON files
    Scrape(scrape::ScrapeCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and FWSCRAPE_LOG_FORMAT
    telemetry::config::init_tracing();

    match cli.command {
        Commands::Vendors(args) => list::run(args).await?,
        Commands::Scrape(args) => scrape::run(args).await?,
    }

    Ok(())
}
