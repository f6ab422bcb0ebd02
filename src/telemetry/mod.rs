pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;
use uuid::Uuid;

/// Each call starts a new run id.
pub fn scrape() -> LogCtx<ops::scrape::Scrape> { LogCtx { json: config::logs_are_json(), run_id: Uuid::new_v4(), _marker: std::marker::PhantomData } }
pub fn vendors() -> LogCtx<ops::vendors::Vendors> { LogCtx { json: config::logs_are_json(), run_id: Uuid::new_v4(), _marker: std::marker::PhantomData } }
