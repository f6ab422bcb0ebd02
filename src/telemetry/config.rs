use std::sync::OnceLock;

static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Filter used when `RUST_LOG` is unset. The CDP client logs every protocol
/// message at debug, so it is held to warnings.
const DEFAULT_FILTER: &str = "info,chromiumoxide=warn";

/// `--json`: emit a single result envelope on stdout.
pub fn set_json_mode(v: bool) {
    let _ = JSON_MODE.set(v);
}

pub fn json_mode() -> bool {
    *JSON_MODE.get().unwrap_or(&false)
}

/// Shape of the log lines written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to compact text.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") | Some("ndjson") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var("FWSCRAPE_LOG_FORMAT").ok().as_deref())
    }
}

pub fn logs_are_json() -> bool {
    LogFormat::from_env() == LogFormat::Json
}

/// Installs the global subscriber. Vendor and phase spans are attached to
/// every event, so JSON lines carry the current span's fields.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let builder = tracing_subscriber::registry().with(filter);

    match LogFormat::from_env() {
        LogFormat::Json => {
            let layer = fmt_layer.json().flatten_event(true).with_current_span(true).with_span_list(false);
            let _ = builder.with(layer).try_init();
        }
        LogFormat::Compact => {
            let _ = builder.with(fmt_layer.compact()).try_init();
        }
    }
}
