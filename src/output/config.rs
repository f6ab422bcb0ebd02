use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    pub fn from_env() -> Self {
        let format = match env::var("FWSCRAPE_OUTPUT_FORMAT").ok().as_deref() {
            Some("text") => OutputFormat::Text,
            Some("json") => OutputFormat::Json,
            // `--json` without an explicit format means JSON envelopes
            _ if crate::telemetry::config::json_mode() => OutputFormat::Json,
            _ => OutputFormat::Text,
        };
        let pretty = match env::var("FWSCRAPE_OUTPUT_PRETTY").ok().as_deref() {
            Some(v) if v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => true,
            _ => false,
        };
        OutputConfig { format, pretty }
    }
}
