use std::io::{self, Write};

use serde::Serialize;

use super::config::{OutputConfig, OutputFormat};
use super::types::{Envelope, Stage};

/// Renders envelopes for stdout: one JSON document per line, or a short
/// human summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presenter {
    Json { pretty: bool },
    Text { pretty: bool },
}

impl Presenter {
    pub fn from_config(cfg: OutputConfig) -> Self {
        match cfg.format {
            OutputFormat::Json => Presenter::Json { pretty: cfg.pretty },
            OutputFormat::Text => Presenter::Text { pretty: cfg.pretty },
        }
    }

    pub fn write<T: Serialize>(&self, env: &Envelope<'_, T>, w: &mut dyn Write) -> io::Result<()> {
        match *self {
            Presenter::Json { pretty } => {
                if pretty { serde_json::to_writer_pretty(&mut *w, env)? } else { serde_json::to_writer(&mut *w, env)? }
                writeln!(w)
            }
            Presenter::Text { pretty } => {
                let stage = match env.stage { Stage::Plan => "Plan", Stage::Result => "Result" };
                match &env.meta {
                    Some(meta) => writeln!(w, "{stage}: {} (run {}, {} ms)", env.op, env.run_id, meta.duration_ms)?,
                    None => writeln!(w, "{stage}: {} (run {})", env.op, env.run_id)?,
                }
                if let Some(meta) = &env.meta {
                    for (vendor, outcome) in &meta.outcomes {
                        writeln!(w, "  {vendor}: {outcome}")?;
                    }
                }
                if pretty {
                    serde_json::to_writer_pretty(&mut *w, env.body)?;
                    writeln!(w)?;
                }
                Ok(())
            }
        }
    }

    pub fn emit<T: Serialize>(&self, env: &Envelope<'_, T>) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.write(env, &mut out)?;
        out.flush()
    }
}
