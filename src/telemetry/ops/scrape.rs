use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Scrape;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Connect, Discover, Expand, Extract, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Connect => "connect",
        Phase::Discover => "discover",
        Phase::Expand => "expand",
        Phase::Extract => "extract",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Connect => info_span!("connect"),
        Phase::Discover => info_span!("discover"),
        Phase::Expand => info_span!("expand"),
        Phase::Extract => info_span!("extract"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Scrape {
    const NAME: &'static str = "scrape";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("scrape") }
}
