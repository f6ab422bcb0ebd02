//! Fault-isolated field reads.
//!
//! Every fact a vendor scraper pulls from a page goes through [`Extractor`].
//! A failed read (missing node, session error, timeout, empty transform) is
//! logged with the field name and source, counted, and returned as `None`.

pub mod report;

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::error::SessionError;
use crate::session::fetch::Fetch;
use crate::session::{BrowserSession, Element, Locator};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::scrape::Scrape;

use self::report::TextReport;

#[derive(Clone, Copy, Debug)]
pub enum Accessor {
    Text,
    Attribute(&'static str),
    InnerHtml,
}

/// Which match of a locator to use.
#[derive(Clone, Copy, Debug)]
pub enum Pick {
    First,
    Nth(usize),
    /// n-th element whose rendered text satisfies the predicate
    NthMatching(usize, fn(&str) -> bool),
}

#[derive(Clone, Copy, Debug)]
pub enum Transform {
    Trim,
    /// text after the first occurrence of the marker
    After(&'static str),
    TrimEndMatches(char),
    /// drop everything up to and including the first separator
    AfterFirst(char),
}

impl Transform {
    fn apply(&self, s: String) -> Option<String> {
        match self {
            Transform::Trim => Some(s.trim().to_string()),
            Transform::After(marker) => s.split_once(marker).map(|(_, rest)| rest.to_string()),
            Transform::TrimEndMatches(c) => Some(s.trim_end().trim_end_matches(*c).to_string()),
            Transform::AfterFirst(sep) => s.split_once(*sep).map(|(_, rest)| rest.to_string()),
        }
    }
}

/// What to read: locator + pick + accessor + transforms.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub field: &'static str,
    pub locator: Locator,
    pub pick: Pick,
    pub accessor: Accessor,
    pub transforms: Vec<Transform>,
    pub required: bool,
}

impl Instruction {
    fn new(field: &'static str, locator: Locator, accessor: Accessor) -> Self {
        Self { field, locator, pick: Pick::First, accessor, transforms: vec![Transform::Trim], required: false }
    }

    pub fn text(field: &'static str, locator: Locator) -> Self { Self::new(field, locator, Accessor::Text) }

    pub fn attr(field: &'static str, locator: Locator, name: &'static str) -> Self {
        Self::new(field, locator, Accessor::Attribute(name))
    }

    pub fn inner_html(field: &'static str, locator: Locator) -> Self { Self::new(field, locator, Accessor::InnerHtml) }

    pub fn then(mut self, t: Transform) -> Self { self.transforms.push(t); self }

    /// Missing value is logged at warn instead of debug.
    pub fn required(mut self) -> Self { self.required = true; self }
}

/// Where a read happens: an identifier for diagnostics plus an optional
/// element the locator is scoped to.
#[derive(Clone, Copy, Debug)]
pub struct Source<'a> {
    pub id: &'a str,
    pub scope: Option<&'a Element>,
}

impl<'a> Source<'a> {
    pub fn page(id: &'a str) -> Self { Self { id, scope: None } }
    pub fn within(id: &'a str, el: &'a Element) -> Self { Self { id, scope: Some(el) } }
}

#[derive(Debug, Error)]
enum Miss {
    #[error("no element for {0}")]
    NotFound(String),
    #[error("attribute {0} not present")]
    NoAttribute(&'static str),
    #[error("empty value")]
    Empty,
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub struct Extractor<'l> {
    log: &'l LogCtx<Scrape>,
    failures: AtomicUsize,
}

impl<'l> Extractor<'l> {
    pub fn new(log: &'l LogCtx<Scrape>) -> Self {
        Self { log, failures: AtomicUsize::new(0) }
    }

    pub fn log(&self) -> &LogCtx<Scrape> { self.log }

    /// Number of recovered field failures so far.
    pub fn failures(&self) -> usize { self.failures.load(Ordering::Relaxed) }

    pub async fn extract(&self, session: &mut dyn BrowserSession, src: &Source<'_>, ins: &Instruction) -> Option<String> {
        match try_extract(session, src, ins).await {
            Ok(v) => Some(v),
            Err(miss) => {
                self.fail(ins.field, src.id, &miss.to_string(), ins.required);
                None
            }
        }
    }

    /// Evaluate a fallback table in order; the first success wins.
    pub async fn first_of(&self, session: &mut dyn BrowserSession, src: &Source<'_>, chain: &[Instruction]) -> Option<String> {
        let mut reasons = Vec::new();
        for ins in chain {
            match try_extract(session, src, ins).await {
                Ok(v) => return Some(v),
                Err(miss) => reasons.push(miss.to_string()),
            }
        }
        let field = chain.first().map(|i| i.field).unwrap_or("value");
        let required = chain.iter().any(|i| i.required);
        self.fail(field, src.id, &reasons.join("; "), required);
        None
    }

    /// Read one accessor straight off an element already in hand.
    pub async fn read(
        &self,
        session: &mut dyn BrowserSession,
        source_id: &str,
        el: &Element,
        field: &'static str,
        accessor: Accessor,
    ) -> Option<String> {
        let raw = match accessor {
            Accessor::Text => session.read_text(el).await.map_err(Miss::from),
            Accessor::Attribute(name) => match session.read_attribute(el, name).await {
                Ok(Some(v)) => Ok(v),
                Ok(None) => Err(Miss::NoAttribute(name)),
                Err(e) => Err(e.into()),
            },
            Accessor::InnerHtml => session.read_inner_html(el).await.map_err(Miss::from),
        };
        match raw.map(|v| v.trim().to_string()) {
            Ok(v) if !v.is_empty() => Some(v),
            Ok(_) => {
                self.fail(field, source_id, &Miss::Empty.to_string(), false);
                None
            }
            Err(miss) => {
                self.fail(field, source_id, &miss.to_string(), false);
                None
            }
        }
    }

    /// First layout in `chain` that yields an element, with its index.
    pub async fn first_element_of(
        &self,
        session: &mut dyn BrowserSession,
        src: &Source<'_>,
        field: &'static str,
        chain: &[(Locator, Pick)],
    ) -> Option<(usize, Element)> {
        let mut reasons = Vec::new();
        for (i, (locator, pick)) in chain.iter().enumerate() {
            match pick_element(session, src.scope, locator, *pick).await {
                Ok(el) => return Some((i, el)),
                Err(miss) => reasons.push(miss.to_string()),
            }
        }
        self.fail(field, src.id, &reasons.join("; "), false);
        None
    }

    /// All matches; a failed query is logged and reads as an empty list.
    pub async fn elements(
        &self,
        session: &mut dyn BrowserSession,
        src: &Source<'_>,
        field: &'static str,
        locator: &Locator,
    ) -> Vec<Element> {
        match session.find_all(src.scope, locator).await {
            Ok(found) => found,
            Err(e) => {
                self.fail(field, src.id, &e.to_string(), false);
                Vec::new()
            }
        }
    }

    /// Route a pure parse of already-read text through the same failure path.
    pub fn derive<T>(&self, field: &'static str, source_id: &str, f: impl FnOnce() -> Option<T>) -> Option<T> {
        let out = f();
        if out.is_none() {
            self.fail(field, source_id, "no parse pattern matched", false);
        }
        out
    }

    pub async fn fetch_report(&self, fetcher: &dyn Fetch, url: &str) -> Option<TextReport> {
        match fetcher.fetch_text(url).await {
            Ok(text) => Some(TextReport::from_text(&text)),
            Err(e) => {
                self.fail("text report", url, &e.to_string(), false);
                None
            }
        }
    }

    pub fn report_value(&self, report: &TextReport, source_id: &str, field: &'static str, query: &str, delim: char) -> Option<String> {
        let out = report.value(query, delim);
        if out.is_none() {
            self.fail(field, source_id, &format!("no line containing {query:?}"), false);
        }
        out
    }

    fn fail(&self, field: &str, source_id: &str, reason: &str, required: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let msg = format!("could not read {field} for '{source_id}': {reason}");
        if required { self.log.warn(msg); } else { self.log.debug(msg); }
    }
}

async fn try_extract(session: &mut dyn BrowserSession, src: &Source<'_>, ins: &Instruction) -> Result<String, Miss> {
    let el = pick_element(session, src.scope, &ins.locator, ins.pick).await?;
    let raw = match ins.accessor {
        Accessor::Text => session.read_text(&el).await?,
        Accessor::Attribute(name) => session.read_attribute(&el, name).await?.ok_or(Miss::NoAttribute(name))?,
        Accessor::InnerHtml => session.read_inner_html(&el).await?,
    };
    let mut value = raw;
    for t in &ins.transforms {
        value = t.apply(value).ok_or(Miss::Empty)?;
    }
    if value.trim().is_empty() { return Err(Miss::Empty); }
    Ok(value)
}

async fn pick_element(
    session: &mut dyn BrowserSession,
    scope: Option<&Element>,
    locator: &Locator,
    pick: Pick,
) -> Result<Element, Miss> {
    let found = session.find_all(scope, locator).await?;
    let not_found = || Miss::NotFound(locator.to_string());
    match pick {
        Pick::First => found.into_iter().next().ok_or_else(not_found),
        Pick::Nth(n) => found.into_iter().nth(n).ok_or_else(not_found),
        Pick::NthMatching(n, pred) => {
            let mut hits = 0usize;
            for el in found {
                let text = session.read_text(&el).await?;
                if pred(&text) {
                    if hits == n { return Ok(el); }
                    hits += 1;
                }
            }
            Err(not_found())
        }
    }
}
