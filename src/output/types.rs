use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::orchestrator::types::VendorOutcome;

pub const SCHEMA_VERSION: &str = "fwscrape.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Result,
}

/// Facts about a finished run, attached to result envelopes.
#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outcomes: BTreeMap<&'static str, VendorOutcome>,
}

/// One document on stdout per command. `run_id` matches the id on the
/// command's log lines.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T> {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub run_id: Uuid,
    pub op: &'static str,
    pub stage: Stage,
    pub body: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<RunMeta>,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn plan(op: &'static str, run_id: Uuid, body: &'a T) -> Self {
        Self { schema_version: SCHEMA_VERSION, time: Utc::now(), run_id, op, stage: Stage::Plan, body, meta: None }
    }

    pub fn result(op: &'static str, run_id: Uuid, body: &'a T, meta: Option<RunMeta>) -> Self {
        Self { schema_version: SCHEMA_VERSION, time: Utc::now(), run_id, op, stage: Stage::Result, body, meta }
    }
}
