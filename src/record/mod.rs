//! Canonical firmware-metadata record shared by every vendor.

pub mod sanitize;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordError;
use crate::util::time::normalize_release_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareRecord {
    pub manufacturer: String,
    pub product_name: Option<String>,
    pub product_type: Option<String>,
    pub version: Option<String>,
    pub release_date: Option<String>,
    pub download_link: Option<String>,
    pub checksum_scraped: Option<String>,
    #[serde(default)]
    pub additional_data: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Resolved,
    Partial,
}

/// Facts read from a vendor's plain-text info sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFields {
    pub product_name: Option<String>,
    pub version: Option<String>,
    pub release_date: Option<String>,
}

impl FirmwareRecord {
    pub fn new(manufacturer: impl Into<String>) -> Result<Self, RecordError> {
        let manufacturer = manufacturer.into();
        if manufacturer.trim().is_empty() {
            return Err(RecordError::EmptyManufacturer);
        }
        Ok(Self {
            manufacturer,
            product_name: None,
            product_type: None,
            version: None,
            release_date: None,
            download_link: None,
            checksum_scraped: None,
            additional_data: BTreeMap::new(),
        })
    }

    pub fn status(&self) -> RecordStatus {
        match self.download_link.as_deref() {
            Some(link) if !link.trim().is_empty() && !self.manufacturer.is_empty() => RecordStatus::Resolved,
            _ => RecordStatus::Partial,
        }
    }

    pub fn is_resolved(&self) -> bool { self.status() == RecordStatus::Resolved }

    /// Store a release date, normalized when one of the known layouts matches.
    pub fn set_release_date(&mut self, raw: Option<String>) {
        self.release_date = raw.as_deref().and_then(normalize_release_date);
    }

    pub fn insert_extra(&mut self, key: &str, value: impl Into<Value>) {
        self.additional_data.insert(key.to_string(), value.into());
    }

    /// Fill fields that are still absent; values already read from the page win.
    pub fn fill_from(&mut self, report: &ReportFields) {
        if self.product_name.is_none() { self.product_name = report.product_name.clone(); }
        if self.version.is_none() { self.version = report.version.clone(); }
        if self.release_date.is_none() { self.set_release_date(report.release_date.clone()); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_empty_manufacturer() {
        assert_eq!(FirmwareRecord::new("  ").unwrap_err(), RecordError::EmptyManufacturer);
    }

    #[test]
    fn record_without_link_is_partial() {
        let mut rec = FirmwareRecord::new("AVM").unwrap();
        assert_eq!(rec.status(), RecordStatus::Partial);
        rec.download_link = Some("https://download.avm.de/fritzbox/x.image".into());
        assert!(rec.is_resolved());
    }

    #[test]
    fn fill_from_keeps_existing_values() {
        let mut rec = FirmwareRecord::new("AVM").unwrap();
        rec.version = Some("7.57".into());
        rec.fill_from(&ReportFields {
            product_name: Some("FRITZ!Box 7590".into()),
            version: Some("7.50".into()),
            release_date: Some("19.06.2023".into()),
        });
        assert_eq!(rec.version.as_deref(), Some("7.57"));
        assert_eq!(rec.product_name.as_deref(), Some("FRITZ!Box 7590"));
        assert_eq!(rec.release_date.as_deref(), Some("2023-06-19"));
    }

    #[test]
    fn serializes_partial_record_with_null_link() {
        let mut rec = FirmwareRecord::new("TP-Link").unwrap();
        rec.insert_extra("region", "EU");
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["download_link"], json!(null));
        assert_eq!(value["additional_data"]["region"], "EU");
        assert_eq!(value["manufacturer"], "TP-Link");
    }
}
