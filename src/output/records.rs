use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::record::FirmwareRecord;

pub fn records_path(out_dir: &Path, vendor_slug: &str) -> PathBuf {
    out_dir.join(format!("firmware_data_{vendor_slug}.json"))
}

/// Write one vendor's records as a JSON array. Returns the file path.
pub async fn write_records(out_dir: &Path, vendor_slug: &str, records: &[FirmwareRecord], pretty: bool) -> Result<PathBuf> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("create output dir {}", out_dir.display()))?;
    let path = records_path(out_dir, vendor_slug);
    let body = if pretty { serde_json::to_vec_pretty(records)? } else { serde_json::to_vec(records)? };
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_array_per_vendor() {
        let dir = std::env::temp_dir().join(format!("fwscrape-test-{}", uuid::Uuid::new_v4()));
        let mut rec = FirmwareRecord::new("AVM").unwrap();
        rec.download_link = Some("https://download.avm.de/a/b.image".into());
        let path = write_records(&dir, "avm", &[rec.clone()], false).await.unwrap();
        assert!(path.ends_with("firmware_data_avm.json"));

        let body = tokio::fs::read(&path).await.unwrap();
        let back: Vec<FirmwareRecord> = serde_json::from_slice(&body).unwrap();
        assert_eq!(back, vec![rec]);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
