use chrono::NaiveDate;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::models::calendar::MonthKey;

/// Where pipeline artifacts live on disk. Intermediate JSON goes under
/// `data_dir`, rendered workbooks under `reports_dir`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(data_dir: impl Into<PathBuf>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            reports_dir: reports_dir.into(),
        }
    }

    pub fn raw_messages_path(&self, month: MonthKey) -> PathBuf {
        self.data_dir.join(format!("raw_messages_{month}.json"))
    }

    pub fn raw_report_path(&self, month: MonthKey) -> PathBuf {
        self.data_dir.join(format!("report_data_{month}.json"))
    }

    pub fn normalized_report_path(&self, month: MonthKey) -> PathBuf {
        self.data_dir
            .join(format!("report_data_{month}.normalized.json"))
    }

    pub fn report_path(&self, owner: &str, month: MonthKey, generated_on: NaiveDate) -> PathBuf {
        self.reports_dir
            .join(report_file_name(owner, month, generated_on))
    }

    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        payload: &T,
    ) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(payload)?;
        write_bytes(path, &bytes).await?;
        Ok(())
    }

    pub async fn write_text(&self, path: &Path, text: &str) -> anyhow::Result<()> {
        write_bytes(path, text.as_bytes()).await?;
        Ok(())
    }

    pub async fn write_report(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        write_bytes(path, bytes).await?;
        Ok(())
    }
}

/// `<owner>_<YYYY>_<MM>_<YYYYMMDD>.xlsx`, with anything but letters, digits,
/// `-` and `_` in the owner replaced by `_`.
pub fn report_file_name(owner: &str, month: MonthKey, generated_on: NaiveDate) -> String {
    let owner: String = owner
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "{}_{:04}_{:02}_{}.xlsx",
        owner,
        month.year(),
        month.month(),
        generated_on.format("%Y%m%d")
    )
}

async fn write_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match tokio::fs::write(path, bytes).await {
        Ok(()) => {
            info!("Saved {} bytes to {}", bytes.len(), path.display());
            Ok(())
        }
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june() -> MonthKey {
        MonthKey::new(2025, 6).unwrap()
    }

    #[test]
    fn artifact_names_are_keyed_by_month() {
        let store = ArtifactStore::new("data", "reports");
        assert_eq!(
            store.raw_messages_path(june()),
            PathBuf::from("data/raw_messages_2025-06.json")
        );
        assert_eq!(
            store.raw_report_path(june()),
            PathBuf::from("data/report_data_2025-06.json")
        );
        assert_eq!(
            store.normalized_report_path(june()),
            PathBuf::from("data/report_data_2025-06.normalized.json")
        );
    }

    #[test]
    fn report_file_name_is_deterministic() {
        let generated = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(
            report_file_name("Anton Karmanov", june(), generated),
            "Anton_Karmanov_2025_06_20250701.xlsx"
        );
        assert_eq!(
            report_file_name("../evil", june(), generated),
            "___evil_2025_06_20250701.xlsx"
        );
    }

    #[tokio::test]
    async fn writes_create_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("data"), dir.path().join("reports"));

        let path = store.raw_report_path(june());
        store
            .write_json(&path, &serde_json::json!({"days": []}))
            .await
            .unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["days"], serde_json::json!([]));
    }
}
