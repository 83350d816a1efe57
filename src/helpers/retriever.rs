use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::models::calendar::MonthKey;
use crate::models::raw::ChatMessage;

/// Source of the month's raw chat messages. The chat protocol itself lives
/// behind this trait.
#[async_trait]
pub trait MessageRetriever: Send + Sync {
    async fn fetch(&self, chat_id: &str, month: MonthKey) -> anyhow::Result<Vec<ChatMessage>>;
}

/// Reads messages exported to `<dir>/<chat_id>/messages_YYYY-MM.json`.
#[derive(Debug, Clone)]
pub struct ExportRetriever {
    pub export_dir: PathBuf,
}

impl ExportRetriever {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    pub fn export_path(&self, chat_id: &str, month: MonthKey) -> PathBuf {
        self.export_dir
            .join(chat_id)
            .join(format!("messages_{month}.json"))
    }
}

#[async_trait]
impl MessageRetriever for ExportRetriever {
    async fn fetch(&self, chat_id: &str, month: MonthKey) -> anyhow::Result<Vec<ChatMessage>> {
        let path = self.export_path(chat_id, month);
        info!("Reading exported messages for {} from {}", month, path.display());

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read message export {}", path.display()))?;
        let messages: Vec<ChatMessage> = serde_json::from_slice(&bytes)?;
        let total = messages.len();

        let kept = messages_in_month(messages, month);
        if kept.len() < total {
            warn!(
                "Dropped {} message(s) outside {} or without text",
                total - kept.len(),
                month
            );
        }

        info!("Fetched {} message(s) for {}", kept.len(), month);
        Ok(kept)
    }
}

/// Messages with text whose local date falls into `month`, oldest first.
pub fn messages_in_month(messages: Vec<ChatMessage>, month: MonthKey) -> Vec<ChatMessage> {
    let mut kept: Vec<ChatMessage> = messages
        .into_iter()
        .filter(|message| !message.text.trim().is_empty())
        .filter(|message| month.contains(message.date.date_naive()))
        .collect();
    kept.sort_by_key(|message| (message.date, message.id));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn message(id: i64, date: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id,
            date: DateTime::parse_from_rfc3339(date).unwrap(),
            text: text.to_string(),
            sender_id: Some(1),
            is_forwarded: false,
        }
    }

    #[test]
    fn keeps_only_month_messages_with_text() {
        let june = MonthKey::new(2025, 6).unwrap();
        let messages = vec![
            message(3, "2025-06-03T10:00:00+03:00", "abrau: deploy 4h"),
            message(1, "2025-05-31T23:00:00+00:00", "late may"),
            message(2, "2025-06-02T09:00:00+03:00", "daily"),
            message(4, "2025-06-04T09:00:00+03:00", "   "),
            message(5, "2025-07-01T00:30:00+03:00", "next month"),
        ];

        let kept: Vec<i64> = messages_in_month(messages, june)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[tokio::test]
    async fn reads_export_file() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = ExportRetriever::new(dir.path());
        let june = MonthKey::new(2025, 6).unwrap();
        let path = retriever.export_path("worklog", june);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[{"id": 1, "date": "2025-06-02T09:00:00+00:00", "text": "daily"}]"#,
        )
        .unwrap();

        let messages = retriever.fetch("worklog", june).await.unwrap();
        assert_eq!(messages.len(), 1);

        assert!(retriever.fetch("other-chat", june).await.is_err());
    }
}
