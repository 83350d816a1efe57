use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

// Shape of the candidate report the LLM is asked to produce.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawReport {
    #[serde(default)]
    pub days: Vec<RawDay>,
    #[serde(rename = "not-mentioned-days", default)]
    pub not_mentioned_days: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawDay {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub done: Option<Vec<RawItem>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    #[serde(default)]
    pub task: Option<String>,
    /// Kept loose so that `2`, `2.0` and `"2"` all coerce to the same value.
    #[serde(default)]
    pub duration: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
}

impl fmt::Display for RawReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: usize = self
            .days
            .iter()
            .map(|day| day.done.as_ref().map_or(0, Vec::len))
            .sum();

        writeln!(f, "Raw report:")?;
        writeln!(f, "  Days: {}", self.days.len())?;
        writeln!(f, "  Items: {}", items)?;
        write!(f, "  Not mentioned: {}", self.not_mentioned_days.len())
    }
}

/// One message as handed over by the message retriever.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub date: DateTime<FixedOffset>,
    pub text: String,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub is_forwarded: bool,
}
