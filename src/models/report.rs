use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::error::ParseError;
use crate::models::calendar::MonthKey;
use crate::models::raw::{RawDay, RawItem, RawReport};

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Meeting,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Task => "task",
            ItemKind::Meeting => "meeting",
        }
    }

    fn parse(value: &str) -> Result<Self, ParseError> {
        match value.trim().to_lowercase().as_str() {
            "task" => Ok(ItemKind::Task),
            "meeting" => Ok(ItemKind::Meeting),
            _ => Err(ParseError::UnknownItemType(value.to_string())),
        }
    }
}

/// One entry of a day's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogItem {
    /// Lowercase, single line, never empty.
    pub label: String,
    pub duration_hours: u32,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub kind: ItemKind,
}

impl LogItem {
    /// Longest single entry the parser accepts.
    pub const MAX_HOURS: u32 = 24;

    pub fn new(label: &str, duration_hours: u32, kind: ItemKind) -> Self {
        Self {
            label: normalize_label(label),
            duration_hours,
            description: String::new(),
            tags: BTreeSet::new(),
            kind,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    fn from_raw(raw: RawItem, date: NaiveDate, position: usize) -> Result<Self, ParseError> {
        let context = || format!("item #{} on {}", position + 1, date);

        let label = raw
            .task
            .as_deref()
            .map(normalize_label)
            .filter(|label| !label.is_empty())
            .ok_or_else(|| ParseError::MissingField {
                field: "task",
                context: context(),
            })?;

        let duration = raw.duration.as_ref().ok_or_else(|| ParseError::MissingField {
            field: "duration",
            context: context(),
        })?;
        let duration_hours = coerce_duration(duration)
            .and_then(|hours| u32::try_from(hours).ok())
            .filter(|hours| (1..=Self::MAX_HOURS).contains(hours))
            .ok_or_else(|| ParseError::InvalidItem {
                date,
                reason: format!(
                    "duration {} of '{}' is not a whole number of hours between 1 and {}",
                    duration,
                    label,
                    Self::MAX_HOURS
                ),
            })?;

        let item_type = raw.item_type.as_deref().ok_or_else(|| ParseError::MissingField {
            field: "type",
            context: context(),
        })?;
        let kind = ItemKind::parse(item_type)?;

        let tags = raw
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(LogItem {
            label,
            duration_hours,
            description: raw.description.unwrap_or_default().trim().to_string(),
            tags,
            kind,
        })
    }
}

impl From<&LogItem> for RawItem {
    fn from(item: &LogItem) -> Self {
        RawItem {
            task: Some(item.label.clone()),
            duration: Some(Value::from(item.duration_hours)),
            description: Some(item.description.clone()),
            tags: Some(item.tags.iter().cloned().collect()),
            item_type: Some(item.kind.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub items: Vec<LogItem>,
}

impl DayReport {
    pub fn new(date: NaiveDate, items: Vec<LogItem>) -> Self {
        Self { date, items }
    }

    /// Saturates instead of wrapping, so an absurd day still fails the workload bounds.
    pub fn total_hours(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |total, item| total.saturating_add(item.duration_hours))
    }
}

/// A month of log entries. Every calendar date is expected in exactly one of
/// `days` or `unmentioned_days`; the validator reports where that does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthReport {
    pub month: MonthKey,
    pub days: BTreeMap<NaiveDate, DayReport>,
    pub unmentioned_days: BTreeSet<NaiveDate>,
}

impl MonthReport {
    pub fn new(month: MonthKey) -> Self {
        Self {
            month,
            days: BTreeMap::new(),
            unmentioned_days: BTreeSet::new(),
        }
    }

    pub fn with_day(mut self, day: DayReport) -> Self {
        self.days.insert(day.date, day);
        self
    }

    pub fn with_unmentioned<I: IntoIterator<Item = NaiveDate>>(mut self, dates: I) -> Self {
        self.unmentioned_days.extend(dates);
        self
    }

    /// Dates present in either bucket.
    pub fn covered_dates(&self) -> BTreeSet<NaiveDate> {
        self.days
            .keys()
            .chain(self.unmentioned_days.iter())
            .copied()
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.days.values().map(|day| day.items.len()).sum()
    }

    pub fn from_raw(raw: RawReport, month: MonthKey) -> Result<Self, ParseError> {
        let mut report = MonthReport::new(month);

        for raw_day in raw.days {
            let day = parse_day(raw_day, month)?;
            if report.days.contains_key(&day.date) {
                return Err(ParseError::DuplicateDate(day.date));
            }
            report.days.insert(day.date, day);
        }

        for value in raw.not_mentioned_days {
            let date = parse_date(&value)?;
            ensure_in_month(date, month)?;
            if report.days.contains_key(&date) || !report.unmentioned_days.insert(date) {
                return Err(ParseError::DuplicateDate(date));
            }
        }

        Ok(report)
    }

    /// Back to the `days` / `not-mentioned-days` shape, suitable for re-parsing.
    pub fn to_raw(&self) -> RawReport {
        RawReport {
            days: self
                .days
                .values()
                .map(|day| RawDay {
                    date: Some(day.date.format("%Y-%m-%d").to_string()),
                    done: Some(day.items.iter().map(RawItem::from).collect()),
                })
                .collect(),
            not_mentioned_days: self
                .unmentioned_days
                .iter()
                .map(|date| date.format("%Y-%m-%d").to_string())
                .collect(),
        }
    }
}

pub fn parse_raw_report(input: &str, month: MonthKey) -> Result<MonthReport, ParseError> {
    let raw: RawReport = serde_json::from_str(input)?;
    debug!("{}", raw);

    let report = MonthReport::from_raw(raw, month)?;
    info!(
        "Parsed report for {}: {} day(s), {} item(s), {} not mentioned",
        month,
        report.days.len(),
        report.item_count(),
        report.unmentioned_days.len()
    );
    Ok(report)
}

pub fn parse_raw_report_bytes(input: &[u8], month: MonthKey) -> Result<MonthReport, ParseError> {
    let text = std::str::from_utf8(input).map_err(|e| ParseError::InvalidEncoding(e.to_string()))?;
    parse_raw_report(text, month)
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ParseError> {
    if !DATE_RE.is_match(value) {
        return Err(ParseError::MalformedDate(value.to_string()));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ParseError::MalformedDate(value.to_string()))
}

fn ensure_in_month(date: NaiveDate, month: MonthKey) -> Result<(), ParseError> {
    if month.contains(date) {
        Ok(())
    } else {
        Err(ParseError::DateOutsideMonth { date, month })
    }
}

fn parse_day(raw: RawDay, month: MonthKey) -> Result<DayReport, ParseError> {
    let value = raw
        .date
        .filter(|date| !date.trim().is_empty())
        .ok_or_else(|| ParseError::MissingField {
            field: "date",
            context: "day object".to_string(),
        })?;

    let date = parse_date(&value)?;
    ensure_in_month(date, month)?;

    let items = raw
        .done
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(position, item)| LogItem::from_raw(item, date, position))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DayReport { date, items })
}

fn normalize_label(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn coerce_duration(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|hours| hours.fract() == 0.0)
                .map(|hours| hours as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
