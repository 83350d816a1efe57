use chrono::{NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::models::calendar::{falls_on, MonthKey, WORK_WEEK};
use crate::models::report::{DayReport, ItemKind, LogItem, MonthReport};

// A "<project>: " token at the start of the label or after a separator.
static PROJECT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s,;/&+])([\p{L}\p{N}][\p{L}\p{N}_.\-]*):\s").unwrap()
});

const CONJUNCTIONS: &[&str] = &["and", "also", "plus", "и", "а также", "плюс", "также"];

/// Operational rules a month report is checked against.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub min_daily_hours: u32,
    pub max_daily_hours: u32,
    pub daily_label: String,
    pub daily_duration: u32,
    pub working_weekdays: Vec<Weekday>,
    /// Holidays and partial days: no daily anchor and no workload bounds.
    pub exempt_days: BTreeSet<NaiveDate>,
    /// More missing days than this fails the verdict. `None` never fails on coverage.
    pub max_missing_days: Option<usize>,
    pub fatal_codes: BTreeSet<WarningCode>,
    /// Opt-in: move an existing "daily" to the front or insert one when absent.
    pub repair_missing_daily: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_daily_hours: 7,
            max_daily_hours: 10,
            daily_label: "daily".to_string(),
            daily_duration: 1,
            working_weekdays: WORK_WEEK.to_vec(),
            exempt_days: BTreeSet::new(),
            max_missing_days: None,
            fatal_codes: BTreeSet::new(),
            repair_missing_daily: false,
        }
    }
}

impl ValidationPolicy {
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        falls_on(date, &self.working_weekdays) && !self.exempt_days.contains(&date)
    }

    fn is_daily_anchor(&self, item: &LogItem) -> bool {
        item.kind == ItemKind::Meeting
            && item.label == self.daily_label
            && item.duration_hours == self.daily_duration
    }

    fn is_daily(&self, item: &LogItem) -> bool {
        item.kind == ItemKind::Meeting && item.label == self.daily_label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    DateOutsideMonth,
    DuplicateDate,
    MultiProjectTask,
    MissingDaily,
    TotalOutOfRange,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::DateOutsideMonth => "DATE_OUTSIDE_MONTH",
            WarningCode::DuplicateDate => "DUPLICATE_DATE",
            WarningCode::MultiProjectTask => "MULTI_PROJECT_TASK",
            WarningCode::MissingDaily => "MISSING_DAILY",
            WarningCode::TotalOutOfRange => "TOTAL_OUT_OF_RANGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    pub date: NaiveDate,
    pub code: WarningCode,
    pub detail: String,
    /// Position of the offending item within its day, when the warning is about one item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<usize>,
}

impl WarningRecord {
    fn day(date: NaiveDate, code: WarningCode, detail: impl Into<String>) -> Self {
        Self {
            date,
            code,
            detail: detail.into(),
            item: None,
        }
    }

    fn item(date: NaiveDate, position: usize, code: WarningCode, detail: impl Into<String>) -> Self {
        Self {
            date,
            code,
            detail: detail.into(),
            item: Some(position),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Ok,
    OkWithWarnings,
    Failed,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Ok => "OK",
            VerdictStatus::OkWithWarnings => "OK_WITH_WARNINGS",
            VerdictStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub status: VerdictStatus,
    pub normalized_report: MonthReport,
    pub warnings: Vec<WarningRecord>,
    pub missing_days: Vec<NaiveDate>,
    /// Why the verdict escalated to `Failed`; empty otherwise.
    pub failures: Vec<String>,
}

impl ValidationVerdict {
    pub fn month(&self) -> MonthKey {
        self.normalized_report.month
    }

    pub fn is_renderable(&self) -> bool {
        self.status != VerdictStatus::Failed
    }

    /// Working days with nothing logged: listed as not mentioned, or missing altogether.
    pub fn days_to_fill(&self, policy: &ValidationPolicy) -> Vec<NaiveDate> {
        self.normalized_report
            .unmentioned_days
            .iter()
            .chain(self.missing_days.iter())
            .copied()
            .filter(|date| policy.is_working_day(*date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Checks `report` against the calendar and `policy`. The input is never
/// modified; the verdict carries a normalized copy.
pub fn validate(report: &MonthReport, policy: &ValidationPolicy) -> ValidationVerdict {
    let month = report.month;
    let mut normalized = MonthReport::new(month);
    let mut warnings = Vec::new();
    let mut missing_days = Vec::new();

    for date in report.covered_dates() {
        if !month.contains(date) {
            warnings.push(WarningRecord::day(
                date,
                WarningCode::DateOutsideMonth,
                format!("{} is not part of {}; dropped", date, month),
            ));
        }
    }

    for date in month.days() {
        let unmentioned = report.unmentioned_days.contains(&date);

        match report.days.get(&date) {
            Some(day) => {
                if unmentioned {
                    warnings.push(WarningRecord::day(
                        date,
                        WarningCode::DuplicateDate,
                        "listed with entries and as not mentioned; entries kept",
                    ));
                }
                let day = check_day(day, policy, &mut warnings);
                normalized.days.insert(date, day);
            }
            None if unmentioned => {
                normalized.unmentioned_days.insert(date);
            }
            None => missing_days.push(date),
        }
    }

    // Checks run per date in listed order already; out-of-month dates still need
    // to land at their place on the timeline.
    warnings.sort_by_key(|warning| warning.date);

    let mut failures = Vec::new();
    if let Some(max) = policy.max_missing_days {
        if missing_days.len() > max {
            failures.push(format!(
                "{} day(s) missing, at most {} allowed",
                missing_days.len(),
                max
            ));
        }
    }
    for warning in &warnings {
        if policy.fatal_codes.contains(&warning.code) {
            failures.push(format!(
                "{} on {}: {}",
                warning.code.as_str(),
                warning.date,
                warning.detail
            ));
        }
    }

    let status = if !failures.is_empty() {
        VerdictStatus::Failed
    } else if warnings.is_empty() && missing_days.is_empty() {
        VerdictStatus::Ok
    } else {
        VerdictStatus::OkWithWarnings
    };

    match status {
        VerdictStatus::Failed => warn!(
            "Validation of {} failed: {}",
            month,
            failures.join("; ")
        ),
        _ => info!(
            "Validated {}: {}, {} warning(s), {} missing day(s)",
            month,
            status.as_str(),
            warnings.len(),
            missing_days.len()
        ),
    }

    ValidationVerdict {
        status,
        normalized_report: normalized,
        warnings,
        missing_days,
        failures,
    }
}

fn check_day(
    day: &DayReport,
    policy: &ValidationPolicy,
    warnings: &mut Vec<WarningRecord>,
) -> DayReport {
    let date = day.date;
    let mut items = day.items.clone();

    for (position, item) in items.iter().enumerate() {
        if let Some(detail) = multi_project_detail(&item.label) {
            warnings.push(WarningRecord::item(
                date,
                position,
                WarningCode::MultiProjectTask,
                detail,
            ));
        }
    }

    let anchor_problem = match items.first() {
        Some(first) if policy.is_working_day(date) && !policy.is_daily_anchor(first) => {
            if policy.is_daily(first) {
                Some((
                    true,
                    format!(
                        "'{}' lasts {}h, expected {}h",
                        first.label, first.duration_hours, policy.daily_duration
                    ),
                ))
            } else {
                Some((
                    false,
                    format!(
                        "day starts with {} '{}' instead of meeting '{}'",
                        first.kind.as_str(),
                        first.label,
                        policy.daily_label
                    ),
                ))
            }
        }
        _ => None,
    };

    if let Some((starts_with_daily, mut detail)) = anchor_problem {
        if policy.repair_missing_daily && !starts_with_daily {
            match items.iter().position(|item| policy.is_daily(item)) {
                Some(position) => {
                    let daily = items.remove(position);
                    items.insert(0, daily);
                    detail.push_str("; moved to front");
                }
                None => {
                    items.insert(
                        0,
                        LogItem::new(&policy.daily_label, policy.daily_duration, ItemKind::Meeting),
                    );
                    detail.push_str("; inserted");
                }
            }
        }

        warnings.push(WarningRecord::item(
            date,
            0,
            WarningCode::MissingDaily,
            detail,
        ));
    }

    let checked = DayReport::new(date, items);

    if !checked.items.is_empty() && !policy.exempt_days.contains(&date) {
        let total = checked.total_hours();
        if !(policy.min_daily_hours..=policy.max_daily_hours).contains(&total) {
            warnings.push(WarningRecord::day(
                date,
                WarningCode::TotalOutOfRange,
                total.to_string(),
            ));
        }
    }

    checked
}

/// Describes how a label joining several projects should have been split,
/// or `None` when it names at most one project.
fn multi_project_detail(label: &str) -> Option<String> {
    let starts: Vec<usize> = PROJECT_PREFIX_RE
        .captures_iter(label)
        .filter_map(|caps| caps.get(1).map(|m| m.start()))
        .collect();

    if starts.len() < 2 {
        return None;
    }

    let mut bounds = vec![0];
    bounds.extend(starts.iter().skip(1).copied());
    bounds.push(label.len());

    let segments: Vec<&str> = bounds
        .windows(2)
        .map(|pair| trim_segment(&label[pair[0]..pair[1]]))
        .filter(|segment| !segment.is_empty())
        .collect();

    let (first, rest) = segments.split_first()?;
    let rest: Vec<String> = rest.iter().map(|segment| format!("'{segment}'")).collect();

    Some(format!("keep '{}', split out {}", first, rest.join(", ")))
}

fn trim_segment(segment: &str) -> &str {
    let is_separator = |c: char| c.is_whitespace() || ",;/&+".contains(c);
    let trimmed = segment.trim().trim_end_matches(is_separator);

    for word in CONJUNCTIONS {
        if let Some(stripped) = trimmed.strip_suffix(word) {
            if stripped.is_empty() || stripped.ends_with(is_separator) {
                return stripped.trim_end_matches(is_separator);
            }
        }
    }

    trimmed
}
