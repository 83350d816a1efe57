use chrono::NaiveDate;
use std::fmt::Write;

use crate::helpers::aggregate::Aggregate;
use crate::helpers::validator::{ValidationPolicy, ValidationVerdict};
use crate::models::calendar::MonthKey;

/// Text sent along with the workbook. Lists every warning so flagged days can be followed up.
pub fn report_summary(
    verdict: &ValidationVerdict,
    aggregate: &Aggregate,
    policy: &ValidationPolicy,
) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Monthly report for {}: {}h over {} day(s), status {}",
        verdict.month(),
        aggregate.month_total_hours,
        aggregate.per_day.len(),
        verdict.status.as_str()
    );

    if !verdict.failures.is_empty() {
        let _ = writeln!(output, "\nFailed:");
        for failure in &verdict.failures {
            let _ = writeln!(output, "- {failure}");
        }
    }

    if !verdict.warnings.is_empty() {
        let _ = writeln!(output, "\nWarnings:");
        for warning in &verdict.warnings {
            let _ = writeln!(
                output,
                "- {} {}: {}",
                warning.date,
                warning.code.as_str(),
                warning.detail
            );
        }
    }

    if !verdict.missing_days.is_empty() {
        let _ = writeln!(
            output,
            "\nMissing days: {}",
            join_dates(&verdict.missing_days)
        );
    }

    let to_fill = verdict.days_to_fill(policy);
    if !to_fill.is_empty() {
        let _ = writeln!(output, "\nDays to fill for {}:", verdict.month());
        for date in to_fill {
            let _ = writeln!(output, "{date}");
        }
    }

    output.trim_end().to_string()
}

pub fn failure_notice(month: MonthKey, reason: &str) -> String {
    format!("ERROR: report generation for {month} failed\n\n{reason}")
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|date| date.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
