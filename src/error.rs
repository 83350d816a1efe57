use chrono::NaiveDate;
use thiserror::Error;

use crate::models::calendar::MonthKey;

/// Raised when a (year, month) pair cannot describe a reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month {year}-{month}: month must be 1..=12 and year {min}..={max}", min = MonthKey::MIN_YEAR, max = MonthKey::MAX_YEAR)]
pub struct InvalidMonthError {
    pub year: i32,
    pub month: u32,
}

/// Structural problems found while turning raw JSON into a `MonthReport`.
/// All of these abort before validation runs.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    InvalidMonth(#[from] InvalidMonthError),

    #[error("malformed date '{0}': expected YYYY-MM-DD")]
    MalformedDate(String),

    #[error("date {date} is outside of {month}")]
    DateOutsideMonth { date: NaiveDate, month: MonthKey },

    #[error("date {0} appears more than once")]
    DuplicateDate(NaiveDate),

    #[error("unknown item type '{0}': expected 'task' or 'meeting'")]
    UnknownItemType(String),

    #[error("missing field '{field}' in {context}")]
    MissingField { field: &'static str, context: String },

    #[error("invalid item on {date}: {reason}")]
    InvalidItem { date: NaiveDate, reason: String },

    #[error("report is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("report is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("refusing to render {month}: validation failed with {warnings} warning(s) and {missing} missing day(s)")]
    FailedVerdict {
        month: MonthKey,
        warnings: usize,
        missing: usize,
    },

    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no recipient configured")]
    NoRecipient,

    #[error("email delivery failed: {0}")]
    Email(#[from] resend_rs::Error),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM reply contains no JSON object")]
    NoJson,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_month_message_names_the_input() {
        let err = InvalidMonthError {
            year: 2025,
            month: 13,
        };
        let message = err.to_string();
        assert!(message.contains("2025-13"));
        assert!(message.contains("1970..=2999"));
    }

    #[test]
    fn malformed_date_names_offending_value() {
        let err = ParseError::MalformedDate("2025/06/01".to_string());
        assert_eq!(
            err.to_string(),
            "malformed date '2025/06/01': expected YYYY-MM-DD"
        );
    }

    #[test]
    fn unknown_item_type_names_offending_value() {
        let err = ParseError::UnknownItemType("call".to_string());
        assert!(err.to_string().contains("'call'"));
    }
}
