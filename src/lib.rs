//! Worklog Report Library
//!
//! This library turns a month of work chat messages into a validated,
//! aggregated `.xlsx` worklog report and delivers it by e-mail.

pub mod config;
pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use service::{ReportConfig, ReportService};

// Re-export key types for convenience
pub use helpers::aggregate::{aggregate, Aggregate};
pub use helpers::validator::{validate, ValidationPolicy, ValidationVerdict, VerdictStatus};
pub use helpers::xlsx::ReportRenderer;
pub use models::calendar::MonthKey;
pub use models::report::{parse_raw_report, DayReport, ItemKind, LogItem, MonthReport};
