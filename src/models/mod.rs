pub mod calendar;
pub mod raw;
pub mod report;
