use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook};
use tracing::{error, info};

use crate::error::RenderError;
use crate::helpers::aggregate::Aggregate;
use crate::helpers::validator::ValidationVerdict;

pub const TAG_DELIMITER: &str = ", ";

const ITEM_HEADERS: [&str; 6] = ["Date", "Task", "Hours", "Description", "Tags", "Type"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn hours(value: u32) -> Self {
        Cell::Number(f64::from(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    Header,
    Body,
    Total,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub style: RowStyle,
    pub cells: Vec<Cell>,
}

impl Row {
    fn header(titles: &[&str]) -> Self {
        Self {
            style: RowStyle::Header,
            cells: titles.iter().map(|title| Cell::text(*title)).collect(),
        }
    }

    fn body(cells: Vec<Cell>) -> Self {
        Self {
            style: RowStyle::Body,
            cells,
        }
    }

    fn total(cells: Vec<Cell>) -> Self {
        Self {
            style: RowStyle::Total,
            cells,
        }
    }

    fn blank() -> Self {
        Self::body(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub column_widths: Vec<u16>,
    pub rows: Vec<Row>,
}

/// Turns a validated month into an `.xlsx` workbook.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    /// Stamped into the document properties so identical input renders identical bytes.
    pub generated_on: NaiveDate,
}

impl ReportRenderer {
    pub fn new(generated_on: NaiveDate) -> Self {
        Self { generated_on }
    }

    pub fn render(
        &self,
        verdict: &ValidationVerdict,
        aggregate: &Aggregate,
    ) -> Result<Vec<u8>, RenderError> {
        if !verdict.is_renderable() {
            error!("Refusing to render {}: verdict is FAILED", verdict.month());
            return Err(RenderError::FailedVerdict {
                month: verdict.month(),
                warnings: verdict.warnings.len(),
                missing: verdict.missing_days.len(),
            });
        }

        let sheets = layout(verdict, aggregate);
        let bytes = self.write_workbook(&sheets)?;

        info!(
            "Rendered workbook for {} with {} sheet(s), size: {} bytes",
            verdict.month(),
            sheets.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn write_workbook(&self, sheets: &[Sheet]) -> Result<Vec<u8>, RenderError> {
        let mut workbook = Workbook::new();

        let created = ExcelDateTime::from_ymd(
            self.generated_on.year() as u16,
            self.generated_on.month() as u8,
            self.generated_on.day() as u8,
        )?;
        workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0xADD8E6)
            .set_border(FormatBorder::Thin);
        let body = Format::new().set_border(FormatBorder::Thin);
        let total = Format::new()
            .set_bold()
            .set_background_color(0xE2EFDA)
            .set_border(FormatBorder::Thin);

        for sheet in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;

            for (col, width) in sheet.column_widths.iter().enumerate() {
                worksheet.set_column_width(col as u16, *width)?;
            }

            for (row, content) in sheet.rows.iter().enumerate() {
                let format = match content.style {
                    RowStyle::Header => &header,
                    RowStyle::Body => &body,
                    RowStyle::Total => &total,
                };

                for (col, cell) in content.cells.iter().enumerate() {
                    match cell {
                        Cell::Text(text) => {
                            worksheet.write_string_with_format(row as u32, col as u16, text, format)?
                        }
                        Cell::Number(number) => {
                            worksheet.write_number_with_format(row as u32, col as u16, *number, format)?
                        }
                    };
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

/// The workbook content, independent of the xlsx encoding.
pub fn layout(verdict: &ValidationVerdict, aggregate: &Aggregate) -> Vec<Sheet> {
    let mut sheets = vec![report_sheet(verdict, aggregate), totals_sheet(aggregate)];

    if !verdict.warnings.is_empty() || !verdict.missing_days.is_empty() {
        sheets.push(warnings_sheet(verdict));
    }

    sheets
}

fn report_sheet(verdict: &ValidationVerdict, aggregate: &Aggregate) -> Sheet {
    let mut rows = vec![Row::header(&ITEM_HEADERS)];

    for (date, day) in &verdict.normalized_report.days {
        for item in &day.items {
            let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
            rows.push(Row::body(vec![
                Cell::text(format_date(*date)),
                Cell::text(item.label.as_str()),
                Cell::hours(item.duration_hours),
                Cell::text(item.description.as_str()),
                Cell::text(tags.join(TAG_DELIMITER)),
                Cell::text(item.kind.as_str()),
            ]));
        }
    }

    rows.push(Row::blank());
    rows.push(Row::header(&["Date", "Hours"]));
    for (date, hours) in &aggregate.per_day {
        rows.push(Row::body(vec![
            Cell::text(format_date(*date)),
            Cell::hours(*hours),
        ]));
    }
    rows.push(Row::total(vec![
        Cell::text("Total"),
        Cell::hours(aggregate.month_total_hours),
    ]));

    Sheet {
        name: "Report".to_string(),
        column_widths: vec![12, 50, 8, 50, 20, 10],
        rows,
    }
}

fn totals_sheet(aggregate: &Aggregate) -> Sheet {
    let mut rows = vec![Row::header(&["Tag", "Hours"])];
    for (tag, hours) in &aggregate.per_tag {
        rows.push(Row::body(vec![Cell::text(tag.as_str()), Cell::hours(*hours)]));
    }

    rows.push(Row::blank());
    rows.push(Row::header(&["Type", "Hours"]));
    for (kind, hours) in &aggregate.per_kind {
        rows.push(Row::body(vec![Cell::text(kind.as_str()), Cell::hours(*hours)]));
    }

    Sheet {
        name: "Totals".to_string(),
        column_widths: vec![20, 8],
        rows,
    }
}

fn warnings_sheet(verdict: &ValidationVerdict) -> Sheet {
    let mut rows = vec![Row::header(&["Date", "Code", "Detail"])];

    for warning in &verdict.warnings {
        rows.push(Row::body(vec![
            Cell::text(format_date(warning.date)),
            Cell::text(warning.code.as_str()),
            Cell::text(warning.detail.as_str()),
        ]));
    }
    for date in &verdict.missing_days {
        rows.push(Row::body(vec![
            Cell::text(format_date(*date)),
            Cell::text("MISSING_DAY"),
            Cell::text("not listed in the report"),
        ]));
    }

    Sheet {
        name: "Warnings".to_string(),
        column_widths: vec![12, 22, 60],
        rows,
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
