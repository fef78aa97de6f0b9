//! Read-only renderings of the title store: CSV files, the dashboard
//! summary, the weekly sales report and email bodies.

pub mod csv_export;
pub mod email;
pub mod overrides;
pub mod summary;
pub mod weekly;

use thiserror::Error;

pub use csv_export::{titles_csv, TITLES_CSV_HEADER};
pub use overrides::{overrides_csv, read_overrides_csv, OVERRIDES_CSV_HEADER};
pub use summary::{build_summary, DashboardSummary};
pub use weekly::{build_weekly_report, WeeklyReport};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

/// Finish a CSV writer into UTF-8 text.
pub(crate) fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ReportError> {
    let bytes = writer
        .into_inner()
        .map_err(|err| ReportError::Io(err.into_error()))?;
    String::from_utf8(bytes).map_err(|err| ReportError::InvalidRow {
        line: 0,
        message: err.to_string(),
    })
}
