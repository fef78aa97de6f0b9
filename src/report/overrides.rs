//! Overrides CSV: the file format operators use to bulk-correct
//! publication dates.

use std::io::Read;

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;

use crate::domain::dates::{format_date, parse_date};
use crate::domain::TitleId;
use crate::reconcile::{OverrideEntry, TitleStore};

use super::{finish, ReportError};

pub const OVERRIDES_CSV_HEADER: [&str; 4] = ["ISBN", "Corrected_Pub_Date", "Notes", "Updated_At"];

#[derive(Debug, Deserialize)]
struct OverrideRow {
    #[serde(rename = "ISBN")]
    isbn: String,
    #[serde(rename = "Corrected_Pub_Date")]
    corrected_pub_date: String,
    #[serde(rename = "Notes", default)]
    notes: Option<String>,
}

/// Every override currently held, ordered by ISBN.
pub fn overrides_csv(store: &TitleStore) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(OVERRIDES_CSV_HEADER)?;

    for title in store.titles() {
        let Some(date_override) = &title.date_override else {
            continue;
        };
        let updated_at = date_override
            .set_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| date_override.set_at.to_string());

        writer.write_record([
            title.id.as_str(),
            format_date(date_override.date).as_str(),
            date_override.note.as_deref().unwrap_or(""),
            updated_at.as_str(),
        ])?;
    }

    finish(writer)
}

/// Parse an overrides file. `Updated_At` and unknown columns are ignored;
/// a row with a blank ISBN or an unreadable date fails the whole read.
pub fn read_overrides_csv<R: Read>(input: R) -> Result<Vec<OverrideEntry>, ReportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut entries = Vec::new();
    for result in reader.deserialize::<OverrideRow>() {
        let row = result?;
        // Header is line 1.
        let line = entries.len() as u64 + 2;

        let id = TitleId::new(row.isbn);
        if id.as_str().is_empty() {
            return Err(ReportError::InvalidRow {
                line,
                message: "ISBN is empty".to_string(),
            });
        }
        let date = parse_date(&row.corrected_pub_date).ok_or_else(|| ReportError::InvalidRow {
            line,
            message: format!(
                "'{}' is not a YYYY-MM-DD date",
                row.corrected_pub_date
            ),
        })?;

        entries.push(OverrideEntry {
            id,
            date,
            note: row.notes.filter(|note| !note.is_empty()),
        });
    }
    Ok(entries)
}
