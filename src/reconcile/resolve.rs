use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use super::error::ReconcileError;
use crate::domain::{dates::parse_date, TitleRecord};

/// The publication date every report uses: the override when one exists,
/// otherwise the platform date.
pub fn resolve_publication_date(title: &TitleRecord) -> Result<Date, ReconcileError> {
    if let Some(date_override) = &title.date_override {
        return Ok(date_override.date);
    }

    match title.platform_pub_date.as_deref().map(str::trim) {
        None | Some("") => Err(ReconcileError::MissingDate {
            id: title.id.clone(),
        }),
        Some(raw) => parse_date(raw).ok_or_else(|| ReconcileError::MalformedDate {
            id: title.id.clone(),
            raw: raw.to_string(),
        }),
    }
}

/// Where a title's effective publication date sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStatus {
    Upcoming,
    /// Published within the recent-release window.
    Recent,
    PastDue,
    Missing,
    Malformed,
}

impl DateStatus {
    pub fn classify(title: &TitleRecord, today: Date, recent_window_days: u32) -> Self {
        match resolve_publication_date(title) {
            Ok(date) if date > today => DateStatus::Upcoming,
            Ok(date) if date >= today - Duration::days(i64::from(recent_window_days)) => {
                DateStatus::Recent
            }
            Ok(_) => DateStatus::PastDue,
            Err(ReconcileError::MalformedDate { .. }) => DateStatus::Malformed,
            Err(_) => DateStatus::Missing,
        }
    }
}
