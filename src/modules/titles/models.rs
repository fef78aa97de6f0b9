use preorder_http::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Date;

use crate::dashboard::{DateFilter, SortKey, TitleQuery};
use crate::domain::{dates::parse_date, ApprovalStatus, TitleId};

/// Raw list query; words are validated here so bad input gets the standard
/// error body.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub date: Option<String>,
    pub sort: Option<String>,
    pub include_inactive: Option<bool>,
}

impl ListParams {
    pub fn into_query(self) -> Result<TitleQuery, AppError> {
        let date = match self.date.as_deref() {
            Some(raw) => raw
                .parse::<DateFilter>()
                .map_err(|msg| invalid_field("date", msg))?,
            None => DateFilter::default(),
        };
        let sort = match self.sort.as_deref() {
            Some(raw) => raw
                .parse::<SortKey>()
                .map_err(|msg| invalid_field("sort", msg))?,
            None => SortKey::default(),
        };

        Ok(TitleQuery {
            search: self.search,
            date,
            sort,
            include_inactive: self.include_inactive.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub date: String,
    #[serde(default)]
    pub note: Option<String>,
    pub actor: String,
}

impl OverrideRequest {
    pub fn parsed_date(&self) -> Result<Date, AppError> {
        parse_date(&self.date).ok_or_else(|| {
            invalid_field(
                "date",
                format!("'{}' is not a YYYY-MM-DD date", self.date.trim()),
            )
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub status: String,
    pub actor: String,
}

impl ApprovalRequest {
    pub fn parsed_status(&self) -> Result<ApprovalStatus, AppError> {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(invalid_field(
                "status",
                format!("unknown status '{other}'; expected approved or rejected"),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublicationDate {
    pub id: TitleId,
    #[serde(with = "crate::domain::dates::iso_date")]
    pub publication_date: Date,
}

pub(super) fn invalid_field(field: &str, message: String) -> AppError {
    AppError::validation(vec![json!({ "field": field, "message": &message })], message)
}
