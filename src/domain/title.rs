use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Stable identifier of a preorder title: the ISBN carried as the product
/// variant barcode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(String);

impl TitleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TitleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Review state of a title's preorder release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally entered publication date that supersedes the platform's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOverride {
    #[serde(with = "super::dates::iso_date")]
    pub date: Date,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub set_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub set_at: OffsetDateTime,
}

/// Title fields as reported by the commerce platform, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTitle {
    pub id: TitleId,
    pub title: String,
    /// Raw metafield text; may be absent, blank or not a date at all.
    #[serde(default)]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub collections: Vec<String>,
}

/// The reconciled view of one preorder title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub id: TitleId,
    pub title: String,
    /// Publication date text as last reported by the platform.
    #[serde(default)]
    pub platform_pub_date: Option<String>,
    #[serde(default, rename = "override")]
    pub date_override: Option<DateOverride>,
    #[serde(default)]
    pub status: ApprovalStatus,
    /// False once the platform stops reporting the title.
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

impl TitleRecord {
    /// A freshly synced title: Pending, active, no override.
    pub fn from_platform(fetched: &PlatformTitle, now: OffsetDateTime) -> Self {
        Self {
            id: fetched.id.clone(),
            title: fetched.title.clone(),
            platform_pub_date: fetched.pub_date.clone(),
            date_override: None,
            status: ApprovalStatus::Pending,
            active: true,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn has_override(&self) -> bool {
        self.date_override.is_some()
    }
}
