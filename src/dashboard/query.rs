//! Listing, filtering and sorting of titles for display.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::domain::{ApprovalStatus, DateOverride, Money, TitleId, TitleRecord};
use crate::reconcile::{resolve_publication_date, DateStatus, SalesTotals};

/// Which publication dates to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFilter {
    #[default]
    All,
    /// Effective date after today.
    Future,
    /// Effective date on or before today.
    Past,
    /// Effective date within the next thirty days, today included.
    Next30,
    Missing,
    Malformed,
}

impl FromStr for DateFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DateFilter::All),
            "future" => Ok(DateFilter::Future),
            "past" => Ok(DateFilter::Past),
            "next30" | "next_30" => Ok(DateFilter::Next30),
            "missing" => Ok(DateFilter::Missing),
            "malformed" => Ok(DateFilter::Malformed),
            other => Err(format!(
                "unknown date filter '{other}'; expected all, future, past, next30, missing or malformed"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Title,
    PubDate,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(SortKey::Title),
            "pub_date" | "date" => Ok(SortKey::PubDate),
            other => Err(format!("unknown sort '{other}'; expected title or pub_date")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TitleQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub date: DateFilter,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub include_inactive: bool,
}

/// A title as shown to users: the stored record plus its resolved date and
/// sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleView {
    pub id: TitleId,
    pub title: String,
    pub platform_pub_date: Option<String>,
    #[serde(rename = "override")]
    pub date_override: Option<DateOverride>,
    #[serde(with = "crate::domain::dates::iso_date_opt")]
    pub effective_date: Option<Date>,
    pub date_status: DateStatus,
    /// Why the effective date could not be resolved.
    pub date_problem: Option<String>,
    pub status: ApprovalStatus,
    pub active: bool,
    pub quantity: u64,
    pub revenue: Money,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

impl TitleView {
    pub fn new(
        record: &TitleRecord,
        totals: Option<&SalesTotals>,
        today: Date,
        recent_window_days: u32,
    ) -> Self {
        let resolved = resolve_publication_date(record);
        let totals = totals.copied().unwrap_or_default();
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            platform_pub_date: record.platform_pub_date.clone(),
            date_override: record.date_override.clone(),
            effective_date: resolved.as_ref().ok().copied(),
            date_status: DateStatus::classify(record, today, recent_window_days),
            date_problem: resolved.err().map(|err| err.to_string()),
            status: record.status,
            active: record.active,
            quantity: totals.quantity,
            revenue: totals.revenue,
            last_modified: record.last_modified,
        }
    }

    fn matches(&self, query: &TitleQuery, today: Date) -> bool {
        if !query.include_inactive && !self.active {
            return false;
        }

        if let Some(needle) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            if !self.title.to_lowercase().contains(&needle) && !self.id.as_str().contains(&needle) {
                return false;
            }
        }

        match query.date {
            DateFilter::All => true,
            DateFilter::Future => self.effective_date.is_some_and(|date| date > today),
            DateFilter::Past => self.effective_date.is_some_and(|date| date <= today),
            DateFilter::Next30 => self
                .effective_date
                .is_some_and(|date| date >= today && date <= today + Duration::days(30)),
            DateFilter::Missing => self.date_status == DateStatus::Missing,
            DateFilter::Malformed => self.date_status == DateStatus::Malformed,
        }
    }
}

/// Rank for date sorting: real dates first, then malformed, then missing.
fn date_rank(view: &TitleView) -> (u8, Option<Date>) {
    match (view.effective_date, view.date_status) {
        (Some(date), _) => (0, Some(date)),
        (None, DateStatus::Malformed) => (1, None),
        (None, _) => (2, None),
    }
}

fn compare(a: &TitleView, b: &TitleView, sort: SortKey) -> Ordering {
    let by_title = || {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    };
    match sort {
        SortKey::Title => by_title(),
        SortKey::PubDate => date_rank(a).cmp(&date_rank(b)).then_with(by_title),
    }
}

/// Filter and sort `records` for display.
pub fn select_titles<'a>(
    records: impl IntoIterator<Item = &'a TitleRecord>,
    totals: &HashMap<&TitleId, SalesTotals>,
    query: &TitleQuery,
    today: Date,
    recent_window_days: u32,
) -> Vec<TitleView> {
    let mut views: Vec<TitleView> = records
        .into_iter()
        .map(|record| TitleView::new(record, totals.get(&record.id), today, recent_window_days))
        .filter(|view| view.matches(query, today))
        .collect();
    views.sort_by(|a, b| compare(a, b, query.sort));
    views
}
