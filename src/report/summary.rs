use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::domain::{ApprovalStatus, Money, SalesPeriod, TitleId};
use crate::reconcile::{resolve_publication_date, DateStatus, TitleStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateCounts {
    pub upcoming: usize,
    pub recent: usize,
    pub past_due: usize,
    pub missing: usize,
    pub malformed: usize,
}

/// A title waiting for someone to approve its release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyTitle {
    pub id: TitleId,
    pub title: String,
    #[serde(with = "crate::domain::dates::iso_date")]
    pub effective_date: Date,
    pub quantity: u64,
}

/// Headline numbers for the dashboard landing view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    #[serde(with = "crate::domain::dates::iso_date")]
    pub as_of: Date,
    pub active_titles: usize,
    pub inactive_titles: usize,
    pub approvals: StatusCounts,
    pub dates: DateCounts,
    pub overrides: usize,
    pub ready_for_release: Vec<ReadyTitle>,
    pub total_quantity: u64,
    pub total_revenue: Money,
    pub sales_period: Option<SalesPeriod>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_refresh: Option<OffsetDateTime>,
}

/// Counts cover active titles only; inactive ones are tallied separately.
pub fn build_summary(store: &TitleStore, today: Date, recent_window_days: u32) -> DashboardSummary {
    let totals = store.sales_totals();
    let mut summary = DashboardSummary {
        as_of: today,
        active_titles: 0,
        inactive_titles: 0,
        approvals: StatusCounts::default(),
        dates: DateCounts::default(),
        overrides: 0,
        ready_for_release: Vec::new(),
        total_quantity: totals.values().map(|t| t.quantity).sum(),
        total_revenue: totals.values().map(|t| t.revenue).sum(),
        sales_period: store.sales().first().map(|record| record.period),
        last_refresh: store.last_refresh(),
    };

    for title in store.titles() {
        if !title.active {
            summary.inactive_titles += 1;
            continue;
        }
        summary.active_titles += 1;
        if title.has_override() {
            summary.overrides += 1;
        }

        match title.status {
            ApprovalStatus::Pending => summary.approvals.pending += 1,
            ApprovalStatus::Approved => summary.approvals.approved += 1,
            ApprovalStatus::Rejected => summary.approvals.rejected += 1,
        }

        match DateStatus::classify(title, today, recent_window_days) {
            DateStatus::Upcoming => summary.dates.upcoming += 1,
            DateStatus::Recent => summary.dates.recent += 1,
            DateStatus::PastDue => summary.dates.past_due += 1,
            DateStatus::Missing => summary.dates.missing += 1,
            DateStatus::Malformed => summary.dates.malformed += 1,
        }
    }

    summary.ready_for_release = store
        .ready_for_release(today)
        .into_iter()
        .filter_map(|title| {
            let effective_date = resolve_publication_date(title).ok()?;
            Some(ReadyTitle {
                id: title.id.clone(),
                title: title.title.clone(),
                effective_date,
                quantity: totals.get(&title.id).map_or(0, |t| t.quantity),
            })
        })
        .collect();

    summary
}
