//! Plain-text email bodies for the summary and weekly reports.

use std::fmt::Write as _;

use crate::domain::dates::format_date;
use crate::gateway::{Attachment, EmailMessage};

use super::summary::DashboardSummary;
use super::weekly::WeeklyReport;

fn csv_attachment(filename: &str, content: String) -> Attachment {
    Attachment {
        filename: filename.to_string(),
        content_type: "text/csv".to_string(),
        content: content.into_bytes(),
    }
}

/// Summary email with the full titles export attached.
pub fn summary_email(summary: &DashboardSummary, titles_csv: String) -> EmailMessage {
    let mut body = String::new();
    let _ = writeln!(body, "Preorder dashboard summary for {}", format_date(summary.as_of));
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Active titles: {} ({} inactive)",
        summary.active_titles, summary.inactive_titles
    );
    let _ = writeln!(
        body,
        "Approvals: {} pending, {} approved, {} rejected",
        summary.approvals.pending, summary.approvals.approved, summary.approvals.rejected
    );
    let _ = writeln!(
        body,
        "Publication dates: {} upcoming, {} recent, {} past due, {} missing, {} unreadable",
        summary.dates.upcoming,
        summary.dates.recent,
        summary.dates.past_due,
        summary.dates.missing,
        summary.dates.malformed
    );
    let _ = writeln!(body, "Date overrides: {}", summary.overrides);
    let _ = writeln!(
        body,
        "Sales: {} units, {} revenue",
        summary.total_quantity, summary.total_revenue
    );

    if !summary.ready_for_release.is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "Ready for release:");
        for title in &summary.ready_for_release {
            let _ = writeln!(
                body,
                "  {} {} ({}, {} ordered)",
                title.id,
                title.title,
                format_date(title.effective_date),
                title.quantity
            );
        }
    }

    EmailMessage {
        subject: format!("Preorder summary {}", format_date(summary.as_of)),
        body,
        attachments: vec![csv_attachment("preorder_titles.csv", titles_csv)],
    }
}

pub fn weekly_email(report: &WeeklyReport, report_csv: String) -> EmailMessage {
    let mut body = String::new();
    let _ = writeln!(body, "{}", report.heading());
    let _ = writeln!(body);
    for row in &report.rows {
        let _ = writeln!(body, "  {} {}: {} units, {}", row.id, row.title, row.quantity, row.revenue);
    }
    if report.rows.is_empty() {
        let _ = writeln!(body, "  No preorder sales in this period.");
    }
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Total: {} units, {} revenue across {} titles",
        report.total_quantity, report.total_revenue, report.unique_titles
    );

    EmailMessage {
        subject: report.heading(),
        body,
        attachments: vec![csv_attachment(
            &format!("weekly_sales_{}.csv", format_date(report.period.start)),
            report_csv,
        )],
    }
}
