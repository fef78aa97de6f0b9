//! Deterministic stand-ins used in test mode.
//!
//! The catalog covers every publication-date case the dashboard reports on:
//! upcoming, recent, past due, missing and unreadable.

use async_trait::async_trait;
use time::{Date, Duration};
use tokio::sync::Mutex;

use super::issue_body::{self, ChecklistRow};
use super::{
    ApprovalIssue, ApprovalTracker, CatalogGateway, EmailMessage, GatewayError, NewIssue,
    ReportMailer,
};
use crate::domain::{
    dates::{format_date, parse_date},
    Money, PlatformTitle, SalesPeriod, SalesRecord, TitleId,
};

enum FixtureDate {
    DaysFromAnchor(i64),
    Raw(&'static str),
    Missing,
}

struct FixtureTitle {
    id: &'static str,
    title: &'static str,
    date: FixtureDate,
    genre: &'static str,
    quantity: u64,
    unit_price_cents: i64,
}

static TITLES: [FixtureTitle; 5] = [
    FixtureTitle {
        id: "9781234567890",
        title: "Future Release Book",
        date: FixtureDate::DaysFromAnchor(30),
        genre: "Fiction",
        quantity: 5,
        unit_price_cents: 2499,
    },
    FixtureTitle {
        id: "9781234567891",
        title: "Recent Release Book",
        date: FixtureDate::DaysFromAnchor(-3),
        genre: "Non-fiction",
        quantity: 3,
        unit_price_cents: 1850,
    },
    FixtureTitle {
        id: "9781234567892",
        title: "Past Due Book",
        date: FixtureDate::DaysFromAnchor(-60),
        genre: "Science Fiction",
        quantity: 8,
        unit_price_cents: 2995,
    },
    FixtureTitle {
        id: "9781234567893",
        title: "Missing Date Book",
        date: FixtureDate::Missing,
        genre: "Mystery",
        quantity: 2,
        unit_price_cents: 1500,
    },
    FixtureTitle {
        id: "9781234567894",
        title: "Malformed Date Book",
        date: FixtureDate::Raw("Coming Soon"),
        genre: "Poetry",
        quantity: 4,
        unit_price_cents: 1299,
    },
];

fn pub_date(title: &FixtureTitle, anchor: Date) -> Option<String> {
    match title.date {
        FixtureDate::DaysFromAnchor(days) => Some(format_date(anchor + Duration::days(days))),
        FixtureDate::Raw(raw) => Some(raw.to_string()),
        FixtureDate::Missing => None,
    }
}

/// Five synthetic preorder titles dated relative to `anchor`.
pub struct FixtureCatalog {
    anchor: Date,
}

impl FixtureCatalog {
    pub fn new(anchor: Date) -> Self {
        Self { anchor }
    }
}

#[async_trait]
impl CatalogGateway for FixtureCatalog {
    async fn fetch_titles(&self) -> Result<Vec<PlatformTitle>, GatewayError> {
        Ok(TITLES
            .iter()
            .map(|title| PlatformTitle {
                id: TitleId::new(title.id),
                title: title.title.to_string(),
                pub_date: pub_date(title, self.anchor),
                collections: vec!["Preorder".to_string(), title.genre.to_string()],
            })
            .collect())
    }

    async fn fetch_sales(
        &self,
        title_ids: &[TitleId],
        period: SalesPeriod,
    ) -> Result<Vec<SalesRecord>, GatewayError> {
        Ok(TITLES
            .iter()
            .filter(|title| title_ids.iter().any(|id| id.as_str() == title.id))
            .map(|title| SalesRecord {
                title_id: TitleId::new(title.id),
                period,
                quantity: title.quantity,
                revenue: Money::from_cents(title.unit_price_cents) * title.quantity,
            })
            .collect())
    }
}

/// In-memory issue tracker, seeded with one open checklist that approves
/// the recent release.
pub struct FixtureTracker {
    issues: Mutex<Vec<ApprovalIssue>>,
    comments: Mutex<Vec<(u64, String)>>,
}

impl FixtureTracker {
    pub fn empty() -> Self {
        Self {
            issues: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
        }
    }

    pub fn seeded(anchor: Date) -> Self {
        let rows: Vec<ChecklistRow> = TITLES[1..3]
            .iter()
            .map(|title| ChecklistRow {
                id: TitleId::new(title.id),
                title: title.title.to_string(),
                pub_date: pub_date(title, anchor).and_then(|raw| parse_date(&raw)),
                quantity: title.quantity,
            })
            .collect();
        let body = issue_body::render_checklist(&rows).replacen("| [ ] |", "| [x] |", 1);

        let issue = ApprovalIssue {
            number: 123,
            title: issue_body::issue_title(anchor - Duration::days(7)),
            body,
            url: "https://github.com/example/repo/issues/123".to_string(),
            state: "open".to_string(),
            created_at: None,
        };
        Self {
            issues: Mutex::new(vec![issue]),
            comments: Mutex::new(Vec::new()),
        }
    }

    /// Comments posted so far as `(issue number, body)`.
    pub async fn comments(&self) -> Vec<(u64, String)> {
        self.comments.lock().await.clone()
    }
}

#[async_trait]
impl ApprovalTracker for FixtureTracker {
    async fn list_open_issues(&self) -> Result<Vec<ApprovalIssue>, GatewayError> {
        Ok(self
            .issues
            .lock()
            .await
            .iter()
            .filter(|issue| issue.state == "open")
            .cloned()
            .collect())
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<ApprovalIssue, GatewayError> {
        let mut issues = self.issues.lock().await;
        let number = issues.iter().map(|issue| issue.number).max().unwrap_or(0) + 1;
        let created = ApprovalIssue {
            number,
            title: issue.title.clone(),
            body: issue.body.clone(),
            url: format!("https://github.com/example/repo/issues/{number}"),
            state: "open".to_string(),
            created_at: None,
        };
        issues.push(created.clone());
        Ok(created)
    }

    async fn comment(&self, number: u64, body: &str) -> Result<(), GatewayError> {
        self.comments.lock().await.push((number, body.to_string()));
        Ok(())
    }
}

/// Mailer that keeps every message instead of sending it.
#[derive(Default)]
pub struct FixtureMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl FixtureMailer {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ReportMailer for FixtureMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), GatewayError> {
        tracing::info!(subject = %message.subject, "test mode email recorded");
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[tokio::test]
    async fn catalog_covers_every_date_case() {
        let anchor = date!(2025 - 03 - 10);
        let titles = FixtureCatalog::new(anchor).fetch_titles().await.unwrap();

        let dates: Vec<Option<&str>> = titles.iter().map(|t| t.pub_date.as_deref()).collect();
        assert_eq!(
            dates,
            vec![
                Some("2025-04-09"),
                Some("2025-03-07"),
                Some("2025-01-09"),
                None,
                Some("Coming Soon")
            ]
        );
    }

    #[tokio::test]
    async fn sales_only_cover_requested_titles() {
        let catalog = FixtureCatalog::new(date!(2025 - 03 - 10));
        let period = SalesPeriod::new(date!(2025 - 03 - 02), date!(2025 - 03 - 08));
        let sales = catalog
            .fetch_sales(&[TitleId::new("9781234567892")], period)
            .await
            .unwrap();

        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].quantity, 8);
        assert_eq!(sales[0].revenue, Money::from_cents(23960));
    }

    #[tokio::test]
    async fn seeded_issue_ticks_the_recent_release() {
        let tracker = FixtureTracker::seeded(date!(2025 - 03 - 10));
        let issues = tracker.list_open_issues().await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].checked_ids(), vec![TitleId::new("9781234567891")]);
    }

    #[tokio::test]
    async fn created_issues_get_the_next_number() {
        let tracker = FixtureTracker::seeded(date!(2025 - 03 - 10));
        let created = tracker
            .create_issue(&NewIssue {
                title: "t".into(),
                body: "b".into(),
                labels: vec![],
            })
            .await
            .unwrap();
        assert_eq!(created.number, 124);
        assert_eq!(tracker.list_open_issues().await.unwrap().len(), 2);
    }
}
