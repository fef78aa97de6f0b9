//! Adapters for the services the dashboard reads from and writes to.
//!
//! Each external concern sits behind a trait so the dashboard can swap live
//! HTTP clients for deterministic fixtures at runtime.

pub mod email;
pub mod fixture;
pub mod github;
pub mod issue_body;
pub mod shopify;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use preorder_kernel::Settings;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::{PlatformTitle, SalesPeriod, SalesRecord, TitleId};

pub use email::SendGridMailer;
pub use fixture::{FixtureCatalog, FixtureMailer, FixtureTracker};
pub use github::GithubTracker;
pub use shopify::ShopifyCatalog;

/// Failure talking to an upstream service. Never fatal to local state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{service} is unreachable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} did not answer within {timeout_ms} ms")]
    Timeout {
        service: &'static str,
        timeout_ms: u64,
    },

    #[error("{service} rejected the request ({status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unexpected response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} is not configured: {missing}")]
    NotConfigured {
        service: &'static str,
        missing: &'static str,
    },
}

impl GatewayError {
    pub(crate) fn from_reqwest(service: &'static str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return GatewayError::Timeout {
                service,
                timeout_ms: timeout.as_millis() as u64,
            };
        }
        if err.is_decode() {
            return GatewayError::Decode {
                service,
                message: err.to_string(),
            };
        }
        GatewayError::Unavailable {
            service,
            message: err.to_string(),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            GatewayError::Unavailable { service, .. }
            | GatewayError::Timeout { service, .. }
            | GatewayError::Rejected { service, .. }
            | GatewayError::Decode { service, .. }
            | GatewayError::NotConfigured { service, .. } => service,
        }
    }
}

/// Titles and sales from the commerce platform.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Every title currently in the preorder collection.
    async fn fetch_titles(&self) -> Result<Vec<PlatformTitle>, GatewayError>;

    /// Sales of `title_ids` over `period`, one record per title that sold.
    async fn fetch_sales(
        &self,
        title_ids: &[TitleId],
        period: SalesPeriod,
    ) -> Result<Vec<SalesRecord>, GatewayError>;
}

/// An approval checklist issue on the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub url: String,
    pub state: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl ApprovalIssue {
    /// Ids whose checkbox is ticked in the issue body.
    pub fn checked_ids(&self) -> Vec<TitleId> {
        issue_body::checked_ids(&self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// The issue tracker holding approval checklists.
#[async_trait]
pub trait ApprovalTracker: Send + Sync {
    /// Open issues carrying the approval label. Pull requests are excluded.
    async fn list_open_issues(&self) -> Result<Vec<ApprovalIssue>, GatewayError>;

    async fn create_issue(&self, issue: &NewIssue) -> Result<ApprovalIssue, GatewayError>;

    async fn comment(&self, number: u64, body: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Outbound report email.
#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), GatewayError>;
}

/// One complete set of upstream adapters.
#[derive(Clone)]
pub struct Backends {
    pub catalog: Arc<dyn CatalogGateway>,
    pub tracker: Arc<dyn ApprovalTracker>,
    pub mailer: Arc<dyn ReportMailer>,
}

impl Backends {
    /// Live clients built from settings. The catalog is mandatory; the
    /// tracker and mailer fall back to adapters that report
    /// `NotConfigured` when their credentials are missing.
    pub fn live(settings: &Settings) -> Result<Self, GatewayError> {
        let catalog: Arc<dyn CatalogGateway> =
            Arc::new(ShopifyCatalog::new(&settings.shopify, &settings.gateway)?);

        let tracker: Arc<dyn ApprovalTracker> = if settings.github.is_configured() {
            Arc::new(GithubTracker::new(&settings.github, &settings.gateway)?)
        } else {
            Arc::new(Unconfigured {
                service: "github",
                missing: "github.token and github.repository",
            })
        };

        let mailer: Arc<dyn ReportMailer> = if settings.email.is_configured() {
            Arc::new(SendGridMailer::new(&settings.email, &settings.gateway)?)
        } else {
            Arc::new(Unconfigured {
                service: "email",
                missing: "email.api_key, email.sender and email.recipients",
            })
        };

        Ok(Self {
            catalog,
            tracker,
            mailer,
        })
    }

    /// Deterministic fixtures anchored on `anchor`.
    pub fn fixture(anchor: time::Date) -> Self {
        Self {
            catalog: Arc::new(FixtureCatalog::new(anchor)),
            tracker: Arc::new(FixtureTracker::seeded(anchor)),
            mailer: Arc::new(FixtureMailer::default()),
        }
    }
}

/// Stand-in for a live service whose credentials are absent.
struct Unconfigured {
    service: &'static str,
    missing: &'static str,
}

impl Unconfigured {
    fn error(&self) -> GatewayError {
        GatewayError::NotConfigured {
            service: self.service,
            missing: self.missing,
        }
    }
}

#[async_trait]
impl ApprovalTracker for Unconfigured {
    async fn list_open_issues(&self) -> Result<Vec<ApprovalIssue>, GatewayError> {
        Err(self.error())
    }

    async fn create_issue(&self, _issue: &NewIssue) -> Result<ApprovalIssue, GatewayError> {
        Err(self.error())
    }

    async fn comment(&self, _number: u64, _body: &str) -> Result<(), GatewayError> {
        Err(self.error())
    }
}

#[async_trait]
impl ReportMailer for Unconfigured {
    async fn send(&self, _message: &EmailMessage) -> Result<(), GatewayError> {
        Err(self.error())
    }
}

/// Bound an upstream call by `limit`.
pub async fn with_timeout<T, F>(
    service: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(service, timeout_ms = limit.as_millis() as u64, "upstream call timed out");
            Err(GatewayError::Timeout {
                service,
                timeout_ms: limit.as_millis() as u64,
            })
        }
    }
}

pub(crate) fn http_client(
    service: &'static str,
    timeout: Duration,
) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("preorder-admin/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| GatewayError::Unavailable {
            service,
            message: err.to_string(),
        })
}

/// Response body text for an error, capped for logs and messages.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > 512 {
        let mut cut = 512;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_calls_become_timeouts() {
        let result: Result<(), GatewayError> = with_timeout("shopify", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(GatewayError::Timeout {
                service: "shopify",
                timeout_ms: 10
            })
        );
    }

    #[test]
    fn live_backends_need_catalog_credentials() {
        let settings = Settings::default();
        let err = Backends::live(&settings).err().map(|e| e.service());
        assert_eq!(err, Some("shopify"));
    }

    #[tokio::test]
    async fn unconfigured_mailer_reports_missing_credentials() {
        let mut settings = Settings::default();
        settings.shopify.shop_url = Some("example.myshopify.com".into());
        settings.shopify.access_token = Some("token".into());

        let backends = Backends::live(&settings).unwrap();
        let err = backends
            .mailer
            .send(&EmailMessage {
                subject: "s".into(),
                body: "b".into(),
                attachments: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured { service: "email", .. }));
    }
}
