//! Summary, CSV exports, the weekly sales report and report emails.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use preorder_http::error::AppError;
use preorder_kernel::{InitCtx, Module};
use serde::Deserialize;
use serde_json::json;

use super::{json_operation, schema_ref};
use crate::dashboard::{Dashboard, EmailReceipt, SummaryView};
use crate::domain::{dates::parse_date, SalesPeriod};
use crate::report::WeeklyReport;

pub struct ReportsModule {
    dashboard: Arc<Dashboard>,
}

impl ReportsModule {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self { dashboard }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PeriodParams {
    start: Option<String>,
    end: Option<String>,
}

impl PeriodParams {
    /// Both bounds or neither; neither means the default week.
    fn period(&self) -> Result<Option<SalesPeriod>, AppError> {
        match (self.start.as_deref(), self.end.as_deref()) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = bound("start", start)?;
                let end = bound("end", end)?;
                if start > end {
                    return Err(invalid("start", "start must not be after end".to_string()));
                }
                Ok(Some(SalesPeriod::new(start, end)))
            }
            (Some(_), None) => Err(invalid("end", "end is required with start".to_string())),
            (None, Some(_)) => Err(invalid("start", "start is required with end".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReportKind {
    Summary,
    Weekly,
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    report: ReportKind,
    #[serde(flatten)]
    period: PeriodParams,
}

#[async_trait]
impl Module for ReportsModule {
    fn name(&self) -> &'static str {
        "reports"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            recipients = ctx.settings.email.recipients.len(),
            "reports module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/summary", get(summary))
            .route("/titles.csv", get(titles_csv))
            .route("/overrides.csv", get(overrides_csv))
            .route("/weekly", get(weekly))
            .route("/email", post(send_email))
            .with_state(self.dashboard.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let csv = |summary: &str| {
            json!({
                "summary": summary,
                "tags": ["Reports"],
                "responses": {
                    "200": {
                        "description": "CSV attachment",
                        "content": { "text/csv": { "schema": { "type": "string" } } }
                    }
                }
            })
        };
        Some(json!({
            "paths": {
                "/summary": {
                    "get": json_operation("Dashboard summary", "Reports", schema_ref("Summary"), &[])
                },
                "/titles.csv": { "get": csv("Titles export") },
                "/overrides.csv": { "get": csv("Publication date overrides export") },
                "/weekly": {
                    "get": json_operation(
                        "Weekly sales report (query: start, end)",
                        "Reports",
                        json!({ "type": "object" }),
                        &[("422", "Invalid period"), ("502", "Catalog unavailable")],
                    )
                },
                "/email": {
                    "post": json_operation(
                        "Email the summary or weekly report",
                        "Reports",
                        json!({ "type": "object" }),
                        &[
                            ("400", "Email not configured"),
                            ("422", "Invalid period"),
                            ("502", "Email service unavailable"),
                        ],
                    )
                }
            },
            "components": {
                "schemas": {
                    "Summary": {
                        "type": "object",
                        "properties": {
                            "as_of": { "type": "string", "format": "date" },
                            "active_titles": { "type": "integer" },
                            "inactive_titles": { "type": "integer" },
                            "approvals": { "type": "object" },
                            "dates": { "type": "object" },
                            "overrides": { "type": "integer" },
                            "total_quantity": { "type": "integer" },
                            "total_revenue": { "type": "string" },
                            "test_mode": { "type": "boolean" },
                            "stale": { "type": "object" }
                        },
                        "required": ["as_of", "active_titles", "test_mode"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "reports module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "reports module stopped");
        Ok(())
    }
}

async fn summary(State(dashboard): State<Arc<Dashboard>>) -> Json<SummaryView> {
    Json(dashboard.summary().await)
}

async fn titles_csv(State(dashboard): State<Arc<Dashboard>>) -> Result<impl IntoResponse, AppError> {
    let body = dashboard.titles_csv().await?;
    Ok(csv_attachment("preorder_titles.csv", body))
}

async fn overrides_csv(
    State(dashboard): State<Arc<Dashboard>>,
) -> Result<impl IntoResponse, AppError> {
    let body = dashboard.overrides_csv().await?;
    Ok(csv_attachment("pub_date_overrides.csv", body))
}

async fn weekly(
    State(dashboard): State<Arc<Dashboard>>,
    Query(params): Query<PeriodParams>,
) -> Result<Json<WeeklyReport>, AppError> {
    let period = params.period()?;
    Ok(Json(dashboard.weekly_report(period).await?))
}

async fn send_email(
    State(dashboard): State<Arc<Dashboard>>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<EmailReceipt>, AppError> {
    let receipt = match request.report {
        ReportKind::Summary => dashboard.email_summary().await?,
        ReportKind::Weekly => dashboard.email_weekly(request.period.period()?).await?,
    };
    Ok(Json(receipt))
}

fn csv_attachment(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

fn bound(field: &str, raw: &str) -> Result<time::Date, AppError> {
    parse_date(raw).ok_or_else(|| invalid(field, format!("'{}' is not a YYYY-MM-DD date", raw.trim())))
}

fn invalid(field: &str, message: String) -> AppError {
    AppError::validation(vec![json!({ "field": field, "message": &message })], message)
}

pub fn create_module(dashboard: Arc<Dashboard>) -> Arc<dyn Module> {
    Arc::new(ReportsModule::new(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn params(start: Option<&str>, end: Option<&str>) -> PeriodParams {
        PeriodParams {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }

    #[test]
    fn period_needs_both_bounds_or_neither() {
        assert_eq!(params(None, None).period().unwrap(), None);
        assert_eq!(
            params(Some("2025-03-02"), Some("2025-03-08")).period().unwrap(),
            Some(SalesPeriod::new(date!(2025 - 03 - 02), date!(2025 - 03 - 08)))
        );
        assert!(params(Some("2025-03-02"), None).period().is_err());
        assert!(params(None, Some("2025-03-08")).period().is_err());
    }

    #[test]
    fn period_rejects_bad_dates_and_reversed_bounds() {
        assert!(params(Some("March 2"), Some("2025-03-08")).period().is_err());
        assert!(params(Some("2025-03-09"), Some("2025-03-08")).period().is_err());
    }
}
