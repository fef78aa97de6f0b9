//! Approval audit trail and the issue-tracker checklist workflow.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use preorder_http::error::AppError;
use preorder_kernel::{InitCtx, Module};
use serde::Deserialize;
use serde_json::json;

use super::{array_of, json_operation, schema_ref};
use crate::dashboard::{Dashboard, IssueView, SyncReport};
use crate::domain::TitleId;
use crate::gateway::ApprovalIssue;
use crate::reconcile::ApprovalEvent;

pub struct ApprovalsModule {
    dashboard: Arc<Dashboard>,
}

impl ApprovalsModule {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self { dashboard }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EventsParams {
    title: Option<String>,
}

#[async_trait]
impl Module for ApprovalsModule {
    fn name(&self) -> &'static str {
        "approvals"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            label = %ctx.settings.github.approval_label,
            "approvals module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/events", get(list_events))
            .route("/issues", get(list_issues).post(create_issue))
            .route("/sync", post(sync))
            .with_state(self.dashboard.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let upstream = ("502", "Issue tracker unavailable");
        let mut spec = json!({
            "paths": {
                "/events": {
                    "get": json_operation(
                        "Approval audit log, oldest first (query: title)",
                        "Approvals",
                        array_of("ApprovalEvent"),
                        &[],
                    )
                },
                "/issues": {
                    "get": json_operation(
                        "Open approval issues with their ticked ISBNs",
                        "Approvals",
                        json!({ "type": "array", "items": { "type": "object" } }),
                        &[("400", "Issue tracker not configured"), upstream],
                    ),
                    "post": json_operation(
                        "Open a checklist issue for titles ready for release",
                        "Approvals",
                        json!({ "type": "object" }),
                        &[("400", "Nothing is ready for release"), upstream],
                    )
                },
                "/sync": {
                    "post": json_operation(
                        "Record ticked checklist rows as approvals",
                        "Approvals",
                        json!({ "type": "object" }),
                        &[("400", "Issue tracker not configured"), upstream],
                    )
                }
            },
            "components": {
                "schemas": {
                    "ApprovalEvent": {
                        "type": "object",
                        "properties": {
                            "sequence": { "type": "integer" },
                            "title_id": { "type": "string" },
                            "from": { "type": "string" },
                            "to": { "type": "string" },
                            "actor": { "type": "string" },
                            "at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["sequence", "title_id", "from", "to", "actor", "at"]
                    }
                }
            }
        });

        // Creation answers 201, not the 200 json_operation assumes.
        let created = &mut spec["paths"]["/issues"]["post"]["responses"];
        created["201"] = json!({
            "description": "Created",
            "content": { "application/json": { "schema": schema_ref("ApprovalIssue") } }
        });
        if let Some(responses) = created.as_object_mut() {
            responses.remove("200");
        }
        spec["components"]["schemas"]["ApprovalIssue"] = json!({
            "type": "object",
            "properties": {
                "number": { "type": "integer" },
                "title": { "type": "string" },
                "body": { "type": "string" },
                "url": { "type": "string" },
                "state": { "type": "string" }
            },
            "required": ["number", "title", "body", "url", "state"]
        });
        Some(spec)
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "approvals module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "approvals module stopped");
        Ok(())
    }
}

async fn list_events(
    State(dashboard): State<Arc<Dashboard>>,
    Query(params): Query<EventsParams>,
) -> Json<Vec<ApprovalEvent>> {
    let title = params
        .title
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(TitleId::new);
    Json(dashboard.audit_events(title.as_ref()).await)
}

async fn list_issues(
    State(dashboard): State<Arc<Dashboard>>,
) -> Result<Json<Vec<IssueView>>, AppError> {
    Ok(Json(dashboard.approval_issues().await?))
}

async fn create_issue(
    State(dashboard): State<Arc<Dashboard>>,
) -> Result<(StatusCode, Json<ApprovalIssue>), AppError> {
    let issue = dashboard.create_approval_issue().await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

async fn sync(State(dashboard): State<Arc<Dashboard>>) -> Result<Json<SyncReport>, AppError> {
    Ok(Json(dashboard.sync_approvals().await?))
}

pub fn create_module(dashboard: Arc<Dashboard>) -> Arc<dyn Module> {
    Arc::new(ApprovalsModule::new(dashboard))
}
