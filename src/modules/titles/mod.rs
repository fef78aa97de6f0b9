pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use preorder_http::error::AppError;
use preorder_kernel::{InitCtx, Module};
use serde_json::json;

use super::{array_of, json_operation, schema_ref};
use crate::dashboard::{Dashboard, TitleView};
use crate::domain::TitleId;
use crate::reconcile::ApprovalOutcome;
use models::{ApprovalRequest, ListParams, OverrideRequest, PublicationDate};

/// Titles: listing, publication dates, overrides and approval decisions.
pub struct TitlesModule {
    dashboard: Arc<Dashboard>,
}

impl TitlesModule {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl Module for TitlesModule {
    fn name(&self) -> &'static str {
        "titles"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "titles module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_titles))
            .route("/{id}", get(show_title))
            .route("/{id}/publication-date", get(publication_date))
            .route("/{id}/override", put(set_override).delete(clear_override))
            .route("/{id}/approval", post(record_approval))
            .with_state(self.dashboard.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let not_found = ("404", "Unknown title");
        Some(json!({
            "paths": {
                "/": {
                    "get": json_operation(
                        "List titles (query: search, date, sort, include_inactive)",
                        "Titles",
                        array_of("Title"),
                        &[("422", "Unknown filter or sort")],
                    )
                },
                "/{id}": {
                    "get": json_operation("Show one title", "Titles", schema_ref("Title"), &[not_found])
                },
                "/{id}/publication-date": {
                    "get": json_operation(
                        "Effective publication date",
                        "Titles",
                        json!({ "type": "object" }),
                        &[not_found, ("422", "Missing or unreadable publication date")],
                    )
                },
                "/{id}/override": {
                    "put": json_operation(
                        "Set a publication date override",
                        "Titles",
                        schema_ref("Title"),
                        &[not_found, ("422", "Invalid date or missing actor")],
                    ),
                    "delete": json_operation(
                        "Clear the publication date override",
                        "Titles",
                        schema_ref("Title"),
                        &[not_found],
                    )
                },
                "/{id}/approval": {
                    "post": json_operation(
                        "Record an approval decision",
                        "Titles",
                        json!({ "type": "object" }),
                        &[not_found, ("422", "Invalid approval transition")],
                    )
                }
            },
            "components": {
                "schemas": {
                    "Title": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "description": "ISBN" },
                            "title": { "type": "string" },
                            "platform_pub_date": { "type": "string" },
                            "override": { "type": "object" },
                            "effective_date": { "type": "string", "format": "date" },
                            "date_status": {
                                "type": "string",
                                "enum": ["upcoming", "recent", "past_due", "missing", "malformed"]
                            },
                            "date_problem": { "type": "string" },
                            "status": { "type": "string", "enum": ["pending", "approved", "rejected"] },
                            "active": { "type": "boolean" },
                            "quantity": { "type": "integer" },
                            "revenue": { "type": "string" },
                            "last_modified": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "date_status", "status", "active"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "titles module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "titles module stopped");
        Ok(())
    }
}

async fn list_titles(
    State(dashboard): State<Arc<Dashboard>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<TitleView>>, AppError> {
    let query = params.into_query()?;
    Ok(Json(dashboard.list_titles(&query).await))
}

async fn show_title(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<String>,
) -> Result<Json<TitleView>, AppError> {
    Ok(Json(dashboard.title(&TitleId::new(id)).await?))
}

async fn publication_date(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<String>,
) -> Result<Json<PublicationDate>, AppError> {
    let id = TitleId::new(id);
    let publication_date = dashboard.publication_date(&id).await?;
    Ok(Json(PublicationDate {
        id,
        publication_date,
    }))
}

async fn set_override(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<TitleView>, AppError> {
    let date = request.parsed_date()?;
    let view = dashboard
        .set_override(&TitleId::new(id), date, request.note, &request.actor)
        .await?;
    Ok(Json(view))
}

async fn clear_override(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<String>,
) -> Result<Json<TitleView>, AppError> {
    Ok(Json(dashboard.clear_override(&TitleId::new(id)).await?))
}

async fn record_approval(
    State(dashboard): State<Arc<Dashboard>>,
    Path(id): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<ApprovalOutcome>, AppError> {
    let status = request.parsed_status()?;
    let outcome = dashboard
        .approve(&TitleId::new(id), status, &request.actor)
        .await?;
    Ok(Json(outcome))
}

pub fn create_module(dashboard: Arc<Dashboard>) -> Arc<dyn Module> {
    Arc::new(TitlesModule::new(dashboard))
}
