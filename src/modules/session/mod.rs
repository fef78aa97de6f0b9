//! Session state: current mode, refresh and staleness.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use preorder_http::error::AppError;
use preorder_kernel::{InitCtx, Module};
use serde::Deserialize;
use serde_json::json;

use super::{json_operation, schema_ref};
use crate::dashboard::{Dashboard, RefreshResult, SessionInfo};

pub struct SessionModule {
    dashboard: Arc<Dashboard>,
}

impl SessionModule {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self { dashboard }
    }
}

#[derive(Debug, Deserialize)]
struct TestModeRequest {
    enabled: bool,
}

#[async_trait]
impl Module for SessionModule {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            test_mode = self.dashboard.is_test_mode(),
            "session module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(show_session))
            .route("/refresh", post(refresh))
            .route("/test-mode", put(set_test_mode))
            .with_state(self.dashboard.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": json_operation("Current session state", "Session", schema_ref("Session"), &[])
                },
                "/refresh": {
                    "post": json_operation(
                        "Refresh titles and sales from the catalog",
                        "Session",
                        schema_ref("RefreshResult"),
                        &[],
                    )
                },
                "/test-mode": {
                    "put": json_operation(
                        "Enable or disable test mode",
                        "Session",
                        schema_ref("Session"),
                        &[("400", "Live mode is not configured")],
                    )
                }
            },
            "components": {
                "schemas": {
                    "RefreshResult": {
                        "type": "object",
                        "properties": {
                            "result": { "type": "string", "enum": ["refreshed", "stale"] },
                            "report": { "type": "object" },
                            "warning": { "type": "object" }
                        },
                        "required": ["result"]
                    },
                    "Session": {
                        "type": "object",
                        "properties": {
                            "test_mode": { "type": "boolean" },
                            "live_available": { "type": "boolean" },
                            "titles": { "type": "integer" },
                            "last_refresh": { "type": "string", "format": "date-time" },
                            "stale": { "type": "object" },
                            "persisted": { "type": "boolean" }
                        },
                        "required": ["test_mode", "live_available", "titles", "persisted"]
                    }
                }
            }
        }))
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.dashboard.refresh_on_start {
            match self.dashboard.refresh().await {
                RefreshResult::Refreshed { report, .. } => tracing::info!(
                    module = self.name(),
                    added = report.added,
                    updated = report.updated,
                    "initial refresh complete"
                ),
                RefreshResult::Stale { warning } => tracing::warn!(
                    module = self.name(),
                    message = %warning.message,
                    "initial refresh failed"
                ),
            }
        }
        tracing::info!(module = self.name(), "session module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.dashboard.flush().await?;
        tracing::info!(module = self.name(), "session module stopped");
        Ok(())
    }
}

async fn show_session(State(dashboard): State<Arc<Dashboard>>) -> Json<SessionInfo> {
    Json(dashboard.session().await)
}

/// Always 200: a failed refresh reports a stale warning instead of an error.
async fn refresh(State(dashboard): State<Arc<Dashboard>>) -> Json<RefreshResult> {
    Json(dashboard.refresh().await)
}

async fn set_test_mode(
    State(dashboard): State<Arc<Dashboard>>,
    Json(request): Json<TestModeRequest>,
) -> Result<Json<SessionInfo>, AppError> {
    Ok(Json(dashboard.set_test_mode(request.enabled).await?))
}

pub fn create_module(dashboard: Arc<Dashboard>) -> Arc<dyn Module> {
    Arc::new(SessionModule::new(dashboard))
}
