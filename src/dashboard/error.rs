use preorder_http::error::AppError;
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::reconcile::ReconcileError;
use crate::report::ReportError;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("live mode is unavailable: {0}")]
    LiveModeUnavailable(String),

    #[error("export failed: {0}")]
    Export(#[from] ReportError),

    #[error("{0}")]
    InvalidInput(String),
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        let message = err.to_string();
        match err {
            DashboardError::Reconcile(ReconcileError::UnknownTitle(id)) => {
                AppError::not_found(format!("title {id} not found"))
            }
            DashboardError::Reconcile(ReconcileError::InvalidTransition { id, from, to }) => {
                AppError::validation_with_code(
                    "invalid_transition",
                    vec![json!({ "title_id": id, "from": from, "to": to })],
                    message,
                )
            }
            DashboardError::Reconcile(ReconcileError::MissingDate { id }) => {
                AppError::validation_with_code(
                    "missing_publication_date",
                    vec![json!({ "title_id": id })],
                    message,
                )
            }
            DashboardError::Reconcile(ReconcileError::MalformedDate { id, raw }) => {
                AppError::validation_with_code(
                    "malformed_publication_date",
                    vec![json!({ "title_id": id, "value": raw })],
                    message,
                )
            }
            DashboardError::Reconcile(ReconcileError::MissingActor) => AppError::validation(
                vec![json!({ "field": "actor", "message": "must not be empty" })],
                message,
            ),
            DashboardError::Gateway(GatewayError::NotConfigured { .. })
            | DashboardError::LiveModeUnavailable(_)
            | DashboardError::InvalidInput(_) => AppError::bad_request(message),
            DashboardError::Gateway(_) => AppError::upstream(message),
            DashboardError::Export(err) => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApprovalStatus;
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn maps_engine_errors_to_http_statuses() {
        let cases = [
            (
                DashboardError::Reconcile(ReconcileError::UnknownTitle("1".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                DashboardError::Reconcile(ReconcileError::InvalidTransition {
                    id: "1".into(),
                    from: ApprovalStatus::Approved,
                    to: ApprovalStatus::Pending,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DashboardError::Reconcile(ReconcileError::MissingDate { id: "1".into() }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                DashboardError::LiveModeUnavailable("no credentials".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DashboardError::Gateway(GatewayError::Unavailable {
                    service: "github",
                    message: "connection refused".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
