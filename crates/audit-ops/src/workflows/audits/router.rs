use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::capabilities::Capabilities;
use super::domain::{AuditId, UserId};
use super::lifecycle::{AuditLifecycle, AuditUpdate, Decision, LifecycleError};
use super::repository::{
    AuditRepository, AuditStatusView, Directory, NotificationDispatcher,
};
use super::scoring::AuditProgress;

/// Router builder exposing the audit lifecycle operation surface.
pub fn audit_router<D, R, N>(service: Arc<AuditLifecycle<D, R, N>>) -> Router
where
    D: Directory + 'static,
    R: AuditRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/audits/:audit_id",
            get(inspect_handler::<D, R, N>),
        )
        .route(
            "/api/v1/audits/:audit_id/progress",
            post(save_progress_handler::<D, R, N>),
        )
        .route(
            "/api/v1/audits/:audit_id/submit",
            post(submit_handler::<D, R, N>),
        )
        .route(
            "/api/v1/audits/:audit_id/approval",
            post(approval_handler::<D, R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveProgressRequest {
    pub(crate) actor_id: String,
    #[serde(flatten)]
    pub(crate) update: AuditUpdate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    pub(crate) actor_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalRequest {
    pub(crate) actor_id: String,
    #[serde(flatten)]
    pub(crate) decision: Decision,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InspectQuery {
    pub(crate) actor_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuditInspectionView {
    #[serde(flatten)]
    pub(crate) status: AuditStatusView,
    pub(crate) progress: AuditProgress,
    pub(crate) capabilities: Capabilities,
}

pub(crate) async fn save_progress_handler<D, R, N>(
    State(service): State<Arc<AuditLifecycle<D, R, N>>>,
    Path(audit_id): Path<String>,
    axum::Json(request): axum::Json<SaveProgressRequest>,
) -> Response
where
    D: Directory + 'static,
    R: AuditRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.save_progress(
        &UserId(request.actor_id),
        &AuditId(audit_id),
        request.update,
        Utc::now(),
    );
    match result {
        Ok(audit) => match service.status_view(&audit) {
            Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<D, R, N>(
    State(service): State<Arc<AuditLifecycle<D, R, N>>>,
    Path(audit_id): Path<String>,
    axum::Json(request): axum::Json<SubmitRequest>,
) -> Response
where
    D: Directory + 'static,
    R: AuditRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let result =
        service.submit_for_approval(&UserId(request.actor_id), &AuditId(audit_id), Utc::now());
    match result {
        Ok(audit) => match service.status_view(&audit) {
            Ok(view) => (StatusCode::ACCEPTED, axum::Json(view)).into_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approval_handler<D, R, N>(
    State(service): State<Arc<AuditLifecycle<D, R, N>>>,
    Path(audit_id): Path<String>,
    axum::Json(request): axum::Json<ApprovalRequest>,
) -> Response
where
    D: Directory + 'static,
    R: AuditRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let result = service.set_approval(
        &UserId(request.actor_id),
        &AuditId(audit_id),
        request.decision,
        Utc::now(),
    );
    match result {
        Ok(audit) => match service.status_view(&audit) {
            Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn inspect_handler<D, R, N>(
    State(service): State<Arc<AuditLifecycle<D, R, N>>>,
    Path(audit_id): Path<String>,
    Query(query): Query<InspectQuery>,
) -> Response
where
    D: Directory + 'static,
    R: AuditRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.inspect(&UserId(query.actor_id), &AuditId(audit_id)) {
        Ok(inspection) => {
            let view = AuditInspectionView {
                status: AuditStatusView::from_audit(
                    &inspection.audit,
                    inspection.progress.completion_percent,
                ),
                progress: inspection.progress,
                capabilities: inspection.capabilities,
            };
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: LifecycleError) -> Response {
    let status = match &error {
        LifecycleError::Permission { .. } => StatusCode::FORBIDDEN,
        LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifecycleError::InvalidTransition { .. } => StatusCode::CONFLICT,
        LifecycleError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
