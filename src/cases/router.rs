use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{CaseId, TenantId};
use super::procedure::ProcedureRegistry;
use super::repository::CaseStore;
use super::service::{CaseService, CaseServiceError};

/// Router builder exposing the case lifecycle endpoints.
///
/// Every route is tenant-scoped through the `x-tenant-id` header; the HTTP
/// layer in front of this service is responsible for authenticating it.
pub fn case_router<S, P>(service: Arc<CaseService<S, P>>) -> Router
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    Router::new()
        .route("/api/v1/cases", post(create_case::<S, P>))
        .route("/api/v1/cases/:case_id", get(get_case::<S, P>))
        .route(
            "/api/v1/cases/:case_id/procedure",
            post(bind_procedure::<S, P>),
        )
        .route(
            "/api/v1/cases/:case_id/fields/:field_key",
            put(upsert_field::<S, P>),
        )
        .route("/api/v1/cases/:case_id/wizard", get(wizard_plan::<S, P>))
        .route(
            "/api/v1/cases/:case_id/wizard/steps/:step_key",
            post(complete_step::<S, P>),
        )
        .route("/api/v1/cases/:case_id/validate", post(validate_case::<S, P>))
        .route("/api/v1/cases/:case_id/submit", post(submit_case::<S, P>))
        .route("/api/v1/cases/:case_id/reopen", post(reopen_case::<S, P>))
        .route("/api/v1/cases/:case_id/complete", post(complete_case::<S, P>))
        .route("/api/v1/cases/:case_id/archive", post(archive_case::<S, P>))
        .route("/api/v1/cases/:case_id/snapshots", get(list_snapshots::<S, P>))
        .route(
            "/api/v1/cases/:case_id/snapshots/:version",
            get(get_snapshot::<S, P>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct CreateCaseRequest {
    title: String,
}

#[derive(Debug, Deserialize)]
struct BindProcedureRequest {
    code: String,
    #[serde(default)]
    version: Option<u32>,
}

fn tenant_from_headers(headers: &HeaderMap) -> Result<TenantId, Response> {
    headers
        .get("x-tenant-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| TenantId(value.to_string()))
        .ok_or_else(|| {
            let payload = json!({ "error": "TENANT_REQUIRED" });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        })
}

fn error_response(error: CaseServiceError) -> Response {
    let status = match &error {
        CaseServiceError::CaseNotFound
        | CaseServiceError::SnapshotNotFound
        | CaseServiceError::Procedure(_) => StatusCode::NOT_FOUND,
        CaseServiceError::ConcurrentModification => StatusCode::CONFLICT,
        CaseServiceError::CaseNotInProcess
        | CaseServiceError::CaseNotEditable { .. }
        | CaseServiceError::CaseAlreadySubmitted
        | CaseServiceError::CaseArchived
        | CaseServiceError::CannotReopen { .. }
        | CaseServiceError::CannotComplete { .. }
        | CaseServiceError::CannotArchive { .. } => StatusCode::CONFLICT,
        CaseServiceError::CaseInvalid { .. }
        | CaseServiceError::WizardNotCompleted { .. }
        | CaseServiceError::WizardNotInitialized
        | CaseServiceError::NoProcedureBound
        | CaseServiceError::NoProcedureSelected
        | CaseServiceError::UnknownStep { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CaseServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        CaseServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut payload = json!({
        "error": error.code(),
        "message": error.to_string(),
    });
    match &error {
        CaseServiceError::CaseInvalid { report } => {
            payload["issues"] = serde_json::to_value(&report.errors).unwrap_or(Value::Null);
        }
        CaseServiceError::WizardNotCompleted { missing_steps } => {
            payload["missing_steps"] =
                serde_json::to_value(missing_steps).unwrap_or(Value::Null);
        }
        _ => {}
    }

    (status, Json(payload)).into_response()
}

async fn create_case<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Json(request): Json<CreateCaseRequest>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.create_case(&tenant, &request.title) {
        Ok(case) => (StatusCode::CREATED, Json(case.view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_case<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.get_case(&tenant, &CaseId(case_id)) {
        Ok(case) => (StatusCode::OK, Json(case.view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn bind_procedure<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
    Json(request): Json<BindProcedureRequest>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.bind_procedure(&tenant, &CaseId(case_id), &request.code, request.version) {
        Ok(case) => (StatusCode::OK, Json(case.view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn upsert_field<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path((case_id, field_key)): Path<(String, String)>,
    Json(value): Json<Value>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.upsert_field(&tenant, &CaseId(case_id), &field_key, value) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

async fn wizard_plan<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.wizard_plan(&tenant, &CaseId(case_id)) {
        Ok((access, steps)) => (
            StatusCode::OK,
            Json(json!({ "access": access, "steps": steps })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

async fn complete_step<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path((case_id, step_key)): Path<(String, String)>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.complete_wizard_step(&tenant, &CaseId(case_id), &step_key) {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn validate_case<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.validate_case(&tenant, &CaseId(case_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn submit_case<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.submit(&tenant, &CaseId(case_id)) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn reopen_case<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.reopen(&tenant, &CaseId(case_id)) {
        Ok(case) => (StatusCode::OK, Json(case.view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn complete_case<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.complete(&tenant, &CaseId(case_id)) {
        Ok(case) => (StatusCode::OK, Json(case.view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn archive_case<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.archive(&tenant, &CaseId(case_id)) {
        Ok(case) => (StatusCode::OK, Json(case.view())).into_response(),
        Err(error) => error_response(error),
    }
}

async fn list_snapshots<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.list_snapshots(&tenant, &CaseId(case_id)) {
        Ok(snapshots) => (StatusCode::OK, Json(snapshots)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_snapshot<S, P>(
    State(service): State<Arc<CaseService<S, P>>>,
    headers: HeaderMap,
    Path((case_id, version)): Path<(String, u32)>,
) -> Response
where
    S: CaseStore + 'static,
    P: ProcedureRegistry + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match service.get_snapshot(&tenant, &CaseId(case_id), version) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}
