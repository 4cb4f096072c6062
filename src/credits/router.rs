use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cases::TenantId;

use super::{CreditError, CreditLedger, CreditStore, REASON_DOCUMENT_EXPORT};

/// Router exposing the metered export endpoint and ledger reads.
pub fn credit_router<S>(ledger: Arc<CreditLedger<S>>) -> Router
where
    S: CreditStore + 'static,
{
    Router::new()
        .route("/api/v1/credits", get(balance_handler::<S>))
        .route("/api/v1/credits/history", get(history_handler::<S>))
        .route("/api/v1/exports", post(export_handler::<S>))
        .with_state(ledger)
}

#[derive(Debug, Deserialize, Default)]
struct ExportRequest {
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
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

fn error_response(error: CreditError) -> Response {
    let status = match &error {
        CreditError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
        CreditError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.code(),
        "message": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

async fn export_handler<S>(
    State(ledger): State<Arc<CreditLedger<S>>>,
    headers: HeaderMap,
    Json(request): Json<ExportRequest>,
) -> Response
where
    S: CreditStore + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match ledger.consume(
        &tenant,
        1,
        REASON_DOCUMENT_EXPORT,
        request.actor,
        request.metadata,
    ) {
        Ok(balance) => (StatusCode::OK, Json(balance)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn balance_handler<S>(
    State(ledger): State<Arc<CreditLedger<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: CreditStore + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match ledger.balance(&tenant) {
        Ok(balance) => (StatusCode::OK, Json(balance)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn history_handler<S>(
    State(ledger): State<Arc<CreditLedger<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: CreditStore + 'static,
{
    let tenant = match tenant_from_headers(&headers) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };
    match ledger.history(&tenant) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}
