use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use moneta_service::{
    AnalyzeRequest, AnalyzeResponse, BackfillReport, CallerAuth, Error as ServiceError,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/analyze", post(analyze))
        .with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/admin/backfill_embeddings", post(backfill_embeddings))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let auth = caller_auth(&headers);
    let response = state.service.analyze(&auth, payload).await?;
    Ok(Json(response))
}

async fn backfill_embeddings(
    State(state): State<AppState>,
) -> Result<Json<BackfillReport>, ApiError> {
    let response = state.service.backfill_embeddings().await?;
    Ok(Json(response))
}

// Identity verified by a trusted gateway arrives in the x-authenticated-*
// headers; a raw bearer token is passed through for the service to verify.
fn caller_auth(headers: &HeaderMap) -> CallerAuth {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    CallerAuth {
        uid: header_str("x-authenticated-uid"),
        email: header_str("x-authenticated-email"),
        bearer,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_code: String,
    message: String,
    fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_code: String,
    message: String,
    fields: Option<Vec<String>>,
}

impl ApiError {
    fn new(
        status: StatusCode,
        error_code: impl Into<String>,
        message: impl Into<String>,
        fields: Option<Vec<String>>,
    ) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: message.into(),
            fields,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unauthenticated => {
                ApiError::new(StatusCode::UNAUTHORIZED, "unauthenticated", message, None)
            }
            ServiceError::PermissionDenied { .. } => {
                ApiError::new(StatusCode::FORBIDDEN, "permission_denied", message, None)
            }
            ServiceError::InvalidArgument { .. } => ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_argument",
                message,
                Some(vec!["question".to_string()]),
            ),
            ServiceError::Upstream { .. } => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "upstream_unavailable",
                message,
                None,
            ),
            ServiceError::Generation { .. } => ApiError::new(
                StatusCode::BAD_GATEWAY,
                "generation_failed",
                message,
                None,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error_code: self.error_code,
            message: self.message,
            fields: self.fields,
        };
        (self.status, Json(body)).into_response()
    }
}
