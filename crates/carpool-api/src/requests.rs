use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use carpool_types::api::{Claims, ResolveRequestBody};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::{Json, Path};

/// POST /api/rides/{ride_id}/request: the caller asks for a seat.
pub async fn request_join(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let request = blocking(move || state.requests.request_join(ride_id, claims.sub, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let requests = blocking(move || state.requests.list_requests(ride_id, claims.sub)).await?;
    Ok(Json(requests))
}

/// PUT /api/rides/{ride_id}/requests/{request_id} with `{"status": "accepted" | "rejected"}`.
pub async fn resolve_request(
    State(state): State<AppState>,
    Path((ride_id, request_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<ResolveRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = blocking(move || {
        state
            .requests
            .resolve_request(ride_id, request_id, claims.sub, body.status, Utc::now())
    })
    .await?;
    Ok(Json(request))
}

pub async fn withdraw_request(
    State(state): State<AppState>,
    Path((ride_id, request_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let request = blocking(move || {
        state
            .requests
            .withdraw_request(ride_id, request_id, claims.sub, Utc::now())
    })
    .await?;
    Ok(Json(request))
}
