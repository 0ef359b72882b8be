use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;

use carpool_types::api::Claims;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::{Json, Query};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// Include notifications that were already read
    #[serde(default)]
    pub all: bool,
}

/// GET /api/notifications: unread only unless `?all=true`, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = blocking(move || {
        if query.all {
            state.notifications.list_all(claims.sub)
        } else {
            state.notifications.list_unread(claims.sub)
        }
    })
    .await?;
    Ok(Json(notifications))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = blocking(move || state.notifications.mark_all_read(claims.sub)).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
