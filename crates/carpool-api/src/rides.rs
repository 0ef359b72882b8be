use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use carpool_core::{MatchQuery, NewRide, leaderboard::leaderboard as rank_users};
use carpool_types::api::{Claims, CreateRideRequest, MatchRequest, MatchResponse};
use carpool_types::models::RideStatus;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};

#[derive(Debug, Deserialize)]
pub struct RideListQuery {
    pub status: Option<RideStatus>,
}

/// GET /api/rides: every ride, or only those whose effective state is `status`.
pub async fn list_rides(
    State(state): State<AppState>,
    Query(query): Query<RideListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rides = blocking(move || state.rides.list_rides(query.status, Utc::now())).await?;
    Ok(Json(rides))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ride = blocking(move || state.rides.get_ride(ride_id, Utc::now())).await?;
    Ok(Json(ride))
}

pub async fn create_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRideRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewRide {
        origin: req.origin,
        destination: req.destination,
        departure_time: req.departure_time,
        seats: req.seats,
    };
    let ride = blocking(move || state.rides.create_ride(claims.sub, new, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

pub async fn start_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let ride = blocking(move || state.rides.start_ride(ride_id, claims.sub, Utc::now())).await?;
    Ok(Json(ride))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let ride = blocking(move || state.rides.cancel_ride(ride_id, claims.sub, Utc::now())).await?;
    Ok(Json(ride))
}

/// GET /api/users/me/rides: rides the caller drives or has a seat on.
pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rides = blocking(move || state.rides.rides_for_user(claims.sub, Utc::now())).await?;
    Ok(Json(rides))
}

pub async fn match_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = MatchQuery {
        schedule: req.schedule,
        preferences: req.preferences,
    };
    let matches = blocking(move || state.matchmaker.suggest(claims.sub, &query, Utc::now())).await?;
    Ok(Json(MatchResponse { matches }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.clamp(1, 100);
    let entries = blocking(move || rank_users(&state.db, limit)).await?;
    Ok(Json(entries))
}
