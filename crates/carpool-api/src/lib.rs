//! HTTP surface of the carpool service. Handlers authenticate the caller, hand
//! the caller id to the core services and translate their errors to status codes.

pub mod auth;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod notifications;
pub mod requests;
pub mod rides;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<F, T, E>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(Into::into)
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/rides", get(rides::list_rides))
        .route("/api/rides/{ride_id}", get(rides::get_ride))
        .route("/api/leaderboard", get(rides::leaderboard));

    let protected_routes = Router::new()
        .route("/api/users/me", get(auth::me))
        .route("/api/users/me/rides", get(rides::my_rides))
        .route("/api/rides", post(rides::create_ride))
        .route("/api/rides/match", post(rides::match_rides))
        .route("/api/rides/{ride_id}/start", post(rides::start_ride))
        .route("/api/rides/{ride_id}/cancel", post(rides::cancel_ride))
        .route("/api/rides/{ride_id}/request", post(requests::request_join))
        .route("/api/rides/{ride_id}/requests", get(requests::list_requests))
        .route("/api/rides/{ride_id}/requests/{request_id}", put(requests::resolve_request))
        .route(
            "/api/rides/{ride_id}/requests/{request_id}/withdraw",
            post(requests::withdraw_request),
        )
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/read", post(notifications::mark_all_read))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
