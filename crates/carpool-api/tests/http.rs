//! End-to-end checks of the REST surface, driven through the router in memory.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use carpool_api::{AppStateInner, router};
use carpool_core::{KeywordMatcher, Matchmaker};
use carpool_db::Database;

fn app() -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let matchmaker = Matchmaker::new(db.clone(), Arc::new(KeywordMatcher));
    let state = AppStateInner::new(db, "test-secret".into(), Duration::hours(1), matchmaker);
    router(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Registers a user and returns (user_id, token).
async fn register(app: &Router, name: &str) -> (String, String) {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    let (status, body) = send(
        app,
        Method::POST,
        "/api/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["user_id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn create_ride(app: &Router, token: &str, seats: u32) -> String {
    let departure = (Utc::now() + Duration::hours(2)).to_rfc3339();
    let (status, body) = send(
        app,
        Method::POST,
        "/api/rides",
        Some(token),
        Some(json!({
            "origin": "Sunnyvale, CA",
            "destination": "San Francisco, CA",
            "departure_time": departure,
            "seats": seats,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "upcoming");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_and_login() {
    let app = app();
    let (user_id, _) = register(&app, "Alex Johnson").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "email": "alex.johnson@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = send(&app, Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Alex Johnson");
    assert!(me.get("password").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "email": "alex.johnson@example.com", "password": "wrong-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = app();
    register(&app, "Alex Johnson").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/register",
        None,
        Some(json!({ "name": "Alex J", "email": "Alex.Johnson@example.com", "password": "another-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = app();

    let (status, _) = send(&app, Method::GET, "/api/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/notifications", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Browsing stays public
    let (status, body) = send(&app, Method::GET, "/api/rides", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn single_seat_lifecycle() {
    let app = app();
    let (_, maria) = register(&app, "Maria Garcia").await;
    let (alex_id, alex) = register(&app, "Alex Johnson").await;
    let (_, david) = register(&app, "David Smith").await;

    let ride_id = create_ride(&app, &maria, 1).await;

    // Alex asks and is accepted
    let (status, req_a) =
        send(&app, Method::POST, &format!("/api/rides/{}/request", ride_id), Some(&alex), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(req_a["status"], "pending");
    let req_a = req_a["id"].as_str().unwrap().to_string();

    let (status, dup) =
        send(&app, Method::POST, &format!("/api/rides/{}/request", ride_id), Some(&alex), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["code"], "CONFLICT");

    let (status, driver_inbox) = send(&app, Method::GET, "/api/notifications", Some(&maria), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(driver_inbox.as_array().unwrap().len(), 1);
    assert_eq!(driver_inbox[0]["type"], "join_requested");

    let (status, accepted) = send(
        &app,
        Method::PUT,
        &format!("/api/rides/{}/requests/{}", ride_id, req_a),
        Some(&maria),
        Some(json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");

    let (_, ride) = send(&app, Method::GET, &format!("/api/rides/{}", ride_id), None, None).await;
    assert_eq!(ride["seats_remaining"], 0);
    assert_eq!(ride["passengers"][0]["id"], alex_id);

    let (_, inbox) = send(&app, Method::GET, "/api/notifications", Some(&alex), None).await;
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["type"], "request_resolved");
    assert_eq!(inbox[0]["data"]["status"], "accepted");

    // David asks, but the ride is full
    let (_, req_b) =
        send(&app, Method::POST, &format!("/api/rides/{}/request", ride_id), Some(&david), None).await;
    let req_b = req_b["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/rides/{}/requests/{}", ride_id, req_b),
        Some(&maria),
        Some(json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CAPACITY");

    let (_, requests) =
        send(&app, Method::GET, &format!("/api/rides/{}/requests", ride_id), Some(&maria), None).await;
    let david_req = requests
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == req_b.as_str())
        .unwrap();
    assert_eq!(david_req["status"], "pending");

    // Resolving Alex again is refused
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/rides/{}/requests/{}", ride_id, req_a),
        Some(&maria),
        Some(json!({ "status": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn only_driver_starts_ride() {
    let app = app();
    let (_, maria) = register(&app, "Maria Garcia").await;
    let (_, alex) = register(&app, "Alex Johnson").await;
    let ride_id = create_ride(&app, &maria, 2).await;

    let (status, body) =
        send(&app, Method::POST, &format!("/api/rides/{}/start", ride_id), Some(&alex), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (_, ride) = send(&app, Method::GET, &format!("/api/rides/{}", ride_id), None, None).await;
    assert_eq!(ride["status"], "upcoming");

    let (status, ride) =
        send(&app, Method::POST, &format!("/api/rides/{}/start", ride_id), Some(&maria), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ride["status"], "active");

    let (status, body) =
        send(&app, Method::POST, &format!("/api/rides/{}/start", ride_id), Some(&maria), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, ride) =
        send(&app, Method::POST, &format!("/api/rides/{}/cancel", ride_id), Some(&maria), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ride["status"], "completed");

    let (_, upcoming) = send(&app, Method::GET, "/api/rides?status=upcoming", None, None).await;
    assert_eq!(upcoming, json!([]));
}

#[tokio::test]
async fn withdraw_and_notifications_read() {
    let app = app();
    let (_, maria) = register(&app, "Maria Garcia").await;
    let (_, alex) = register(&app, "Alex Johnson").await;
    let ride_id = create_ride(&app, &maria, 1).await;

    let (_, req) =
        send(&app, Method::POST, &format!("/api/rides/{}/request", ride_id), Some(&alex), None).await;
    let req = req["id"].as_str().unwrap().to_string();
    send(
        &app,
        Method::PUT,
        &format!("/api/rides/{}/requests/{}", ride_id, req),
        Some(&maria),
        Some(json!({ "status": "accepted" })),
    )
    .await;

    let (_, mine) = send(&app, Method::GET, "/api/users/me/rides", Some(&alex), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, withdrawn) = send(
        &app,
        Method::POST,
        &format!("/api/rides/{}/requests/{}/withdraw", ride_id, req),
        Some(&alex),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawn["status"], "withdrawn");

    let (_, ride) = send(&app, Method::GET, &format!("/api/rides/{}", ride_id), None, None).await;
    assert_eq!(ride["seats_remaining"], 1);

    let (_, inbox) = send(&app, Method::GET, "/api/notifications", Some(&maria), None).await;
    assert_eq!(inbox.as_array().unwrap().len(), 2);
    assert_eq!(inbox[0]["type"], "request_withdrawn");

    let (status, body) = send(&app, Method::POST, "/api/notifications/read", Some(&maria), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);

    let (_, unread) = send(&app, Method::GET, "/api/notifications", Some(&maria), None).await;
    assert_eq!(unread, json!([]));
    let (_, all) = send(&app, Method::GET, "/api/notifications?all=true", Some(&maria), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_ride_is_rejected() {
    let app = app();
    let (_, maria) = register(&app, "Maria Garcia").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/rides",
        Some(&maria),
        Some(json!({
            "origin": "Sunnyvale, CA",
            "destination": "",
            "departure_time": (Utc::now() + Duration::hours(1)).to_rfc3339(),
            "seats": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/rides/{}", uuid::Uuid::new_v4()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn undecodable_input_is_a_validation_error() {
    let app = app();
    let (_, maria) = register(&app, "Maria Garcia").await;
    let departure = (Utc::now() + Duration::hours(2)).to_rfc3339();

    let bad_requests = [
        (
            Method::POST,
            "/api/rides",
            Some(maria.as_str()),
            Some(json!({
                "origin": "Sunnyvale, CA",
                "destination": "San Francisco, CA",
                "departure_time": departure,
                "seats": -1,
            })),
        ),
        (
            Method::POST,
            "/api/rides",
            Some(maria.as_str()),
            Some(json!({
                "destination": "San Francisco, CA",
                "departure_time": departure,
                "seats": 2,
            })),
        ),
        (Method::POST, "/api/register", None, Some(json!({ "name": "Alex Johnson" }))),
        (Method::GET, "/api/rides/not-a-uuid", None, None),
        (Method::GET, "/api/rides?status=cancelled", None, None),
    ];

    for (method, uri, token, body) in bad_requests {
        let (status, body) = send(&app, method, uri, token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], "VALIDATION_ERROR", "{}", uri);
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    let (_, rides) = send(&app, Method::GET, "/api/rides", None, None).await;
    assert_eq!(rides, json!([]));
}

#[tokio::test]
async fn match_and_leaderboard() {
    let app = app();
    let (_, maria) = register(&app, "Maria Garcia").await;
    let (_, alex) = register(&app, "Alex Johnson").await;
    let ride_id = create_ride(&app, &maria, 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/rides/match",
        Some(&alex),
        Some(json!({ "schedule": "Weekdays into San Francisco at 8am", "preferences": "non-smoker" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matches"][0]["id"], ride_id);

    let (_, req) =
        send(&app, Method::POST, &format!("/api/rides/{}/request", ride_id), Some(&alex), None).await;
    let req = req["id"].as_str().unwrap().to_string();
    send(
        &app,
        Method::PUT,
        &format!("/api/rides/{}/requests/{}", ride_id, req),
        Some(&maria),
        Some(json!({ "status": "accepted" })),
    )
    .await;

    let (status, board) = send(&app, Method::GET, "/api/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let board = board.as_array().unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["rides_shared"], 1);
}
