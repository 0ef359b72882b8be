use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use carpool_core::{CoreError, Matchmaker, NotificationSink, RequestApproval, RideLifecycle};
use carpool_db::{Database, queries};
use carpool_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::Json;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub rides: RideLifecycle,
    pub requests: RequestApproval,
    pub notifications: NotificationSink,
    pub matchmaker: Matchmaker,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        jwt_secret: String,
        token_ttl: chrono::Duration,
        matchmaker: Matchmaker,
    ) -> AppState {
        Arc::new(Self {
            rides: RideLifecycle::new(db.clone()),
            requests: RequestApproval::new(db.clone()),
            notifications: NotificationSink::new(db.clone()),
            matchmaker,
            db,
            jwt_secret,
            token_ttl,
        })
    }
}

const MIN_PASSWORD_LEN: usize = 8;

fn validate_registration(req: &RegisterRequest) -> Result<(), CoreError> {
    if req.name.trim().is_empty() {
        return Err(CoreError::Validation("name is required".into()));
    }
    let email = req.email.trim();
    if email.len() < 3 || !email.contains('@') {
        return Err(CoreError::Validation("a valid email is required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&req)?;

    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let user_id = Uuid::new_v4();

    let db = state.db.clone();
    let (uid, display_name) = (user_id, name.clone());
    blocking(move || -> Result<(), ApiError> {
        if db.get_user_by_email(&email)?.is_some() {
            return Err(CoreError::Conflict("email is already registered".into()).into());
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        db.create_user(uid, &display_name, &email, &password_hash).map_err(|err| {
            if queries::is_unique_violation(&err) {
                ApiError::from(CoreError::Conflict("email is already registered".into()))
            } else {
                ApiError::from(err)
            }
        })
    })
    .await?;

    info!("Registered user {}", user_id);
    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &name)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let email = req.email.trim().to_lowercase();
    let user = blocking(move || -> Result<_, ApiError> {
        let user = db.get_user_by_email(&email)?.ok_or(ApiError::BadCredentials)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("stored hash for {} is corrupt: {}", user.id, e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::BadCredentials)?;

        Ok(user.into_user()?)
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::BadCredentials) {
            warn!("Failed login attempt");
        }
    })?;

    let token = create_token(&state.jwt_secret, state.token_ttl, user.id, &user.name)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        name: user.name,
        token,
    }))
}

/// GET /api/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || -> Result<_, ApiError> {
        let row = db
            .get_user_by_id(claims.sub)?
            .ok_or(CoreError::NotFound { entity: "user", id: claims.sub })?;
        Ok(row.into_user()?)
    })
    .await?;

    Ok(Json(user))
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user_id: Uuid,
    name: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: usize::try_from((chrono::Utc::now() + ttl).timestamp())?,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    Ok(data.claims)
}
