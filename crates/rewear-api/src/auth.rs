use std::path::PathBuf;
use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use rewear_db::Database;
use rewear_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserResponse};

use crate::error::{ApiError, ApiJson};
use crate::run_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Root for uploaded listing photos.
    pub uploads_dir: PathBuf,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    // Validate input
    if username.chars().count() < 3 || username.chars().count() > 32 {
        return Err(ApiError::field("username", "Username must be 3 to 32 characters."));
    }
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::field("email", "Enter a valid email address."));
    }
    if req.password.len() < 8 {
        return Err(ApiError::field("password", "Password must be at least 8 characters."));
    }

    // Check if username is taken
    let lookup = username.clone();
    if run_db(&state, move |db| db.get_user_by_username(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("A user with that username already exists.".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let wardrobe_id = Uuid::new_v4();

    let (uid, name, mail) = (user_id.to_string(), username.clone(), email.clone());
    run_db(&state, move |db| {
        db.create_user(&uid, &name, &mail, &password_hash, &wardrobe_id.to_string())
    })
    .await
    .map_err(|e| match e {
        ApiError::Internal(ref inner) if is_unique_violation(inner) => {
            ApiError::Conflict("A user with that username already exists.".into())
        }
        other => other,
    })?;

    let token = create_token(&state.jwt_secret, user_id, &username)?;

    info!("Registered user {} ({})", username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse {
                id: user_id,
                username,
                email,
            },
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Same normalization as `register`
    let username = req.username.trim().to_string();
    let lookup = username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&lookup))
        .await?
        .ok_or_else(|| {
            warn!("Login for unknown user '{}'", username);
            ApiError::InvalidCredentials
        })?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash for {} is corrupt: {}", user.id, e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            warn!("Wrong password for '{}'", user.username);
            ApiError::InvalidCredentials
        })?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(AuthResponse {
        user: UserResponse {
            id: user_id,
            username: user.username,
            email: user.email,
        },
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
