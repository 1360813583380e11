use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::RngCore;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use aura_db::Database;
use aura_db::users::NewUser;
use aura_recap::RecapGenerator;
use aura_types::DEFAULT_AVATAR_URL;
use aura_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, VerifyEmailRequest,
};
use aura_types::validate::{check_password, normalize_email, normalize_handle, optional_text};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub require_verified_email: bool,
    pub recap: Arc<dyn RecapGenerator>,
}

impl AppStateInner {
    /// Runs a blocking store call off the async runtime.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> aura_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.to_string())
            })?
            .map_err(ApiError::from)
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = normalize_handle(&req.handle)?;
    let email = normalize_email(&req.email)?;
    check_password(&req.password)?;

    // Advisory checks for a friendlier message; the UNIQUE constraints
    // decide if two registrations race.
    let (h, e) = (handle.clone(), email.clone());
    let (handle_taken, email_taken) = state
        .run_db(move |db| Ok((db.find_handle(&h, None)?.is_some(), db.email_taken(&e)?)))
        .await?;
    if handle_taken {
        return Err(ApiError::Conflict("Handle already taken. Please choose another.".into()));
    }
    if email_taken {
        return Err(ApiError::Conflict(
            "This email address is already in use by another account.".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .to_string();

    let verification_token = new_verification_token();
    let user_id = Uuid::new_v4();
    let new_user = NewUser {
        id: user_id,
        handle: handle.clone(),
        email: email.clone(),
        password_hash,
        full_name: req.full_name.as_deref().and_then(optional_text),
        avatar_url: Some(DEFAULT_AVATAR_URL.to_string()),
        verification_token_hash: Some(hash_token(&verification_token)),
        created_at: chrono::Utc::now(),
    };
    state.run_db(move |db| db.create_user(&new_user)).await?;

    // Mail delivery hook: the token is what the verification link carries.
    info!(user_id = %user_id, email = %email, token = %verification_token, "Verification email queued");

    let token = create_token(&state, user_id, &handle, false)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            handle,
            token,
            email_verified: false,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || {
        ApiError::Unauthorized(
            "Invalid login credentials. Please check your email and password.".into(),
        )
    };

    let email = normalize_email(&req.email).map_err(|_| invalid())?;
    let user = state
        .run_db(move |db| db.get_credentials_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| ApiError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    if state.require_verified_email && !user.email_verified {
        return Err(ApiError::Permission(
            "Please verify your email before logging in.".into(),
        ));
    }

    let token = create_token(&state, user.id, &user.handle, user.email_verified)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        handle: user.handle,
        token,
    }))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token_hash = hash_token(req.token.trim());
    let user_id = state
        .run_db(move |db| db.verify_email(&token_hash))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound("Unknown or used verification token".into()),
            other => other,
        })?;

    info!(user_id = %user_id, "Email verified");
    Ok(Json(serde_json::json!({ "user_id": user_id, "email_verified": true })))
}

fn create_token(
    state: &AppStateInner,
    user_id: Uuid,
    handle: &str,
    email_verified: bool,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        handle: handle.to_string(),
        email_verified,
        exp: (chrono::Utc::now() + chrono::Duration::days(state.token_ttl_days)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))
}

fn new_verification_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Tokens are stored as their SHA-256 digest.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_tokens_are_unique_and_hashed() {
        let a = new_verification_token();
        let b = new_verification_token();
        assert_ne!(a, b);
        assert_eq!(hash_token(&a).len(), 64);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }
}
