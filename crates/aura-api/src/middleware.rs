use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use aura_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`] and passed explicitly into every workflow.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub handle: String,
}

/// Extract and validate the session JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

    let claims = decode_token(&state.jwt_secret, token)?;

    if state.require_verified_email && !claims.email_verified {
        return Err(ApiError::Permission(
            "Please verify your email before continuing.".into(),
        ));
    }

    req.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        handle: claims.handle,
    });
    Ok(next.run(req).await)
}

pub(crate) fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))
}
