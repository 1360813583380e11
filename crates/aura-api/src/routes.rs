use axum::{
    Json, Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{friends, matches, notifications, profiles};

/// The full HTTP surface. Everything outside `/auth` and `/health` needs a
/// bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/users/me", get(profiles::get_me).patch(profiles::patch_me))
        .route("/users/search", get(profiles::search))
        .route("/users/{id}", get(profiles::get_profile))
        .route("/users/{id}/matches", get(matches::get_history))
        .route("/users/{id}/head-to-head", get(profiles::get_head_to_head))
        .route("/matches", post(matches::post_match))
        .route("/matches/pending", get(matches::get_pending))
        .route("/matches/{id}", get(matches::get_match))
        .route("/matches/{id}/resolve", post(matches::post_resolve))
        .route("/matches/{id}/recap", post(matches::post_recap))
        .route("/friends", get(friends::get_friends))
        .route("/friends/requests", get(friends::get_incoming).post(friends::post_request))
        .route("/friends/requests/sent", get(friends::get_sent))
        .route("/friends/requests/{id}/respond", post(friends::post_respond))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route(
            "/notifications/{id}/resolve",
            post(notifications::resolve_from_notification),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
