//! Notification fan-out and the recipient-facing inbox.
//!
//! [`notify`] is fire-and-forget: the action that triggered it has already
//! committed, so a failed insert is logged and dropped.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{debug, warn};
use uuid::Uuid;

use aura_types::api::{ResolveMatchRequest, UnreadCount};
use aura_types::{Decision, MatchStatus, Notification, NotificationKind};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::matches::resolve_match;
use crate::middleware::CurrentUser;

/// One notification to append for `target`.
#[derive(Debug, Clone)]
pub struct Notice {
    pub target: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub related_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub sender_name: Option<String>,
}

pub async fn notify(state: &AppState, notice: Notice) {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: notice.target,
        kind: notice.kind,
        message: notice.message,
        related_id: notice.related_id,
        is_read: false,
        sender_id: notice.sender_id,
        sender_name: notice.sender_name,
        created_at: chrono::Utc::now(),
    };
    let (target, kind) = (notification.user_id, notification.kind);

    match state
        .run_db(move |db| db.insert_notification(&notification))
        .await
    {
        Ok(()) => debug!(user_id = %target, kind = %kind.as_str(), "Notification queued"),
        Err(e) => warn!(
            user_id = %target,
            kind = %kind.as_str(),
            error = %e,
            "Failed to write notification"
        ),
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = state
        .run_db(move |db| db.list_notifications(current.id))
        .await?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let unread = state
        .run_db(move |db| db.unread_notification_count(current.id))
        .await?;
    Ok(Json(UnreadCount { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let notification = owned_notification(&state, &current, notification_id).await?;
    if !notification.is_read {
        state
            .run_db(move |db| db.mark_notification_read(notification_id))
            .await?;
    }
    Ok(Json(serde_json::json!({ "id": notification_id, "is_read": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .run_db(move |db| db.mark_all_notifications_read(current.id))
        .await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// Confirm or reject a match straight from its invite.
pub async fn resolve_from_notification(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(notification_id): Path<Uuid>,
    Json(req): Json<ResolveMatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let notification = owned_notification(&state, &current, notification_id).await?;
    if notification.kind != NotificationKind::MatchInvite {
        return Err(ApiError::Validation(
            "Only match invites can be resolved from a notification".into(),
        ));
    }

    let result = resolve_match(&state, &current, notification.related_id, req.decision).await;
    let resolved = match result {
        Ok(resolved) => resolved,
        Err(e @ ApiError::InvalidState(_)) => {
            // Decided elsewhere; the invite must not stay actionable.
            close_invite(&state, notification_id, "This match was already resolved.").await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let outcome = match (req.decision, resolved.game.status) {
        (Decision::Confirm, MatchStatus::Confirmed) => "You confirmed this match.",
        _ => "You rejected this match.",
    };
    close_invite(&state, notification_id, outcome).await;

    Ok(Json(resolved))
}

async fn close_invite(state: &AppState, notification_id: Uuid, message: &'static str) {
    if let Err(e) = state
        .run_db(move |db| db.close_notification(notification_id, message))
        .await
    {
        warn!(notification_id = %notification_id, error = %e, "Failed to close match invite");
    }
}

async fn owned_notification(
    state: &AppState,
    current: &CurrentUser,
    notification_id: Uuid,
) -> Result<Notification, ApiError> {
    let notification = state
        .run_db(move |db| db.get_notification(notification_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;
    if notification.user_id != current.id {
        return Err(ApiError::Permission(
            "This notification belongs to another user".into(),
        ));
    }
    Ok(notification)
}
