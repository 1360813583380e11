use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use aura_db::models::FriendRequestWithUser;
use aura_types::api::{FriendRequestView, PublicProfile, RespondFriendRequest, SendFriendRequest};
use aura_types::{FriendRequest, FriendRequestStatus, FriendResponse, NotificationKind};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::notifications::{Notice, notify};

pub async fn send_friend_request(
    state: &AppState,
    current: &CurrentUser,
    to_user_id: Uuid,
) -> Result<FriendRequest, ApiError> {
    if to_user_id == current.id {
        return Err(ApiError::Validation(
            "You can't send a friend request to yourself.".into(),
        ));
    }

    let from = current.id;
    let (sender, recipient) = state
        .run_db(move |db| Ok((db.get_user(from)?, db.get_user(to_user_id)?)))
        .await?;
    let sender = sender.ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;
    if recipient.is_none() {
        return Err(ApiError::not_found("User"));
    }

    let request = state
        .run_db(move |db| db.create_friend_request(Uuid::new_v4(), from, to_user_id, Utc::now()))
        .await?;
    info!(request_id = %request.id, from = %from, to = %to_user_id, "Friend request sent");

    let sender_name = sender.display_name().to_string();
    notify(
        state,
        Notice {
            target: to_user_id,
            kind: NotificationKind::FriendRequest,
            message: format!("{} sent you a friend request.", sender_name),
            related_id: from,
            sender_id: Some(from),
            sender_name: Some(sender_name),
        },
    )
    .await;

    Ok(request)
}

pub async fn respond_friend_request(
    state: &AppState,
    current: &CurrentUser,
    request_id: Uuid,
    response: FriendResponse,
) -> Result<FriendRequest, ApiError> {
    let request = state
        .run_db(move |db| db.get_friend_request(request_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Friend request"))?;

    if request.to_user_id != current.id {
        return Err(ApiError::Permission(
            "Only the recipient can answer this friend request.".into(),
        ));
    }
    if request.status != FriendRequestStatus::Pending {
        return Err(ApiError::InvalidState(format!(
            "Friend request is already {}",
            request.status.as_str()
        )));
    }

    let status = response.resulting_status();
    let request = state
        .run_db(move |db| db.respond_friend_request(request_id, status, Utc::now()))
        .await?;

    if status == FriendRequestStatus::Accepted {
        let me = current.id;
        let name = state
            .run_db(move |db| db.get_user(me))
            .await?
            .map(|u| u.display_name().to_string())
            .unwrap_or_else(|| current.handle.clone());
        notify(
            state,
            Notice {
                target: request.from_user_id,
                kind: NotificationKind::FriendAccepted,
                message: format!("{} accepted your friend request.", name),
                related_id: me,
                sender_id: Some(me),
                sender_name: Some(name),
            },
        )
        .await;
    }

    Ok(request)
}

fn to_view(row: FriendRequestWithUser) -> FriendRequestView {
    let other_display_name = row
        .other_full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&row.other_handle)
        .to_string();
    FriendRequestView {
        id: row.request.id,
        from_user_id: row.request.from_user_id,
        to_user_id: row.request.to_user_id,
        other_handle: row.other_handle,
        other_display_name,
        status: row.request.status,
        created_at: row.request.created_at,
    }
}

// -- Handlers --

pub async fn post_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendFriendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = send_friend_request(&state, &current, req.to_user_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn post_respond(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<RespondFriendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = respond_friend_request(&state, &current, request_id, req.response).await?;
    Ok(Json(request))
}

pub async fn get_friends(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.run_db(move |db| db.list_friends(current.id)).await?;
    let friends: Vec<PublicProfile> = friends.into_iter().map(PublicProfile::from).collect();
    Ok(Json(friends))
}

pub async fn get_incoming(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .run_db(move |db| db.incoming_friend_requests(current.id))
        .await?;
    Ok(Json(rows.into_iter().map(to_view).collect::<Vec<_>>()))
}

pub async fn get_sent(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .run_db(move |db| db.sent_friend_requests(current.id))
        .await?;
    Ok(Json(rows.into_iter().map(to_view).collect::<Vec<_>>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(full_name: Option<&str>) -> FriendRequestWithUser {
        FriendRequestWithUser {
            request: FriendRequest {
                id: Uuid::new_v4(),
                from_user_id: Uuid::new_v4(),
                to_user_id: Uuid::new_v4(),
                status: FriendRequestStatus::Pending,
                created_at: Utc::now(),
            },
            other_handle: "hooper".into(),
            other_full_name: full_name.map(String::from),
        }
    }

    #[test]
    fn view_prefers_full_name() {
        assert_eq!(to_view(row(Some("Ana Ruiz"))).other_display_name, "Ana Ruiz");
        assert_eq!(to_view(row(Some("   "))).other_display_name, "hooper");
        assert_eq!(to_view(row(None)).other_display_name, "hooper");
    }
}
