mod common;

use axum::{Extension, Json, extract::{Path, State}, response::IntoResponse};
use aura_api::ApiError;
use aura_api::friends::{respond_friend_request, send_friend_request};
use aura_api::matches::{create_match, resolve_match};
use aura_api::notifications::{mark_read, resolve_from_notification};
use aura_types::api::{CreateMatchRequest, ResolveMatchRequest};
use aura_types::{Decision, FriendRequestStatus, FriendResponse, MatchStatus, NotificationKind};

use common::{ScriptedRecap, aura, befriend, state_with, user};

#[tokio::test]
async fn accepted_request_links_both_users() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b) = (user(&state, "alice"), user(&state, "bruno"));

    let request = send_friend_request(&state, &a, b.id).await.unwrap();
    assert_eq!(request.status, FriendRequestStatus::Pending);

    let incoming = state.db.list_notifications(b.id).unwrap();
    assert_eq!(incoming[0].kind, NotificationKind::FriendRequest);
    assert_eq!(incoming[0].related_id, a.id);

    let accepted = respond_friend_request(&state, &b, request.id, FriendResponse::Accept)
        .await
        .unwrap();
    assert_eq!(accepted.status, FriendRequestStatus::Accepted);

    let alice = state.db.get_user(a.id).unwrap().unwrap();
    let bruno = state.db.get_user(b.id).unwrap().unwrap();
    assert!(alice.is_friend(b.id));
    assert!(bruno.is_friend(a.id));
    assert_eq!(alice.friends.len(), 1);

    let for_a = state.db.list_notifications(a.id).unwrap();
    assert_eq!(for_a[0].kind, NotificationKind::FriendAccepted);

    let again = respond_friend_request(&state, &b, request.id, FriendResponse::Accept).await;
    assert!(matches!(again, Err(ApiError::InvalidState(_))));
    assert_eq!(state.db.get_user(a.id).unwrap().unwrap().friends.len(), 1);
}

#[tokio::test]
async fn duplicate_requests_conflict_in_either_direction() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b, c) = (
        user(&state, "alice"),
        user(&state, "bruno"),
        user(&state, "carla"),
    );

    send_friend_request(&state, &a, b.id).await.unwrap();
    assert!(matches!(
        send_friend_request(&state, &a, b.id).await,
        Err(ApiError::Conflict(_))
    ));
    assert!(matches!(
        send_friend_request(&state, &b, a.id).await,
        Err(ApiError::Conflict(_))
    ));

    befriend(&state, &a, &c);
    assert!(matches!(
        send_friend_request(&state, &c, a.id).await,
        Err(ApiError::Conflict(_))
    ));

    assert!(matches!(
        send_friend_request(&state, &a, a.id).await,
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        send_friend_request(&state, &a, uuid::Uuid::new_v4()).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn only_recipient_answers_and_decline_keeps_strangers() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b) = (user(&state, "alice"), user(&state, "bruno"));

    let request = send_friend_request(&state, &a, b.id).await.unwrap();
    assert!(matches!(
        respond_friend_request(&state, &a, request.id, FriendResponse::Accept).await,
        Err(ApiError::Permission(_))
    ));

    let declined = respond_friend_request(&state, &b, request.id, FriendResponse::Decline)
        .await
        .unwrap();
    assert_eq!(declined.status, FriendRequestStatus::Declined);
    assert!(state.db.get_user(a.id).unwrap().unwrap().friends.is_empty());
    assert!(state.db.get_user(b.id).unwrap().unwrap().friends.is_empty());
}

#[tokio::test]
async fn match_invite_resolves_from_notification() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b) = (user(&state, "alice"), user(&state, "bruno"));
    befriend(&state, &a, &b);

    let game = create_match(
        &state,
        &a,
        CreateMatchRequest {
            opponent_id: b.id,
            reporter_score: 11,
            opponent_score: 7,
        },
    )
    .await
    .unwrap();
    let invite = state.db.list_notifications(b.id).unwrap().remove(0);
    assert_eq!(invite.kind, NotificationKind::MatchInvite);

    // Someone else's notification.
    let denied = resolve_from_notification(
        State(state.clone()),
        Extension(a.clone()),
        Path(invite.id),
        Json(ResolveMatchRequest {
            decision: Decision::Confirm,
        }),
    )
    .await;
    assert!(matches!(denied, Err(ApiError::Permission(_))));

    resolve_from_notification(
        State(state.clone()),
        Extension(b.clone()),
        Path(invite.id),
        Json(ResolveMatchRequest {
            decision: Decision::Confirm,
        }),
    )
    .await
    .unwrap()
    .into_response();

    let stored = state.db.get_match(game.id).unwrap().unwrap();
    assert_eq!(stored.status, MatchStatus::Confirmed);
    assert_eq!(aura(&state, &a), 10);

    let closed = state.db.get_notification(invite.id).unwrap().unwrap();
    assert!(closed.is_read);
    assert_eq!(closed.message, "You confirmed this match.");
}

#[tokio::test]
async fn invite_for_a_decided_match_is_closed() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b) = (user(&state, "alice"), user(&state, "bruno"));
    befriend(&state, &a, &b);

    let game = create_match(
        &state,
        &a,
        CreateMatchRequest {
            opponent_id: b.id,
            reporter_score: 11,
            opponent_score: 7,
        },
    )
    .await
    .unwrap();
    let invite = state.db.list_notifications(b.id).unwrap().remove(0);

    // Decided from the match page first.
    resolve_match(&state, &b, game.id, Decision::Reject).await.unwrap();

    let stale = resolve_from_notification(
        State(state.clone()),
        Extension(b.clone()),
        Path(invite.id),
        Json(ResolveMatchRequest {
            decision: Decision::Confirm,
        }),
    )
    .await;
    assert!(matches!(stale, Err(ApiError::InvalidState(_))));

    let closed = state.db.get_notification(invite.id).unwrap().unwrap();
    assert!(closed.is_read);
    assert_eq!(closed.message, "This match was already resolved.");
    assert_eq!(aura(&state, &a), 0);
}

#[tokio::test]
async fn non_invites_cannot_be_resolved() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b) = (user(&state, "alice"), user(&state, "bruno"));
    send_friend_request(&state, &a, b.id).await.unwrap();
    let notice = state.db.list_notifications(b.id).unwrap().remove(0);

    let result = resolve_from_notification(
        State(state.clone()),
        Extension(b.clone()),
        Path(notice.id),
        Json(ResolveMatchRequest {
            decision: Decision::Reject,
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn mark_read_is_recipient_only_and_idempotent() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b) = (user(&state, "alice"), user(&state, "bruno"));
    send_friend_request(&state, &a, b.id).await.unwrap();
    let notice = state.db.list_notifications(b.id).unwrap().remove(0);

    let denied = mark_read(State(state.clone()), Extension(a.clone()), Path(notice.id)).await;
    assert!(matches!(denied, Err(ApiError::Permission(_))));
    assert_eq!(state.db.unread_notification_count(b.id).unwrap(), 1);

    for _ in 0..2 {
        assert!(
            mark_read(State(state.clone()), Extension(b.clone()), Path(notice.id))
                .await
                .is_ok()
        );
    }
    assert_eq!(state.db.unread_notification_count(b.id).unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_accepts_link_friends_once() {
    let state = state_with(ScriptedRecap::ok("recap"));
    let (a, b) = (user(&state, "alice"), user(&state, "bruno"));
    let request_id = send_friend_request(&state, &a, b.id).await.unwrap().id;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let (state, b) = (state.clone(), b.clone());
            tokio::spawn(async move {
                respond_friend_request(&state, &b, request_id, FriendResponse::Accept).await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert!(matches!(e, ApiError::InvalidState(_)), "unexpected {e:?}"),
        }
    }
    assert_eq!(accepted, 1);

    let alice = state.db.get_user(a.id).unwrap().unwrap();
    let bruno = state.db.get_user(b.id).unwrap().unwrap();
    assert_eq!(alice.friends.len(), 1);
    assert_eq!(bruno.friends.len(), 1);
    assert_eq!(state.db.list_friends(a.id).unwrap().len(), 1);

    let accepted_notes = state
        .db
        .list_notifications(a.id)
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::FriendAccepted)
        .count();
    assert_eq!(accepted_notes, 1);
}
