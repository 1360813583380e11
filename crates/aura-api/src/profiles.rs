use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use aura_db::users::ProfileChanges;
use aura_types::api::{PublicProfile, SearchQuery, UpdateProfileRequest};
use aura_types::validate::{check_description, normalize_handle, optional_text};
use aura_types::{HeadToHead, Match, MatchStatus, UserProfile};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

const SEARCH_LIMIT: u32 = 20;

pub async fn update_profile(
    state: &AppState,
    current: &CurrentUser,
    req: UpdateProfileRequest,
) -> Result<UserProfile, ApiError> {
    let me = current.id;

    let handle = req.handle.as_deref().map(normalize_handle).transpose()?;
    if let Some(description) = &req.description {
        check_description(description)?;
    }

    if let Some(handle) = handle.clone() {
        let owner = state
            .run_db(move |db| db.find_handle(&handle, Some(me)))
            .await?;
        if owner.is_some() {
            return Err(ApiError::Conflict(
                "Handle already taken. Please choose another.".into(),
            ));
        }
    }

    let changes = ProfileChanges {
        handle,
        full_name: req.full_name.as_deref().map(optional_text),
        avatar_url: req.avatar_url.as_deref().map(optional_text),
        banner_url: req.banner_url.as_deref().map(optional_text),
        description: req.description.as_deref().map(optional_text),
    };
    let profile = state
        .run_db(move |db| db.update_profile(me, &changes))
        .await?;

    info!(user_id = %me, handle = %profile.handle, "Profile updated");
    Ok(profile)
}

/// Win/loss tally between `current_id` and `other_id` over their confirmed
/// matches in either seat.
pub async fn head_to_head(
    state: &AppState,
    current_id: Uuid,
    other_id: Uuid,
) -> Result<HeadToHead, ApiError> {
    if current_id == other_id {
        return Err(ApiError::Validation(
            "Head-to-head needs two different players.".into(),
        ));
    }

    let (as_reporter, as_opponent) = state
        .run_db(move |db| {
            Ok((
                db.list_matches_between(current_id, other_id, MatchStatus::Confirmed)?,
                db.list_matches_between(other_id, current_id, MatchStatus::Confirmed)?,
            ))
        })
        .await?;

    Ok(tally(current_id, as_reporter.into_iter().chain(as_opponent)))
}

fn tally(current_id: Uuid, matches: impl IntoIterator<Item = Match>) -> HeadToHead {
    let mut seen = HashSet::new();
    let mut h2h = HeadToHead::default();
    for game in matches.into_iter().filter(|m| seen.insert(m.id)) {
        h2h.total_played += 1;
        if game.outcome().0 == current_id {
            h2h.current_user_wins += 1;
        } else {
            h2h.other_user_wins += 1;
        }
    }
    h2h
}

// -- Handlers --

pub async fn get_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .run_db(move |db| db.get_user(current.id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(profile))
}

pub async fn patch_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = update_profile(&state, &current, req).await?;
    Ok(Json(profile))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .run_db(move |db| db.get_user(user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(PublicProfile::from(profile)))
}

pub async fn search(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query.q.trim().to_lowercase();
    if q.is_empty() {
        return Ok(Json(Vec::<PublicProfile>::new()));
    }

    let users = state
        .run_db(move |db| db.search_users(&q, current.id, SEARCH_LIMIT))
        .await?;
    Ok(Json(
        users.into_iter().map(PublicProfile::from).collect::<Vec<_>>(),
    ))
}

pub async fn get_head_to_head(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(other_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if state.run_db(move |db| db.get_user(other_id)).await?.is_none() {
        return Err(ApiError::not_found("User"));
    }
    let h2h = head_to_head(&state, current.id, other_id).await?;
    Ok(Json(h2h))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn game(id: Uuid, p1: Uuid, p2: Uuid, s1: u32, s2: u32) -> Match {
        Match {
            id,
            player1_id: p1,
            player2_id: p2,
            player1_name: "p1".into(),
            player2_name: "p2".into(),
            player1_score: s1,
            player2_score: s2,
            status: MatchStatus::Confirmed,
            winner_id: None,
            recap: None,
            created_at: Utc::now(),
            confirmed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn tally_counts_both_seats_once() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        let repeated = game(Uuid::new_v4(), me, other, 11, 7);

        let h2h = tally(
            me,
            vec![
                repeated.clone(),
                repeated,
                game(Uuid::new_v4(), other, me, 11, 4),
                game(Uuid::new_v4(), other, me, 3, 11),
            ],
        );

        assert_eq!(
            h2h,
            HeadToHead {
                current_user_wins: 2,
                other_user_wins: 1,
                total_played: 3,
            }
        );
    }

    #[test]
    fn no_matches_is_zero() {
        assert_eq!(tally(Uuid::new_v4(), Vec::new()), HeadToHead::default());
    }
}
