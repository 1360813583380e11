//! Match reporting and the confirm/reject workflow.
//!
//! A match is reported by player 1 and sits in `pending_player2` until
//! player 2 decides. Confirmation commits status, winner and both aura
//! totals in one store transaction; the recap is generated afterwards and
//! attached on a best-effort basis, so a failing generator never undoes a
//! confirmation. [`fill_recap`] retries that last step on demand.

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use aura_db::matches::{Confirmation, Seat};
use aura_recap::RecapRequest;
use aura_types::api::{
    CreateMatchRequest, CreateMatchResponse, HistoryQuery, ResolveMatchRequest,
    ResolveMatchResponse,
};
use aura_types::validate::check_scores;
use aura_types::{
    AURA_LOSS_DELTA, AURA_WIN_DELTA, Decision, Match, MatchStatus, NotificationKind,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::notifications::{Notice, notify};

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 100;

/// Records a match reported by `current` against a friend.
pub async fn create_match(
    state: &AppState,
    current: &CurrentUser,
    req: CreateMatchRequest,
) -> Result<Match, ApiError> {
    let (reporter_score, opponent_score) = check_scores(req.reporter_score, req.opponent_score)?;

    let reporter_id = current.id;
    let opponent_id = req.opponent_id;
    if opponent_id == reporter_id {
        return Err(ApiError::Validation(
            "You can't log a match against yourself.".into(),
        ));
    }

    let (reporter, opponent) = state
        .run_db(move |db| Ok((db.get_user(reporter_id)?, db.get_user(opponent_id)?)))
        .await?;
    let reporter =
        reporter.ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;
    let opponent = opponent.ok_or_else(|| ApiError::not_found("Opponent"))?;
    if !reporter.is_friend(opponent_id) {
        return Err(ApiError::Permission(
            "You can only log matches against your friends.".into(),
        ));
    }

    let game = Match {
        id: Uuid::new_v4(),
        player1_id: reporter_id,
        player2_id: opponent_id,
        player1_name: reporter.display_name().to_string(),
        player2_name: opponent.display_name().to_string(),
        player1_score: reporter_score,
        player2_score: opponent_score,
        status: MatchStatus::PendingPlayer2,
        winner_id: None,
        recap: None,
        created_at: Utc::now(),
        confirmed_at: None,
    };
    let stored = game.clone();
    state.run_db(move |db| db.insert_match(&stored)).await?;

    info!(
        match_id = %game.id,
        reporter = %reporter_id,
        opponent = %opponent_id,
        "Match reported"
    );

    notify(
        state,
        Notice {
            target: opponent_id,
            kind: NotificationKind::MatchInvite,
            message: format!(
                "{} has logged a match with you. Please confirm.",
                game.player1_name
            ),
            related_id: game.id,
            sender_id: Some(reporter_id),
            sender_name: Some(game.player1_name.clone()),
        },
    )
    .await;

    Ok(game)
}

/// Applies player 2's decision to a pending match.
///
/// Checks run in order: the match must exist, `current` must be player 2,
/// and the match must still be pending. The store repeats the pending check
/// inside the write, so two racing decisions cannot both land.
pub async fn resolve_match(
    state: &AppState,
    current: &CurrentUser,
    match_id: Uuid,
    decision: Decision,
) -> Result<ResolveMatchResponse, ApiError> {
    let game = state
        .run_db(move |db| db.get_match(match_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Match"))?;

    if game.player2_id != current.id {
        return Err(ApiError::Permission(
            "Only the invited opponent can confirm or reject this match.".into(),
        ));
    }
    if game.status.is_terminal() {
        return Err(ApiError::InvalidState(format!(
            "This match has already been resolved ({}).",
            game.status
        )));
    }

    match decision {
        Decision::Reject => {
            let game = state.run_db(move |db| db.reject_match(match_id)).await?;
            notify(
                state,
                Notice {
                    target: game.player1_id,
                    kind: NotificationKind::MatchRejected,
                    message: format!(
                        "{} rejected the match you reported ({}-{}).",
                        game.player2_name, game.player1_score, game.player2_score
                    ),
                    related_id: game.id,
                    sender_id: Some(current.id),
                    sender_name: Some(game.player2_name.clone()),
                },
            )
            .await;
            Ok(ResolveMatchResponse {
                game,
                recap_error: None,
            })
        }
        Decision::Confirm => {
            let (winner_id, loser_id) = game.outcome();
            let confirmation = Confirmation {
                match_id,
                winner_id,
                loser_id,
                win_delta: AURA_WIN_DELTA,
                loss_delta: AURA_LOSS_DELTA,
                confirmed_at: Utc::now(),
            };
            let mut game = state
                .run_db(move |db| db.confirm_match(&confirmation))
                .await?;

            let recap_error = match generate_recap(state, &game).await {
                Ok(attached) => {
                    game.recap = Some(attached.recap);
                    None
                }
                Err(e) => {
                    warn!(match_id = %match_id, error = %e, "Match confirmed without recap");
                    Some(e.to_string())
                }
            };

            let (kind, message) = if game.recap.is_some() {
                (
                    NotificationKind::RecapReady,
                    format!("{} confirmed your match. The recap is ready!", game.player2_name),
                )
            } else {
                (
                    NotificationKind::MatchConfirmed,
                    format!("{} confirmed your match.", game.player2_name),
                )
            };
            notify(
                state,
                Notice {
                    target: game.player1_id,
                    kind,
                    message,
                    related_id: game.id,
                    sender_id: Some(current.id),
                    sender_name: Some(game.player2_name.clone()),
                },
            )
            .await;

            Ok(ResolveMatchResponse { game, recap_error })
        }
    }
}

/// Generates and attaches the recap of a confirmed match that has none.
/// A match that already carries a recap is returned unchanged.
pub async fn fill_recap(
    state: &AppState,
    current: &CurrentUser,
    match_id: Uuid,
) -> Result<Match, ApiError> {
    let mut game = state
        .run_db(move |db| db.get_match(match_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Match"))?;

    if !game.is_participant(current.id) {
        return Err(ApiError::Permission(
            "Only the players of this match can request its recap.".into(),
        ));
    }
    if game.status != MatchStatus::Confirmed {
        return Err(ApiError::InvalidState(
            "Recaps are only generated for confirmed matches.".into(),
        ));
    }
    if game.recap.is_some() {
        return Ok(game);
    }

    let attached = generate_recap(state, &game).await?;
    game.recap = Some(attached.recap);

    if attached.fresh {
        notify(
            state,
            Notice {
                target: game.player1_id,
                kind: NotificationKind::RecapReady,
                message: format!(
                    "The recap of your match against {} is ready!",
                    game.player2_name
                ),
                related_id: game.id,
                sender_id: None,
                sender_name: None,
            },
        )
        .await;
    }

    Ok(game)
}

/// Confirmed matches where `user_id` sat in either seat, most recently
/// confirmed first.
pub async fn list_confirmed_matches(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<Match>, ApiError> {
    let (reported, received) = state
        .run_db(move |db| {
            Ok((
                db.list_matches_in_seat(user_id, Seat::Player1, MatchStatus::Confirmed)?,
                db.list_matches_in_seat(user_id, Seat::Player2, MatchStatus::Confirmed)?,
            ))
        })
        .await?;
    Ok(merge_history(reported, received))
}

struct AttachedRecap {
    recap: String,
    /// False when another request attached a recap first.
    fresh: bool,
}

async fn generate_recap(state: &AppState, game: &Match) -> Result<AttachedRecap, ApiError> {
    let request = RecapRequest {
        player1_name: game.player1_name.clone(),
        player2_name: game.player2_name.clone(),
        player1_score: game.player1_score,
        player2_score: game.player2_score,
    };
    let recap = state
        .recap
        .generate(&request)
        .await
        .map_err(|e| ApiError::ExternalService(e.to_string()))?;

    let match_id = game.id;
    let text = recap.clone();
    if state.run_db(move |db| db.attach_recap(match_id, &text)).await? {
        info!(match_id = %match_id, "Recap attached");
        return Ok(AttachedRecap { recap, fresh: true });
    }

    let existing = state
        .run_db(move |db| db.get_match(match_id))
        .await?
        .and_then(|m| m.recap)
        .ok_or_else(|| ApiError::InvalidState("Match is no longer confirmed.".into()))?;
    Ok(AttachedRecap {
        recap: existing,
        fresh: false,
    })
}

pub(crate) fn merge_history(reported: Vec<Match>, received: Vec<Match>) -> Vec<Match> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Match> = reported
        .into_iter()
        .chain(received)
        .filter(|m| seen.insert(m.id))
        .collect();
    merged.sort_by(|a, b| b.confirmed_at.cmp(&a.confirmed_at));
    merged
}

// -- Handlers --

pub async fn post_match(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let game = create_match(&state, &current, req).await?;
    Ok((StatusCode::CREATED, Json(CreateMatchResponse { match_id: game.id })))
}

pub async fn get_match(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state
        .run_db(move |db| db.get_match(match_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Match"))?;
    if !game.is_participant(current.id) {
        return Err(ApiError::Permission("You are not a player in this match.".into()));
    }
    Ok(Json(game))
}

/// Matches waiting on the caller's decision, newest first.
pub async fn get_pending(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let pending = state
        .run_db(move |db| {
            db.list_matches_in_seat(current.id, Seat::Player2, MatchStatus::PendingPlayer2)
        })
        .await?;
    Ok(Json(pending))
}

pub async fn post_resolve(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<ResolveMatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resolved = resolve_match(&state, &current, match_id, req.decision).await?;
    Ok(Json(resolved))
}

pub async fn post_recap(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let game = fill_recap(&state, &current, match_id).await?;
    Ok(Json(game))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    if state.run_db(move |db| db.get_user(user_id)).await?.is_none() {
        return Err(ApiError::not_found("User"));
    }

    let mut history = list_confirmed_matches(&state, user_id).await?;
    history.truncate(limit);
    Ok(Json(history))
}
