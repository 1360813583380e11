use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::info;
use uuid::Uuid;

use aura_types::{Match, MatchStatus};

use crate::error::OptionalExt;
use crate::models::{MATCH_COLUMNS, MatchRow, ts};
use crate::{Database, Result, StoreError};

/// Which side of a match a user sat on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Player1,
    Player2,
}

impl Seat {
    fn column(&self) -> &'static str {
        match self {
            Self::Player1 => "player1_id",
            Self::Player2 => "player2_id",
        }
    }
}

/// Everything the confirmation batch writes.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub match_id: Uuid,
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    pub win_delta: i64,
    pub loss_delta: i64,
    pub confirmed_at: DateTime<Utc>,
}

impl Database {
    pub fn insert_match(&self, game: &Match) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO matches (id, player1_id, player2_id, player1_name, player2_name,
                                      player1_score, player2_score, status, winner_id, recap,
                                      created_at, confirmed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    game.id.to_string(),
                    game.player1_id.to_string(),
                    game.player2_id.to_string(),
                    game.player1_name,
                    game.player2_name,
                    game.player1_score,
                    game.player2_score,
                    game.status.as_str(),
                    game.winner_id.map(|id| id.to_string()),
                    game.recap,
                    ts(&game.created_at),
                    game.confirmed_at.as_ref().map(ts),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_match(&self, id: Uuid) -> Result<Option<Match>> {
        self.with_conn(|conn| query_match(conn, id))
    }

    /// Matches where `user_id` sat in `seat` with the given status, most
    /// recently resolved (or created, while pending) first.
    pub fn list_matches_in_seat(
        &self,
        user_id: Uuid,
        seat: Seat,
        status: MatchStatus,
    ) -> Result<Vec<Match>> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE {} = ?1 AND status = ?2
             ORDER BY COALESCE(confirmed_at, created_at) DESC",
            seat.column()
        );
        self.with_conn(|conn| {
            query_matches(conn, &sql, params![user_id.to_string(), status.as_str()])
        })
    }

    /// Matches with `player1_id` as reporter and `player2_id` as opponent.
    pub fn list_matches_between(
        &self,
        player1_id: Uuid,
        player2_id: Uuid,
        status: MatchStatus,
    ) -> Result<Vec<Match>> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE player1_id = ?1 AND player2_id = ?2 AND status = ?3"
        );
        self.with_conn(|conn| {
            query_matches(
                conn,
                &sql,
                params![player1_id.to_string(), player2_id.to_string(), status.as_str()],
            )
        })
    }

    /// The confirmation batch: match status, winner, timestamp and both aura
    /// totals commit together or not at all.
    ///
    /// The status update is conditional on the match still being pending, so
    /// a second confirmation (or a confirm racing a reject) finds zero rows
    /// and the whole batch rolls back with `InvalidState`.
    pub fn confirm_match(&self, c: &Confirmation) -> Result<Match> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE matches SET status = ?2, winner_id = ?3, confirmed_at = ?4
                 WHERE id = ?1 AND status = ?5",
                params![
                    c.match_id.to_string(),
                    MatchStatus::Confirmed.as_str(),
                    c.winner_id.to_string(),
                    ts(&c.confirmed_at),
                    MatchStatus::PendingPlayer2.as_str(),
                ],
            )?;
            if updated == 0 {
                return Err(not_pending(&tx, c.match_id));
            }

            apply_aura(&tx, c.winner_id, c.win_delta)?;
            apply_aura(&tx, c.loser_id, c.loss_delta)?;

            let game = query_match(&tx, c.match_id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;

            info!(
                match_id = %c.match_id,
                winner = %c.winner_id,
                loser = %c.loser_id,
                "Match confirmed"
            );
            Ok(game)
        })
    }

    /// Moves a pending match to `rejected_by_player2`. No aura changes.
    pub fn reject_match(&self, id: Uuid) -> Result<Match> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE matches SET status = ?2 WHERE id = ?1 AND status = ?3",
                params![
                    id.to_string(),
                    MatchStatus::RejectedByPlayer2.as_str(),
                    MatchStatus::PendingPlayer2.as_str(),
                ],
            )?;
            if updated == 0 {
                return Err(not_pending(&tx, id));
            }

            let game = query_match(&tx, id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;

            info!(match_id = %id, "Match rejected");
            Ok(game)
        })
    }

    /// Stores `recap` on a confirmed match that has none yet. Returns false
    /// when a recap was already present, leaving it untouched.
    pub fn attach_recap(&self, id: Uuid, recap: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE matches SET recap = ?2
                 WHERE id = ?1 AND status = ?3 AND recap IS NULL",
                params![id.to_string(), recap, MatchStatus::Confirmed.as_str()],
            )?;
            Ok(updated == 1)
        })
    }
}

fn apply_aura(conn: &Connection, user_id: Uuid, delta: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE users SET aura = aura + ?2 WHERE id = ?1",
        params![user_id.to_string(), delta],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Explains why a conditional status update matched no rows.
fn not_pending(conn: &Connection, id: Uuid) -> StoreError {
    match query_match(conn, id) {
        Ok(Some(game)) => StoreError::InvalidState(format!("Match is already {}", game.status)),
        Ok(None) => StoreError::NotFound,
        Err(e) => e,
    }
}

fn query_match(conn: &Connection, id: Uuid) -> Result<Option<Match>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1");
    conn.query_row(&sql, [id.to_string()], MatchRow::from_row)
        .optional()?
        .map(MatchRow::into_match)
        .transpose()
}

fn query_matches(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Match>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, MatchRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(MatchRow::into_match).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::user;

    fn pending(db: &Database, p1: Uuid, p2: Uuid, s1: u32, s2: u32) -> Match {
        let game = Match {
            id: Uuid::new_v4(),
            player1_id: p1,
            player2_id: p2,
            player1_name: "p1".into(),
            player2_name: "p2".into(),
            player1_score: s1,
            player2_score: s2,
            status: MatchStatus::PendingPlayer2,
            winner_id: None,
            recap: None,
            created_at: Utc::now(),
            confirmed_at: None,
        };
        db.insert_match(&game).unwrap();
        game
    }

    fn confirmation(game: &Match) -> Confirmation {
        let (winner_id, loser_id) = game.outcome();
        Confirmation {
            match_id: game.id,
            winner_id,
            loser_id,
            win_delta: 10,
            loss_delta: -5,
            confirmed_at: Utc::now(),
        }
    }

    fn aura(db: &Database, id: Uuid) -> i64 {
        db.get_user(id).unwrap().unwrap().aura
    }

    #[test]
    fn insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let game = pending(&db, a, b, 11, 7);

        let stored = db.get_match(game.id).unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::PendingPlayer2);
        assert_eq!(stored.winner_id, None);
        assert_eq!(stored.player1_score, 11);
        assert!(db.get_match(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn tied_scores_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let mut game = pending(&db, a, b, 1, 2);
        game.id = Uuid::new_v4();
        game.player2_score = 1;
        assert!(db.insert_match(&game).is_err());
    }

    #[test]
    fn confirm_updates_match_and_aura_together() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let game = pending(&db, a, b, 11, 7);

        let confirmed = db.confirm_match(&confirmation(&game)).unwrap();
        assert_eq!(confirmed.status, MatchStatus::Confirmed);
        assert_eq!(confirmed.winner_id, Some(a));
        assert!(confirmed.confirmed_at.is_some());
        assert_eq!(aura(&db, a), 10);
        // no floor at zero
        assert_eq!(aura(&db, b), -5);
    }

    #[test]
    fn second_confirm_is_invalid_state_and_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let game = pending(&db, a, b, 11, 7);

        db.confirm_match(&confirmation(&game)).unwrap();
        let err = db.confirm_match(&confirmation(&game)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
        assert_eq!(aura(&db, a), 10);
        assert_eq!(aura(&db, b), -5);
    }

    #[test]
    fn failed_aura_write_rolls_back_status() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let game = pending(&db, a, b, 11, 7);

        let mut c = confirmation(&game);
        c.loser_id = Uuid::new_v4();
        assert!(matches!(db.confirm_match(&c), Err(StoreError::NotFound)));

        let stored = db.get_match(game.id).unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::PendingPlayer2);
        assert_eq!(stored.winner_id, None);
        assert_eq!(aura(&db, a), 0);
    }

    #[test]
    fn reject_leaves_aura_alone() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let game = pending(&db, a, b, 11, 7);

        let rejected = db.reject_match(game.id).unwrap();
        assert_eq!(rejected.status, MatchStatus::RejectedByPlayer2);
        assert_eq!(aura(&db, a), 0);
        assert_eq!(aura(&db, b), 0);

        assert!(matches!(
            db.confirm_match(&confirmation(&game)),
            Err(StoreError::InvalidState(_))
        ));
        assert!(matches!(db.reject_match(Uuid::new_v4()), Err(StoreError::NotFound)));
    }

    #[test]
    fn recap_attaches_once_and_only_when_confirmed() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let game = pending(&db, a, b, 11, 7);

        assert!(!db.attach_recap(game.id, "too early").unwrap());

        db.confirm_match(&confirmation(&game)).unwrap();
        assert!(db.attach_recap(game.id, "first").unwrap());
        assert!(!db.attach_recap(game.id, "second").unwrap());
        assert_eq!(db.get_match(game.id).unwrap().unwrap().recap.as_deref(), Some("first"));
    }

    #[test]
    fn seat_queries_filter_by_status() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let first = pending(&db, a, b, 11, 7);
        let second = pending(&db, b, a, 3, 21);
        pending(&db, a, b, 5, 2);

        db.confirm_match(&confirmation(&first)).unwrap();
        db.confirm_match(&confirmation(&second)).unwrap();

        let as_p1 = db.list_matches_in_seat(a, Seat::Player1, MatchStatus::Confirmed).unwrap();
        assert_eq!(as_p1.len(), 1);
        assert_eq!(as_p1[0].id, first.id);

        let as_p2 = db.list_matches_in_seat(a, Seat::Player2, MatchStatus::Confirmed).unwrap();
        assert_eq!(as_p2.len(), 1);
        assert_eq!(as_p2[0].id, second.id);

        let waiting = db.list_matches_in_seat(b, Seat::Player2, MatchStatus::PendingPlayer2).unwrap();
        assert_eq!(waiting.len(), 1);

        let between = db.list_matches_between(a, b, MatchStatus::Confirmed).unwrap();
        assert_eq!(between.len(), 1);
    }
}
