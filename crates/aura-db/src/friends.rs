use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use tracing::info;
use uuid::Uuid;

use aura_types::{FriendRequest, FriendRequestStatus};

use crate::error::OptionalExt;
use crate::models::{FRIEND_REQUEST_COLUMNS, FriendRequestRow, FriendRequestWithUser, ts};
use crate::{Database, Result, StoreError};

impl Database {
    /// Inserts a pending request unless the pair are already friends or a
    /// request exists in either direction. Check and insert share one
    /// immediate transaction, so two concurrent sends cannot both succeed.
    pub fn create_friend_request(
        &self,
        id: Uuid,
        from: Uuid,
        to: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<FriendRequest> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (from_s, to_s) = (from.to_string(), to.to_string());

            let already_friends: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
                    [&from_s, &to_s],
                    |row| row.get(0),
                )
                .optional()?;
            if already_friends.is_some() {
                return Err(StoreError::Conflict(
                    "You are already friends with this user.".into(),
                ));
            }

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM friend_requests
                     WHERE (from_user_id = ?1 AND to_user_id = ?2)
                        OR (from_user_id = ?2 AND to_user_id = ?1)
                     LIMIT 1",
                    [&from_s, &to_s],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::Conflict(
                    "A friend request already exists or is pending with this user.".into(),
                ));
            }

            tx.execute(
                "INSERT INTO friend_requests (id, from_user_id, to_user_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    from_s,
                    to_s,
                    FriendRequestStatus::Pending.as_str(),
                    ts(&created_at),
                ],
            )?;
            let request = query_request(&tx, id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;
            Ok(request)
        })
    }

    pub fn get_friend_request(&self, id: Uuid) -> Result<Option<FriendRequest>> {
        self.with_conn(|conn| query_request(conn, id))
    }

    /// Moves a pending request to `status`. Accepting also inserts both
    /// friendship edges in the same transaction; edges are insert-or-ignore
    /// so each user appears in the other's set exactly once.
    pub fn respond_friend_request(
        &self,
        id: Uuid,
        status: FriendRequestStatus,
        responded_at: DateTime<Utc>,
    ) -> Result<FriendRequest> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let at = ts(&responded_at);

            let updated = tx.execute(
                "UPDATE friend_requests SET status = ?2, responded_at = ?3
                 WHERE id = ?1 AND status = ?4",
                params![
                    id.to_string(),
                    status.as_str(),
                    at,
                    FriendRequestStatus::Pending.as_str(),
                ],
            )?;

            let request = query_request(&tx, id)?.ok_or(StoreError::NotFound)?;
            if updated == 0 {
                return Err(StoreError::InvalidState(format!(
                    "Friend request is already {}",
                    request.status.as_str()
                )));
            }

            if status == FriendRequestStatus::Accepted {
                let (a, b) = (request.from_user_id.to_string(), request.to_user_id.to_string());
                for (user, friend) in [(&a, &b), (&b, &a)] {
                    tx.execute(
                        "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at)
                         VALUES (?1, ?2, ?3)",
                        params![user, friend, at],
                    )?;
                }
            }

            tx.commit()?;
            info!(request_id = %id, status = status.as_str(), "Friend request answered");
            Ok(request)
        })
    }

    /// Pending requests addressed to `user_id`, joined with the sender.
    pub fn incoming_friend_requests(&self, user_id: Uuid) -> Result<Vec<FriendRequestWithUser>> {
        let sql = format!(
            "SELECT {FRIEND_REQUEST_COLUMNS}, u.handle, u.full_name
             FROM friend_requests r
             JOIN users u ON u.id = r.from_user_id
             WHERE r.to_user_id = ?1 AND r.status = ?2
             ORDER BY r.created_at DESC"
        );
        self.with_conn(|conn| {
            query_with_user(
                conn,
                &sql,
                params![user_id.to_string(), FriendRequestStatus::Pending.as_str()],
            )
        })
    }

    /// Every request `user_id` has sent, joined with the recipient.
    pub fn sent_friend_requests(&self, user_id: Uuid) -> Result<Vec<FriendRequestWithUser>> {
        let sql = format!(
            "SELECT {FRIEND_REQUEST_COLUMNS}, u.handle, u.full_name
             FROM friend_requests r
             JOIN users u ON u.id = r.to_user_id
             WHERE r.from_user_id = ?1
             ORDER BY r.created_at DESC"
        );
        self.with_conn(|conn| query_with_user(conn, &sql, params![user_id.to_string()]))
    }
}

fn query_request(conn: &Connection, id: Uuid) -> Result<Option<FriendRequest>> {
    let sql = format!("SELECT {FRIEND_REQUEST_COLUMNS} FROM friend_requests r WHERE r.id = ?1");
    conn.query_row(&sql, [id.to_string()], FriendRequestRow::from_row)
        .optional()?
        .map(FriendRequestRow::into_request)
        .transpose()
}

fn query_with_user(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<FriendRequestWithUser>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                FriendRequestRow::from_row(row)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(row, other_handle, other_full_name)| {
            Ok(FriendRequestWithUser {
                request: row.into_request()?,
                other_handle,
                other_full_name,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::user;

    #[test]
    fn duplicate_in_either_direction_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");

        db.create_friend_request(Uuid::new_v4(), a, b, Utc::now()).unwrap();
        let again = db.create_friend_request(Uuid::new_v4(), a, b, Utc::now());
        assert!(matches!(again, Err(StoreError::Conflict(_))));
        let reverse = db.create_friend_request(Uuid::new_v4(), b, a, Utc::now());
        assert!(matches!(reverse, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn accept_adds_reciprocal_edges() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let req = db.create_friend_request(Uuid::new_v4(), a, b, Utc::now()).unwrap();

        let answered = db
            .respond_friend_request(req.id, FriendRequestStatus::Accepted, Utc::now())
            .unwrap();
        assert_eq!(answered.status, FriendRequestStatus::Accepted);

        let ana = db.get_user(a).unwrap().unwrap();
        let beto = db.get_user(b).unwrap().unwrap();
        assert!(ana.is_friend(b));
        assert!(beto.is_friend(a));
        assert_eq!(ana.friends.len(), 1);
        assert_eq!(db.list_friends(a).unwrap()[0].id, b);
    }

    #[test]
    fn answering_twice_is_invalid_state() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let req = db.create_friend_request(Uuid::new_v4(), a, b, Utc::now()).unwrap();

        db.respond_friend_request(req.id, FriendRequestStatus::Accepted, Utc::now())
            .unwrap();
        let again = db.respond_friend_request(req.id, FriendRequestStatus::Accepted, Utc::now());
        assert!(matches!(again, Err(StoreError::InvalidState(_))));
        assert_eq!(db.get_user(a).unwrap().unwrap().friends.len(), 1);

        let missing =
            db.respond_friend_request(Uuid::new_v4(), FriendRequestStatus::Declined, Utc::now());
        assert!(matches!(missing, Err(StoreError::NotFound)));
    }

    #[test]
    fn decline_only_marks_status() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let req = db.create_friend_request(Uuid::new_v4(), a, b, Utc::now()).unwrap();

        db.respond_friend_request(req.id, FriendRequestStatus::Declined, Utc::now())
            .unwrap();
        assert!(db.get_user(a).unwrap().unwrap().friends.is_empty());
        assert_eq!(
            db.get_friend_request(req.id).unwrap().unwrap().status,
            FriendRequestStatus::Declined
        );
        // the declined record still blocks a new request
        assert!(db.create_friend_request(Uuid::new_v4(), b, a, Utc::now()).is_err());
    }

    #[test]
    fn already_friends_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        let req = db.create_friend_request(Uuid::new_v4(), a, b, Utc::now()).unwrap();
        db.respond_friend_request(req.id, FriendRequestStatus::Accepted, Utc::now())
            .unwrap();

        let err = db.create_friend_request(Uuid::new_v4(), a, b, Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(msg) if msg.contains("already friends")));
    }

    #[test]
    fn request_listings_join_other_party() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "ana");
        let b = user(&db, "beto");
        db.create_friend_request(Uuid::new_v4(), a, b, Utc::now()).unwrap();

        let incoming = db.incoming_friend_requests(b).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].other_handle, "ana");

        let sent = db.sent_friend_requests(a).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].other_handle, "beto");

        assert!(db.incoming_friend_requests(a).unwrap().is_empty());
    }
}
