use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use aura_types::UserProfile;

use crate::error::{OptionalExt, is_unique_violation};
use crate::models::{CredentialsRow, USER_COLUMNS, UserRow, parse_id, ts};
use crate::{Database, Result, StoreError};

pub struct NewUser {
    pub id: Uuid,
    pub handle: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    /// SHA-256 of the e-mail verification token; `None` creates a verified account.
    pub verification_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Profile fields to overwrite. Outer `None` leaves a column alone, inner
/// `None` clears it.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub handle: Option<String>,
    pub full_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub banner_url: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

fn handle_or_email_conflict(err: rusqlite::Error) -> StoreError {
    if is_unique_violation(&err, "users.handle") {
        StoreError::Conflict("Handle already taken. Please choose another.".into())
    } else if is_unique_violation(&err, "users.email") {
        StoreError::Conflict("This email address is already in use by another account.".into())
    } else {
        err.into()
    }
}

impl Database {
    // -- Accounts --

    pub fn create_user(&self, user: &NewUser) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, handle, email, password, full_name, avatar_url,
                                    email_verified, verification_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id.to_string(),
                    user.handle,
                    user.email,
                    user.password_hash,
                    user.full_name,
                    user.avatar_url,
                    user.verification_token_hash.is_none(),
                    user.verification_token_hash,
                    ts(&user.created_at),
                ],
            )
            .map_err(handle_or_email_conflict)?;
            Ok(())
        })
    }

    pub fn get_credentials_by_email(&self, email: &str) -> Result<Option<CredentialsRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, handle, password, email_verified FROM users WHERE email = ?1",
                    [email],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, bool>(3)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, handle, password, email_verified)| {
                Ok(CredentialsRow {
                    id: parse_id(&id)?,
                    handle,
                    password,
                    email_verified,
                })
            })
            .transpose()
        })
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Id of the user holding `handle`, ignoring `except`.
    pub fn find_handle(&self, handle: &str, except: Option<Uuid>) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row("SELECT id FROM users WHERE handle = ?1", [handle], |row| row.get(0))
                .optional()?;

            let found = found.as_deref().map(parse_id).transpose()?;
            Ok(found.filter(|id| Some(*id) != except))
        })
    }

    /// Marks the account holding this token hash as verified and clears the token.
    pub fn verify_email(&self, token_hash: &str) -> Result<Uuid> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id: String = tx
                .query_row(
                    "SELECT id FROM users WHERE verification_token = ?1",
                    [token_hash],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound)?;

            tx.execute(
                "UPDATE users SET email_verified = 1, verification_token = NULL WHERE id = ?1",
                [&id],
            )?;
            tx.commit()?;
            parse_id(&id)
        })
    }

    // -- Profiles --

    pub fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Applies `changes` in one statement. The UNIQUE constraint on `handle`
    /// backs up the caller's advisory availability check.
    pub fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<UserProfile> {
        self.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE users SET
                        handle      = COALESCE(?2, handle),
                        full_name   = CASE WHEN ?3 THEN ?4 ELSE full_name END,
                        avatar_url  = CASE WHEN ?5 THEN ?6 ELSE avatar_url END,
                        banner_url  = CASE WHEN ?7 THEN ?8 ELSE banner_url END,
                        description = CASE WHEN ?9 THEN ?10 ELSE description END
                     WHERE id = ?1",
                    params![
                        id.to_string(),
                        changes.handle,
                        changes.full_name.is_some(),
                        changes.full_name.clone().flatten(),
                        changes.avatar_url.is_some(),
                        changes.avatar_url.clone().flatten(),
                        changes.banner_url.is_some(),
                        changes.banner_url.clone().flatten(),
                        changes.description.is_some(),
                        changes.description.clone().flatten(),
                    ],
                )
                .map_err(handle_or_email_conflict)?;

            if updated == 0 {
                return Err(StoreError::NotFound);
            }
            query_user(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    /// Exact e-mail or handle-prefix search, excluding `exclude`.
    pub fn search_users(&self, query: &str, exclude: Uuid, limit: u32) -> Result<Vec<UserProfile>> {
        let pattern = format!("{}%", escape_like(query));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE (email = ?1 OR handle LIKE ?2 ESCAPE '\\') AND id <> ?3
                 ORDER BY handle
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![query, pattern, exclude.to_string(), limit],
                    UserRow::from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|row| {
                    let friends = friend_ids(conn, &row.id)?;
                    row.into_profile(friends)
                })
                .collect()
        })
    }

    pub fn list_friends(&self, user_id: Uuid) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE id IN (SELECT friend_id FROM friendships WHERE user_id = ?1)
                 ORDER BY handle"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|row| {
                    let friends = friend_ids(conn, &row.id)?;
                    row.into_profile(friends)
                })
                .collect()
        })
    }
}

pub(crate) fn query_user(conn: &Connection, id: Uuid) -> Result<Option<UserProfile>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], UserRow::from_row)
        .optional()?;

    match row {
        Some(row) => {
            let friends = friend_ids(conn, &row.id)?;
            Ok(Some(row.into_profile(friends)?))
        }
        None => Ok(None),
    }
}

pub(crate) fn friend_ids(conn: &Connection, user_id: &str) -> Result<BTreeSet<Uuid>> {
    let mut stmt = conn.prepare("SELECT friend_id FROM friendships WHERE user_id = ?1")?;
    let ids = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    ids.iter().map(|id| parse_id(id)).collect()
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
