//! Database row types. They map directly to SQLite rows and are converted
//! into the typed `aura-types` models here, so malformed values are caught
//! at the store boundary instead of leaking into handlers.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use aura_types::{
    FriendRequest, Match, Notification, TrustBadges, UserProfile,
};

use crate::{Result, StoreError};

/// Timestamps are stored as fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("id '{}': {}", raw, e)))
}

fn parse_opt_id(raw: Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}

// -- Users --

pub(crate) const USER_COLUMNS: &str = "id, handle, full_name, email, email_verified, aura, \
     avatar_url, banner_url, description, certified_hooper, cosmic_marshall, created_at";

pub struct UserRow {
    pub id: String,
    pub handle: String,
    pub full_name: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub aura: i64,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub description: Option<String>,
    pub certified_hooper: bool,
    pub cosmic_marshall: bool,
    pub created_at: String,
}

impl UserRow {
    /// Expects the column order of [`USER_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            handle: row.get(1)?,
            full_name: row.get(2)?,
            email: row.get(3)?,
            email_verified: row.get(4)?,
            aura: row.get(5)?,
            avatar_url: row.get(6)?,
            banner_url: row.get(7)?,
            description: row.get(8)?,
            certified_hooper: row.get(9)?,
            cosmic_marshall: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    pub(crate) fn into_profile(self, friends: BTreeSet<Uuid>) -> Result<UserProfile> {
        Ok(UserProfile {
            id: parse_id(&self.id)?,
            handle: self.handle,
            full_name: self.full_name,
            email: self.email,
            email_verified: self.email_verified,
            aura: self.aura,
            avatar_url: self.avatar_url,
            banner_url: self.banner_url,
            description: self.description,
            friends,
            badges: TrustBadges {
                certified_hooper: self.certified_hooper,
                cosmic_marshall: self.cosmic_marshall,
            },
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// What login needs from a user record.
pub struct CredentialsRow {
    pub id: Uuid,
    pub handle: String,
    pub password: String,
    pub email_verified: bool,
}

// -- Matches --

pub(crate) const MATCH_COLUMNS: &str = "id, player1_id, player2_id, player1_name, player2_name, \
     player1_score, player2_score, status, winner_id, recap, created_at, confirmed_at";

pub struct MatchRow {
    pub id: String,
    pub player1_id: String,
    pub player2_id: String,
    pub player1_name: String,
    pub player2_name: String,
    pub player1_score: u32,
    pub player2_score: u32,
    pub status: String,
    pub winner_id: Option<String>,
    pub recap: Option<String>,
    pub created_at: String,
    pub confirmed_at: Option<String>,
}

impl MatchRow {
    /// Expects the column order of [`MATCH_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            player1_id: row.get(1)?,
            player2_id: row.get(2)?,
            player1_name: row.get(3)?,
            player2_name: row.get(4)?,
            player1_score: row.get(5)?,
            player2_score: row.get(6)?,
            status: row.get(7)?,
            winner_id: row.get(8)?,
            recap: row.get(9)?,
            created_at: row.get(10)?,
            confirmed_at: row.get(11)?,
        })
    }

    pub(crate) fn into_match(self) -> Result<Match> {
        Ok(Match {
            id: parse_id(&self.id)?,
            player1_id: parse_id(&self.player1_id)?,
            player2_id: parse_id(&self.player2_id)?,
            player1_name: self.player1_name,
            player2_name: self.player2_name,
            player1_score: self.player1_score,
            player2_score: self.player2_score,
            status: self
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("match '{}': {}", self.id, e)))?,
            winner_id: parse_opt_id(self.winner_id)?,
            recap: self.recap,
            created_at: parse_ts(&self.created_at)?,
            confirmed_at: self.confirmed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

// -- Friend requests --

pub(crate) const FRIEND_REQUEST_COLUMNS: &str =
    "r.id, r.from_user_id, r.to_user_id, r.status, r.created_at";

pub struct FriendRequestRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub status: String,
    pub created_at: String,
}

impl FriendRequestRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            from_user_id: row.get(1)?,
            to_user_id: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub(crate) fn into_request(self) -> Result<FriendRequest> {
        Ok(FriendRequest {
            id: parse_id(&self.id)?,
            from_user_id: parse_id(&self.from_user_id)?,
            to_user_id: parse_id(&self.to_user_id)?,
            status: self
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("friend request '{}': {}", self.id, e)))?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// A friend request joined with the handle and name of the other party.
pub struct FriendRequestWithUser {
    pub request: FriendRequest,
    pub other_handle: String,
    pub other_full_name: Option<String>,
}

// -- Notifications --

pub(crate) const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, message, related_id, is_read, sender_id, sender_name, created_at";

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub related_id: String,
    pub is_read: bool,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub created_at: String,
}

impl NotificationRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: row.get(2)?,
            message: row.get(3)?,
            related_id: row.get(4)?,
            is_read: row.get(5)?,
            sender_id: row.get(6)?,
            sender_name: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub(crate) fn into_notification(self) -> Result<Notification> {
        Ok(Notification {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            kind: self
                .kind
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("notification '{}': {}", self.id, e)))?,
            message: self.message,
            related_id: parse_id(&self.related_id)?,
            is_read: self.is_read,
            sender_id: parse_opt_id(self.sender_id)?,
            sender_name: self.sender_name,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_as_text() {
        let a: DateTime<Utc> = "2024-01-01T09:00:00.5Z".parse().unwrap();
        let b: DateTime<Utc> = "2024-01-01T10:00:00Z".parse().unwrap();
        assert!(ts(&a) < ts(&b));
        assert_eq!(parse_ts(&ts(&a)).unwrap(), a);
    }

    #[test]
    fn parses_sqlite_datetime_format() {
        let dt = parse_ts("2024-03-05 18:30:00").unwrap();
        assert_eq!(ts(&dt), "2024-03-05T18:30:00.000000Z");
    }

    #[test]
    fn bad_values_are_corrupt() {
        assert!(matches!(parse_id("nope"), Err(StoreError::Corrupt(_))));
        assert!(matches!(parse_ts("yesterday"), Err(StoreError::Corrupt(_))));
    }
}
