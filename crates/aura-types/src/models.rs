use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Aura awarded to the winner of a confirmed match.
pub const AURA_WIN_DELTA: i64 = 10;

/// Aura applied to the loser of a confirmed match. Added as-is, so a
/// player's total can go below zero.
pub const AURA_LOSS_DELTA: i64 = -5;

pub const DEFAULT_AVATAR_URL: &str = "https://i.imgur.com/nkcoOPE.jpeg";

/// Returned when a status or kind column holds a value we don't know.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// -- Users --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustBadges {
    pub certified_hooper: bool,
    pub cosmic_marshall: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub handle: String,
    pub full_name: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub aura: i64,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub description: Option<String>,
    pub friends: BTreeSet<Uuid>,
    pub badges: TrustBadges,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Name shown to other players: the full name when set, otherwise the handle.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.handle,
        }
    }

    pub fn is_friend(&self, other: Uuid) -> bool {
        self.friends.contains(&other)
    }
}

// -- Matches --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "pending_player2")]
    PendingPlayer2,
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "rejected_by_player2")]
    RejectedByPlayer2,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPlayer2 => "pending_player2",
            Self::Confirmed => "confirmed",
            Self::RejectedByPlayer2 => "rejected_by_player2",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::PendingPlayer2)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_player2" => Ok(Self::PendingPlayer2),
            "confirmed" => Ok(Self::Confirmed),
            "rejected_by_player2" => Ok(Self::RejectedByPlayer2),
            other => Err(UnknownVariant {
                kind: "match status",
                value: other.to_string(),
            }),
        }
    }
}

/// Player 2's answer to a reported score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Confirm,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_name: String,
    pub player2_name: String,
    pub player1_score: u32,
    pub player2_score: u32,
    pub status: MatchStatus,
    pub winner_id: Option<Uuid>,
    pub recap: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// (winner, loser) as decided by the reported scores. Scores are never
    /// equal once a match is stored.
    pub fn outcome(&self) -> (Uuid, Uuid) {
        if self.player1_score > self.player2_score {
            (self.player1_id, self.player2_id)
        } else {
            (self.player2_id, self.player1_id)
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.player1_id == user_id || self.player2_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub current_user_wins: u32,
    pub other_user_wins: u32,
    pub total_played: u32,
}

// -- Friendship --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for FriendRequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(UnknownVariant {
                kind: "friend request status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendResponse {
    Accept,
    Decline,
}

impl FriendResponse {
    pub fn resulting_status(&self) -> FriendRequestStatus {
        match self {
            Self::Accept => FriendRequestStatus::Accepted,
            Self::Decline => FriendRequestStatus::Declined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MatchInvite,
    MatchConfirmed,
    MatchRejected,
    RecapReady,
    FriendRequest,
    FriendAccepted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchInvite => "match_invite",
            Self::MatchConfirmed => "match_confirmed",
            Self::MatchRejected => "match_rejected",
            Self::RecapReady => "recap_ready",
            Self::FriendRequest => "friend_request",
            Self::FriendAccepted => "friend_accepted",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match_invite" => Ok(Self::MatchInvite),
            "match_confirmed" => Ok(Self::MatchConfirmed),
            "match_rejected" => Ok(Self::MatchRejected),
            "recap_ready" => Ok(Self::RecapReady),
            "friend_request" => Ok(Self::FriendRequest),
            "friend_accepted" => Ok(Self::FriendAccepted),
            other => Err(UnknownVariant {
                kind: "notification kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    /// Match id for match kinds, user id for friendship kinds.
    pub related_id: Uuid,
    pub is_read: bool,
    pub sender_id: Option<Uuid>,
    pub sender_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
