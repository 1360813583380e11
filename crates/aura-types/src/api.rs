use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Decision, FriendRequestStatus, FriendResponse, Match, TrustBadges, UserProfile,
};

// -- JWT Claims --

/// Session token claims. Decoded by the auth middleware into the
/// request-scoped current user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub handle: String,
    pub email_verified: bool,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub handle: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub handle: String,
    pub token: String,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub handle: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEmailRequest {
    pub token: String,
}

// -- Profiles --

/// Profile as shown to other users. Never carries the e-mail address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub handle: String,
    pub display_name: String,
    pub full_name: Option<String>,
    pub aura: i64,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub description: Option<String>,
    pub friends: Vec<Uuid>,
    pub badges: TrustBadges,
    pub created_at: DateTime<Utc>,
}

impl From<UserProfile> for PublicProfile {
    fn from(user: UserProfile) -> Self {
        Self {
            display_name: user.display_name().to_string(),
            id: user.id,
            handle: user.handle,
            full_name: user.full_name,
            aura: user.aura,
            avatar_url: user.avatar_url,
            banner_url: user.banner_url,
            description: user.description,
            friends: user.friends.into_iter().collect(),
            badges: user.badges,
            created_at: user.created_at,
        }
    }
}

/// Partial update: absent fields are left untouched, empty strings clear
/// optional fields.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub handle: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

// -- Matches --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMatchRequest {
    pub opponent_id: Uuid,
    pub reporter_score: i64,
    pub opponent_score: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMatchResponse {
    pub match_id: Uuid,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveMatchRequest {
    pub decision: Decision,
}

/// Result of a confirm/reject. `recap_error` is set when the match was
/// confirmed but the recap could not be generated.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveMatchResponse {
    #[serde(rename = "match")]
    pub game: Match,
    pub recap_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

// -- Friendship --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFriendRequest {
    pub to_user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondFriendRequest {
    pub response: FriendResponse,
}

/// A friend request with the other party's names resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestView {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub other_handle: String,
    pub other_display_name: String,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: u64,
}
