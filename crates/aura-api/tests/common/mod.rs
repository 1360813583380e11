#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use aura_api::{AppState, AppStateInner, CurrentUser};
use aura_db::Database;
use aura_db::users::NewUser;
use aura_recap::{RecapError, RecapGenerator, RecapRequest};
use aura_types::FriendRequestStatus;

pub const JWT_SECRET: &str = "test-secret-for-integration";

/// Recap generator with a scripted answer that counts its calls.
pub struct ScriptedRecap {
    reply: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl ScriptedRecap {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(text.to_string())),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn succeed_with(&self, text: &str) {
        *self.reply.lock().unwrap() = Some(text.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecapGenerator for ScriptedRecap {
    async fn generate(&self, request: &RecapRequest) -> aura_recap::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Some(text) => Ok(format!(
                "{} ({} {}-{} {})",
                text,
                request.player1_name,
                request.player1_score,
                request.player2_score,
                request.player2_name
            )),
            None => Err(RecapError::Network("connection reset".into())),
        }
    }
}

pub fn state_with(recap: Arc<dyn RecapGenerator>) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: JWT_SECRET.to_string(),
        token_ttl_days: 1,
        require_verified_email: true,
        recap,
    })
}

/// A verified account with aura 0.
pub fn user(state: &AppState, handle: &str) -> CurrentUser {
    let id = Uuid::new_v4();
    state
        .db
        .create_user(&NewUser {
            id,
            handle: handle.to_string(),
            email: format!("{}@example.com", handle),
            password_hash: "unused".into(),
            full_name: None,
            avatar_url: None,
            verification_token_hash: None,
            created_at: Utc::now(),
        })
        .unwrap();
    CurrentUser {
        id,
        handle: handle.to_string(),
    }
}

pub fn befriend(state: &AppState, a: &CurrentUser, b: &CurrentUser) {
    let request = state
        .db
        .create_friend_request(Uuid::new_v4(), a.id, b.id, Utc::now())
        .unwrap();
    state
        .db
        .respond_friend_request(request.id, FriendRequestStatus::Accepted, Utc::now())
        .unwrap();
}

pub fn aura(state: &AppState, user: &CurrentUser) -> i64 {
    state.db.get_user(user.id).unwrap().unwrap().aura
}
