use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE IF NOT EXISTS users (
                id                  TEXT PRIMARY KEY,
                handle              TEXT NOT NULL UNIQUE,
                email               TEXT NOT NULL UNIQUE,
                password            TEXT NOT NULL,
                full_name           TEXT,
                email_verified      INTEGER NOT NULL DEFAULT 0,
                verification_token  TEXT,
                aura                INTEGER NOT NULL DEFAULT 0,
                avatar_url          TEXT,
                banner_url          TEXT,
                description         TEXT,
                certified_hooper    INTEGER NOT NULL DEFAULT 0,
                cosmic_marshall     INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_verification
                ON users(verification_token);

            CREATE TABLE IF NOT EXISTS friendships (
                user_id     TEXT NOT NULL REFERENCES users(id),
                friend_id   TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, friend_id)
            );

            CREATE TABLE IF NOT EXISTS matches (
                id              TEXT PRIMARY KEY,
                player1_id      TEXT NOT NULL REFERENCES users(id),
                player2_id      TEXT NOT NULL REFERENCES users(id),
                player1_name    TEXT NOT NULL,
                player2_name    TEXT NOT NULL,
                player1_score   INTEGER NOT NULL CHECK (player1_score >= 0),
                player2_score   INTEGER NOT NULL CHECK (player2_score >= 0),
                status          TEXT NOT NULL,
                winner_id       TEXT REFERENCES users(id),
                recap           TEXT,
                created_at      TEXT NOT NULL,
                confirmed_at    TEXT,
                CHECK (player1_score <> player2_score)
            );

            CREATE INDEX IF NOT EXISTS idx_matches_player1
                ON matches(player1_id, status);
            CREATE INDEX IF NOT EXISTS idx_matches_player2
                ON matches(player2_id, status);

            CREATE TABLE IF NOT EXISTS friend_requests (
                id              TEXT PRIMARY KEY,
                from_user_id    TEXT NOT NULL REFERENCES users(id),
                to_user_id      TEXT NOT NULL REFERENCES users(id),
                status          TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                responded_at    TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_friend_requests_pair
                ON friend_requests(from_user_id, to_user_id);
            CREATE INDEX IF NOT EXISTS idx_friend_requests_to
                ON friend_requests(to_user_id, status);

            CREATE TABLE IF NOT EXISTS notifications (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                kind            TEXT NOT NULL,
                message         TEXT NOT NULL,
                related_id      TEXT NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0,
                sender_id       TEXT,
                sender_name     TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_user
                ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
