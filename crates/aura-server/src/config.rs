//! Server configuration loaded from environment variables.
//!
//! Everything except the JWT secret has a default suitable for local
//! development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `AURA_HOST` / `AURA_PORT`
    /// Default: `0.0.0.0:3000`
    pub addr: SocketAddr,

    /// SQLite database file.
    /// Env: `AURA_DB_PATH`
    /// Default: `aura.db`
    pub db_path: PathBuf,

    /// HS256 signing key for session tokens. Required.
    /// Env: `AURA_JWT_SECRET`
    pub jwt_secret: String,

    /// Env: `AURA_TOKEN_TTL_DAYS`
    /// Default: `30`
    pub token_ttl_days: i64,

    /// Refuse logins and API calls from unverified accounts.
    /// Env: `AURA_REQUIRE_VERIFIED_EMAIL` (true/false)
    /// Default: `true`
    pub require_verified_email: bool,

    /// Recap generation is disabled when unset.
    /// Env: `OPENAI_API_KEY`
    pub openai_api_key: Option<String>,

    /// Env: `AURA_RECAP_MODEL`
    pub recap_model: Option<String>,

    /// Env: `AURA_RECAP_BASE_URL`
    pub recap_base_url: Option<String>,

    /// Env: `AURA_RECAP_TIMEOUT_SECS`
    /// Default: `30`
    pub recap_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("AURA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = match var("AURA_PORT") {
            Some(port) => port.parse().context("AURA_PORT must be a port number")?,
            None => 3000,
        };
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("AURA_HOST must be an IP address")?;

        let jwt_secret = var("AURA_JWT_SECRET")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if jwt_secret.is_empty() {
            bail!("AURA_JWT_SECRET is required");
        }
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.to_lowercase().as_str()) {
            bail!("AURA_JWT_SECRET is still a placeholder value");
        }

        let token_ttl_days = match var("AURA_TOKEN_TTL_DAYS") {
            Some(days) => days
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .context("AURA_TOKEN_TTL_DAYS must be a positive number")?,
            None => 30,
        };

        let require_verified_email = var("AURA_REQUIRE_VERIFIED_EMAIL")
            .map(|val| val != "false" && val != "0")
            .unwrap_or(true);

        let recap_timeout = match var("AURA_RECAP_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse().context("AURA_RECAP_TIMEOUT_SECS must be a number")?,
            ),
            None => Duration::from_secs(30),
        };

        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            addr,
            db_path: PathBuf::from(var("AURA_DB_PATH").unwrap_or_else(|| "aura.db".into())),
            jwt_secret,
            token_ttl_days,
            require_verified_email,
            openai_api_key: non_empty("OPENAI_API_KEY"),
            recap_model: non_empty("AURA_RECAP_MODEL"),
            recap_base_url: non_empty("AURA_RECAP_BASE_URL"),
            recap_timeout,
        })
    }
}
