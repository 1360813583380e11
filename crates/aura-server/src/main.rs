mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use aura_api::{AppState, AppStateInner};
use aura_recap::{OpenAiRecapGenerator, RecapConfig, RecapGenerator, UnavailableRecapGenerator};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aura=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let db = aura_db::Database::open(&config.db_path)?;

    let recap = recap_generator(&config)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl_days: config.token_ttl_days,
        require_verified_email: config.require_verified_email,
        recap,
    });

    let app = aura_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Aura server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn recap_generator(config: &ServerConfig) -> anyhow::Result<Arc<dyn RecapGenerator>> {
    let Some(api_key) = &config.openai_api_key else {
        warn!("OPENAI_API_KEY not set; matches will be confirmed without recaps");
        return Ok(Arc::new(UnavailableRecapGenerator));
    };

    let mut recap_config = RecapConfig::new(api_key.clone());
    recap_config.timeout = config.recap_timeout;
    if let Some(model) = &config.recap_model {
        recap_config.model = model.clone();
    }
    if let Some(base_url) = &config.recap_base_url {
        recap_config.base_url = base_url.clone();
    }

    let generator = OpenAiRecapGenerator::new(recap_config)?;
    info!(model = %generator.model(), "Recap generation enabled");
    Ok(Arc::new(generator))
}
