mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use carpool_api::AppStateInner;
use carpool_core::{KeywordMatcher, Matchmaker};

use crate::config::{Config, DEV_JWT_SECRET};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carpool=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.jwt_secret == DEV_JWT_SECRET {
        warn!("CARPOOL_JWT_SECRET is not set, using the development secret");
    }

    // Init database
    let db = Arc::new(carpool_db::Database::open(&config.db_path)?);

    let matchmaker = Matchmaker::new(db.clone(), Arc::new(KeywordMatcher));
    let state = AppStateInner::new(
        db,
        config.jwt_secret.clone(),
        chrono::Duration::hours(config.token_ttl_hours),
        matchmaker,
    );

    let app = carpool_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Carpool server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
