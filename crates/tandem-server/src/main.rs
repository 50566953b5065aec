mod catalog;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tandem_api::{AppState, AppStateInner, couples, matches};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("TANDEM_DB_PATH").unwrap_or_else(|_| "tandem.db".into());
    let puzzles_path =
        std::env::var("TANDEM_PUZZLES_PATH").unwrap_or_else(|_| "puzzles.json".into());
    let host = std::env::var("TANDEM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TANDEM_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database and load the puzzle catalog
    let db = tandem_db::Database::open(&PathBuf::from(&db_path))?;
    catalog::load(&db, &PathBuf::from(&puzzles_path))?;

    let app_state: AppState = Arc::new(AppStateInner { db });

    // Routes
    let app = Router::new()
        .route("/couples", post(couples::create_couple))
        .route("/couples/{couple_id}/balance", get(couples::get_balance))
        .route("/matches", post(matches::create_or_get))
        .route("/matches/{match_id}", get(matches::poll))
        .route("/matches/{match_id}/turns", post(matches::submit_turn))
        .route("/matches/{match_id}/hints", post(matches::use_hint))
        .route("/matches/{match_id}/moves", get(matches::move_history))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Tandem server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
