use axum::{
    http::{HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use dotenvy::dotenv;
use once_cell::sync::Lazy;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tower_http::cors::CorsLayer;

use crate::ledger::{MemoryLedger, MongoLedger, VoteLedger};
use crate::models::poll_models::PollConfig;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

mod controllers;
mod db;
mod ledger;
mod models;
mod routes;
mod state;
mod utils;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polls_backend=info,tower_http=info".into()),
        )
        .init();

    let ledger: Arc<dyn VoteLedger> = if std::env::var("MONGO_URI").is_ok() {
        let database = match db::connection::init_db().await {
            Ok(db) => Arc::new(db),
            Err(e) => {
                tracing::error!("Failed to initialize database: {}", e);
                std::process::exit(1);
            }
        };

        let mongo = MongoLedger::new(database);
        if let Err(e) = mongo.ensure_indexes().await {
            tracing::error!("Failed to create indexes: {}", e);
            std::process::exit(1);
        }
        Arc::new(mongo)
    } else {
        tracing::warn!("MONGO_URI not set, using in-memory ledger (votes will not survive restarts)");
        Arc::new(MemoryLedger::new())
    };

    if let Ok(path) = std::env::var("POLLS_FILE") {
        if let Err(e) = seed_polls(ledger.as_ref(), &path).await {
            tracing::error!("Failed to seed polls from {}: {}", path, e);
            std::process::exit(1);
        }
    }

    let app_state = state::AppState::new(ledger);

    let mut app = Router::new()
        .route("/", get(root))
        .nest("/api/polls", routes::poll_routes::poll_routes(app_state));

    if let Ok(cors_origin) = std::env::var("CORS_ORIGIN") {
        let origin = cors_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
            tracing::error!("Failed to parse CORS origin: {}", cors_origin);
            std::process::exit(1);
        });

        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT,
                axum::http::header::COOKIE,
            ])
            .allow_credentials(true);

        app = app.layer(cors);
        tracing::info!("CORS origin: {}", cors_origin);
    }

    let server_addr =
        std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

    let addr: SocketAddr = server_addr.parse().unwrap_or_else(|_| {
        tracing::error!("Failed to parse SERVER_ADDR: {}", server_addr);
        std::process::exit(1);
    });

    tracing::info!("Server running at http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Loads published poll definitions from a JSON file. Polls are authored
/// elsewhere; this is just how their configs reach the ledger.
async fn seed_polls(
    ledger: &dyn VoteLedger,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let configs: Vec<PollConfig> = serde_json::from_str(&raw)?;

    let count = configs.len();
    for config in &configs {
        ledger.upsert_poll(config).await?;
    }

    tracing::info!("Seeded {} poll(s) from {}", count, path);
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    let elapsed = START_TIME.elapsed();
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let uptime_message = if days > 0 {
        format!("{}d {}h {}m {}s", days, hours % 24, minutes % 60, seconds % 60)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    };

    Json(json!({
        "status": "ok",
        "message": format!("Backend is running! Uptime: {}", uptime_message)
    }))
}
