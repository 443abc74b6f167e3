#![allow(dead_code)]

mod auth;
mod azure;
mod config;
mod crypto;
mod db;
mod engine;
mod errors;
mod handlers;
mod jobs;
mod models;
mod notify;

use std::sync::Arc;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::{jwt::JwtManager, middleware::auth_middleware, middleware::AuthState};
use crate::config::AppConfig;
use crate::handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "costpilot=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!("Configuration loaded");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url())
        .await?;
    tracing::info!("Connected to PostgreSQL");

    // Run migrations
    sqlx::raw_sql(include_str!("../migrations/001_initial_schema.sql"))
        .execute(&pool)
        .await?;
    tracing::info!("Database migrations applied");

    // Initialize JWT manager
    let jwt = Arc::new(JwtManager::new(&config.auth.jwt_secret, config.auth.token_expiry_hours));

    // Create shared state
    let state = AppState {
        pool: pool.clone(),
        jwt: jwt.clone(),
        worker: config.worker.clone(),
        encryption_key: config.encryption_key.clone(),
    };

    let auth_state = AuthState { jwt: jwt.clone() };

    // Spawn the ingestion loop
    jobs::spawn_background_jobs(
        pool.clone(),
        config.worker.clone(),
        config.notifications.clone(),
        config.encryption_key.clone(),
    );

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/signup", post(handlers::auth::signup));

    // Protected routes (require auth)
    let protected_routes = Router::new()
        .route("/api/v1/auth/me", get(handlers::auth::me))
        // Connections
        .route(
            "/api/v1/connections",
            get(handlers::connections::list).post(handlers::connections::create),
        )
        // Dashboard read model
        .route("/api/v1/dashboard/summary", get(handlers::dashboard::get_summary))
        .route("/api/v1/dashboard/history", get(handlers::dashboard::get_history))
        .route("/api/v1/dashboard/waste", get(handlers::dashboard::get_waste))
        // Synthetic scenarios
        .route("/api/v1/dev/seed", post(handlers::dev::seed_scenario))
        // Apply auth middleware
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    // Combine all routes
    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting costpilot server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
