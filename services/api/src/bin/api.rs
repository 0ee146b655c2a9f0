//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, ResilientStore, RetryConfig},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState, ws_handler},
};
use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Wrap the Store & Build the Shared AppState ---
    let retry = RetryConfig::from_config(&config);
    info!(
        timeout_ms = retry.timeout.as_millis() as u64,
        max_retries = retry.max_retries,
        "Store calls are retried with exponential backoff"
    );
    let store = Arc::new(ResilientStore::new(db_adapter, retry));
    let app_state = Arc::new(AppState::new(config.clone(), store.clone(), store));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-user-id")]);

    // --- 4. Create the Web Router ---
    let read_later = Router::new()
        .route(
            "/read-later",
            get(web::list_read_later_handler).post(web::add_read_later_handler),
        )
        .route("/read-later/clear-read", post(web::clear_read_handler))
        .route(
            "/read-later/contains/{article_id}",
            get(web::read_later_contains_handler),
        )
        .route("/read-later/{id}", delete(web::remove_read_later_handler))
        .route("/read-later/{id}/read", put(web::mark_read_handler))
        .route("/read-later/{id}/progress", put(web::reading_progress_handler));

    let listen_later = Router::new()
        .route(
            "/listen-later",
            get(web::list_listen_later_handler).post(web::add_listen_later_handler),
        )
        .route("/listen-later/clear-played", post(web::clear_played_handler))
        .route(
            "/listen-later/contains/{article_id}",
            get(web::listen_later_contains_handler),
        )
        .route("/listen-later/{id}", delete(web::remove_listen_later_handler))
        .route("/listen-later/{id}/played", put(web::mark_played_handler))
        .route("/listen-later/{id}/progress", put(web::listen_progress_handler))
        .route("/listen-later/{id}/order", put(web::reorder_handler));

    let api_router = Router::new()
        .merge(read_later)
        .merge(listen_later)
        .route("/player", get(ws_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
