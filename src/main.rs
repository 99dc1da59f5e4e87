//! Young Lists Backend
//!
//! Household shopping lists with store-ordered aisles and trip history, served
//! as a REST backend over SQLite with live change notifications.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod feed;
mod models;
mod ordering;
mod session;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Young Lists Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No gateway PSK configured (YL_API_PSK). Any caller may claim an identity!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool).await?);

    let seeded = repo.seed_allowed_users(&config.bootstrap_users).await?;
    if seeded > 0 {
        tracing::info!("Seeded allow-list with {} users", seeded);
    } else if repo.allowed_users().await?.uids.is_empty() {
        tracing::warn!("Allow-list is empty; set YL_BOOTSTRAP_USERS to admit the first user");
    }

    // Create application state
    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes that require allow-list membership
    let member_routes = Router::new()
        // Access
        .route(
            "/access",
            get(api::list_allowed_users).post(api::allow_user),
        )
        .route("/access/{uid}", delete(api::revoke_user))
        // Lists
        .route("/lists", get(api::list_lists).post(api::create_list))
        .route("/lists/{id}", get(api::get_list).delete(api::delete_list))
        .route("/lists/{id}/name", put(api::rename_list))
        .route("/lists/{id}/archive", post(api::archive_list))
        .route("/lists/{id}/restore", post(api::restore_list))
        .route("/lists/{id}/store", put(api::assign_store))
        .route("/lists/{id}/complete", post(api::complete_trip))
        // Items
        .route("/lists/{id}/items", get(api::list_items).post(api::quick_add))
        .route(
            "/lists/{id}/items/{item_id}",
            patch(api::update_item).delete(api::delete_item),
        )
        .route("/lists/{id}/view", get(api::get_list_view))
        .route("/lists/{id}/view/watch", get(api::watch_list_view))
        // Stores
        .route("/stores", get(api::list_stores).post(api::create_store))
        .route("/stores/{id}", get(api::get_store).delete(api::delete_store))
        .route("/stores/{id}/name", put(api::rename_store))
        .route("/stores/{id}/watch", get(api::watch_store))
        .route(
            "/stores/{id}/sections",
            post(api::add_store_section).put(api::replace_store_sections),
        )
        .route(
            "/stores/{id}/sections/{index}",
            delete(api::remove_store_section),
        )
        .route("/stores/{id}/sections/{index}/up", post(api::move_store_section_up))
        .route(
            "/stores/{id}/sections/{index}/down",
            post(api::move_store_section_down),
        )
        // History
        .route("/trips", get(api::list_trips))
        .route("/trips/{id}", get(api::get_trip))
        // Templates
        .route("/templates", get(api::list_templates))
        .route("/templates/{id}/apply", post(api::apply_template))
        // Change notifications
        .route("/revision", get(api::get_revision))
        .route("/changes", get(api::wait_for_changes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::allow_list_gate,
        ));

    // Identity is required everywhere under /api; /me skips the allow-list
    let api_routes = Router::new()
        .route("/me", get(api::get_me))
        .merge(member_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::identity_layer,
        ));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
