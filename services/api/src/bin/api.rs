//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{load_roster, DbAdapter},
    config::Config,
    error::ApiError,
    web::{router, state::AppState},
};
use classroom_core::{DatabaseService, InMemoryStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Load the Course Roster ---
    let roster = load_roster(&config.roster_path)?;
    info!(
        "Loaded {} courses from {}",
        roster.courses.len(),
        config.roster_path.display()
    );

    // --- 3. Connect to the Store & Run Migrations ---
    let store: Arc<dyn DatabaseService> = if config.uses_memory_store() {
        warn!("DATABASE_URL=memory: nothing will survive a restart");
        Arc::new(InMemoryStore::new())
    } else {
        info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        let db_adapter = DbAdapter::new(db_pool, config.app_id.clone());
        info!("Running database migrations...");
        db_adapter.run_migrations().await?;
        info!("Database migrations complete.");
        Arc::new(db_adapter)
    };
    if config.admin_static_pin.is_some() {
        warn!("ADMIN_STATIC_PIN is deprecated; unset it to register a stored instructor PIN");
    }

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::from_config(config.clone(), store, roster));
    let app = router(app_state)?;

    // --- 5. Start the Server ---
    info!(
        "Starting server on {} (policy: {}, timezone: {})",
        config.bind_address, config.submission_policy, config.reference_tz
    );
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
