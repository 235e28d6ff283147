//! Keystone API Server
//!
//! REST API server for account authentication and authorization.

use keystone_api::auth::{
    ensure_admin, BootstrapOutcome, InMemoryAccountRepository, PgAccountRepository,
};
use keystone_api::{create_router, state::AppState};
use keystone_core::{AccountRepository, AppConfig, StorageBackend};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "keystone_api=debug,tower_http=debug";

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn open_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn AccountRepository>> {
    match config.database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory account storage; accounts are lost on restart");
            Ok(Arc::new(InMemoryAccountRepository::new()))
        }
        StorageBackend::Postgres => {
            let repo = PgAccountRepository::connect(&config.database).await?;
            repo.migrate().await?;
            tracing::info!("Connected to PostgreSQL account storage");
            Ok(Arc::new(repo))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config);

    if config.auth.uses_development_secret() {
        tracing::warn!("JWT_SECRET is not set; using the development signing secret");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let accounts = open_repository(&config).await?;

    // Create application state
    let state = Arc::new(AppState::new(config, accounts));

    if state.config.bootstrap.enabled {
        match ensure_admin(&state.accounts, &state.hasher, &state.config.bootstrap).await? {
            BootstrapOutcome::Created(admin) => {
                tracing::info!(account_id = %admin.id, "Bootstrap administrator created")
            }
            BootstrapOutcome::AlreadyPresent | BootstrapOutcome::IdentityInUse(_) => {}
        }
    }

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Keystone API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
