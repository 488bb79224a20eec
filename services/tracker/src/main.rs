use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod aggregator;
mod credentials;
mod error;
mod graph;
mod guard;
mod middleware;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod settings;
mod state;
mod task_view;
mod validation;

use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use tokio::net::TcpListener;

use crate::{
    repositories::{Repositories, postgres::MIGRATOR},
    settings::{Settings, StorageBackend},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting tracker service");

    let settings = Settings::from_env()?;

    let repositories = match settings.storage {
        StorageBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool, &MIGRATOR).await?;
            Repositories::postgres(pool)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on exit");
            Repositories::in_memory()
        }
    };

    let bind_address = settings.bind_address.clone();
    let app = routes::create_router(AppState::new(repositories, settings));

    let listener = TcpListener::bind(&bind_address).await?;
    info!("Tracker service listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
