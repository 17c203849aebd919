//! sitepush -- static-site publishing with scheduled deploys.
//!
//! Turns a visual design (markup + stylesheet) into a standalone HTML
//! document and ships it to Vercel or Netlify, either immediately or at a
//! scheduled time tracked in SQLite.

pub mod api;
pub mod config;
pub mod error;
pub mod publish;
pub mod scheduler;
pub mod storage;

use anyhow::Result;

use crate::config::{Credentials, SitepushConfig};

/// Start the daemon: API server plus the background schedule runner.
pub async fn serve(config: SitepushConfig, credentials: Credentials) -> Result<()> {
    // 1. Initialize Storage
    tracing::info!(db_path = %config.server.database, "Initializing database");
    let pool = storage::open_pool(&config.server.database)?;
    let store = scheduler::ScheduleStore::new(pool);

    // 2. Provider adapters
    let providers = publish::Providers::from_config(&config.providers, &credentials)?;

    // 3. Start Scheduler Engine (background task)
    if config.runner.enabled {
        let runner = scheduler::Runner::new(store.clone(), providers.clone())
            .with_batch_size(config.runner.batch_size);
        let interval = std::time::Duration::from_secs(config.runner.poll_interval_secs.max(1));
        tokio::spawn(async move {
            scheduler::run_scheduler_loop(runner, interval).await;
        });
    } else {
        tracing::info!("Schedule runner disabled; expecting an external trigger");
    }

    // 4. Start API Server
    let addr: std::net::SocketAddr = config.server.bind.parse()?;
    let app = api::router(api::state::AppState { store, providers });

    tracing::info!(%addr, "sitepush listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
