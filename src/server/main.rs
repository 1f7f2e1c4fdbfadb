//! RetailEase licensing server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use retailease::config::{init_config, RetaileaseConfig};
use retailease::errors::LicenseError;
use retailease::server::activation::ActivationManager;
use retailease::server::backups::BackupIngestor;
use retailease::server::bootstrap::ensure_active_key_pair;
use retailease::server::database::Database;
use retailease::server::handlers::AppState;
use retailease::server::routes::build_router;
use retailease::server::sync_log::SyncSessionLog;
use retailease::server::tenant::TenantStore;

#[cfg(feature = "background-jobs")]
use retailease::jobs::{JobConfig, JobScheduler};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        tracing::error!("server exited with error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), LicenseError> {
    let config: &'static RetaileaseConfig = init_config()?;

    let db = Database::new().await?;

    if ensure_active_key_pair(&db, config).await? {
        warn!("generated a fresh signing key pair on startup; back up the database before rotating it");
    }

    let state = AppState {
        db: db.clone(),
        config: Arc::new(config.clone()),
        activation: ActivationManager::new(db.clone(), config.license.grace_period_days),
        tenant: TenantStore::new(db.clone()),
        backups: BackupIngestor::new(db.clone(), &config.backup.storage_root),
        sync_log: SyncSessionLog::new(db.clone()),
    };

    #[cfg(feature = "background-jobs")]
    {
        let job_config = JobConfig {
            grace_period_cron: config.jobs.grace_period_cron.clone(),
            license_expiration_cron: config.jobs.license_expiration_cron.clone(),
        };
        match JobScheduler::new((*db).clone(), job_config).await {
            Ok(scheduler) => {
                if let Err(e) = scheduler.start().await {
                    warn!("failed to start background job scheduler: {e}");
                }
                // Scheduler owns its own tokio tasks; leak the handle so the
                // cron jobs keep running for the life of the process.
                std::mem::forget(scheduler);
            }
            Err(e) => warn!("failed to initialize background job scheduler: {e}"),
        }
    }

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| LicenseError::ConfigError(format!("invalid bind address: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(LicenseError::from)?;

    info!("RetailEase licensing server listening on http://{addr}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(LicenseError::from)?;

    Ok(())
}
