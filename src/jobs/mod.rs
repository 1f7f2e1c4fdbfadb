//! Background job scheduler for RetailEase.
//!
//! This module provides scheduled background jobs for license lifecycle
//! transitions that request-driven code paths reconcile lazily but that
//! should also happen even if nobody calls in. Requires the
//! `background-jobs` feature.
//!
//! # Available Jobs
//!
//! - **Grace Period Expiration**: suspended licenses whose grace period has
//!   elapsed move to `revoked`.
//!
//! - **License Expiration**: active licenses whose `valid_until` has passed
//!   (and are not in grace) move to `expired`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use retailease::jobs::{JobScheduler, JobConfig};
//! use retailease::server::database::Database;
//!
//! let db = Database::connect(&config.database).await?;
//! let config = JobConfig::default();
//! let scheduler = JobScheduler::new(db, config).await?;
//! scheduler.start().await?;
//! ```

use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::{error, info};

use crate::server::database::Database;

mod grace_period;
mod license_expiration;

pub use grace_period::run_grace_period_check;
pub use license_expiration::run_license_expiration_check;

/// Configuration for background jobs.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Cron expression for grace period expiration check (default: every 15 minutes)
    pub grace_period_cron: String,
    /// Cron expression for license expiration check (default: every hour)
    pub license_expiration_cron: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            grace_period_cron: "0 */15 * * * *".to_string(),
            license_expiration_cron: "0 0 * * * *".to_string(),
        }
    }
}

/// Background job scheduler for RetailEase.
pub struct JobScheduler {
    scheduler: TokioJobScheduler,
    db: Arc<Database>,
    config: JobConfig,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub async fn new(db: Database, config: JobConfig) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            db: Arc::new(db),
            config,
        })
    }

    /// Start the job scheduler with all configured jobs.
    pub async fn start(&self) -> Result<(), JobError> {
        info!("Starting RetailEase job scheduler");

        self.add_grace_period_job().await?;
        self.add_license_expiration_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("RetailEase job scheduler started successfully");

        Ok(())
    }

    /// Stop the job scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down RetailEase job scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        Ok(())
    }

    /// Add the grace period expiration job.
    async fn add_grace_period_job(&self) -> Result<(), JobError> {
        let db = Arc::clone(&self.db);

        let job = Job::new_async(self.config.grace_period_cron.as_str(), move |_uuid, _l| {
            let db = Arc::clone(&db);
            Box::pin(async move {
                info!("Running grace period expiration check");

                match run_grace_period_check(&db).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Grace period check: {} licenses revoked", count);
                        }
                    }
                    Err(e) => {
                        error!("Grace period check failed: {}", e);
                    }
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(
            "Added grace period expiration job (schedule: {})",
            self.config.grace_period_cron
        );

        Ok(())
    }

    /// Add the license expiration job.
    async fn add_license_expiration_job(&self) -> Result<(), JobError> {
        let db = Arc::clone(&self.db);

        let job = Job::new_async(self.config.license_expiration_cron.as_str(), move |_uuid, _l| {
            let db = Arc::clone(&db);
            Box::pin(async move {
                info!("Running license expiration check");

                match run_license_expiration_check(&db).await {
                    Ok(count) => {
                        if count > 0 {
                            info!("License expiration check: {} licenses expired", count);
                        }
                    }
                    Err(e) => {
                        error!("License expiration check failed: {}", e);
                    }
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(
            "Added license expiration job (schedule: {})",
            self.config.license_expiration_cron
        );

        Ok(())
    }

    /// Run the grace period check immediately (useful for testing or manual triggers).
    pub async fn run_grace_period_check_now(&self) -> Result<u32, JobError> {
        run_grace_period_check(&self.db).await
    }

    /// Run the license expiration check immediately (useful for testing or manual triggers).
    pub async fn run_license_expiration_check_now(&self) -> Result<u32, JobError> {
        run_license_expiration_check(&self.db).await
    }
}

/// Errors that can occur in the job scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::errors::LicenseError> for JobError {
    fn from(err: crate::errors::LicenseError) -> Self {
        JobError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = JobConfig::default();
        assert_eq!(config.grace_period_cron, "0 */15 * * * *");
        assert_eq!(config.license_expiration_cron, "0 0 * * * *");
    }
}
