//! SyncSessionLog: bookkeeping for device sync sessions.
//!
//! No server-side conflict resolution happens here — devices resolve
//! conflicts locally and report the tallies. This module only records what
//! happened and when.

use chrono::Utc;
use std::sync::Arc;

use crate::errors::{LicenseError, LicenseResult};
use crate::server::database::{Database, SyncLog};

pub struct SyncStats {
    pub records_uploaded: i64,
    pub records_downloaded: i64,
    pub conflicts_detected: i64,
    pub conflicts_resolved: i64,
}

#[derive(Clone)]
pub struct SyncSessionLog {
    db: Arc<Database>,
}

impl SyncSessionLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn start(&self, business_id: &str, counter_id: &str, sync_type: &str, direction: &str) -> LicenseResult<SyncLog> {
        let log = SyncLog {
            id: uuid::Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            counter_id: counter_id.to_string(),
            sync_type: sync_type.to_string(),
            sync_direction: direction.to_string(),
            status: "started".to_string(),
            records_uploaded: 0,
            records_downloaded: 0,
            conflicts_detected: 0,
            conflicts_resolved: 0,
            started_at: Utc::now().naive_utc(),
            completed_at: None,
            duration_seconds: None,
            details: None,
            error_message: None,
        };
        self.db.insert_sync_log(&log).await?;
        Ok(log)
    }

    pub async fn complete(
        &self,
        sync_id: &str,
        stats: SyncStats,
        status: &str,
        error_message: Option<String>,
    ) -> LicenseResult<SyncLog> {
        let mut log = self.db.get_sync_log(sync_id).await?.ok_or(LicenseError::ActivationNotFound)?;

        let now = Utc::now().naive_utc();
        log.records_uploaded = stats.records_uploaded;
        log.records_downloaded = stats.records_downloaded;
        log.conflicts_detected = stats.conflicts_detected;
        log.conflicts_resolved = stats.conflicts_resolved;
        log.status = status.to_string();
        log.completed_at = Some(now);
        log.duration_seconds = Some((now - log.started_at).num_seconds());
        log.error_message = error_message;

        self.db.insert_sync_log(&log).await?;

        if let Some(mut counter) = self.db.get_counter(&log.counter_id).await? {
            counter.last_sync_at = Some(now);
            self.db.upsert_counter(&counter).await?;
        }

        Ok(log)
    }

    pub async fn history(&self, business_id: &str, limit: i64) -> LicenseResult<Vec<SyncLog>> {
        self.db.list_sync_logs_by_business(business_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_stats_construction() {
        let stats = SyncStats {
            records_uploaded: 10,
            records_downloaded: 5,
            conflicts_detected: 1,
            conflicts_resolved: 1,
        };
        assert_eq!(stats.records_uploaded, 10);
    }
}
