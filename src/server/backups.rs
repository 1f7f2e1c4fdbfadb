//! BackupIngestor: multipart upload, checksum verification, retention and download.
//!
//! Blobs live on disk under `<storage_root>/<business_id>/<filename>`; the
//! `Backup` row is authoritative for existence — a blob with no row is
//! garbage, a row with no blob is a bug. Uploads write to a temp file and
//! rename into place so a client hangup mid-stream never leaves a partial
//! file at the final path.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::errors::{LicenseError, LicenseResult};
use crate::server::database::{Backup, Database};

pub struct UploadRequest {
    pub business_id: String,
    pub counter_id: Option<String>,
    pub counter_name: String,
    pub file_bytes: Vec<u8>,
    pub backup_type: String,
    pub app_version: Option<String>,
    pub db_version: Option<i64>,
    pub record_counts: Option<String>,
    pub notes: Option<String>,
    pub claimed_checksum: Option<String>,
}

#[derive(Clone)]
pub struct BackupIngestor {
    db: Arc<Database>,
    storage_root: PathBuf,
    business_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl BackupIngestor {
    pub fn new(db: Arc<Database>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            db,
            storage_root: storage_root.into(),
            business_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn lock_for(&self, business_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.business_locks.lock().await;
        locks
            .entry(business_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn business_dir(&self, business_id: &str) -> PathBuf {
        self.storage_root.join(business_id)
    }

    pub async fn upload(&self, req: UploadRequest) -> LicenseResult<Backup> {
        if req.file_bytes.is_empty() {
            return Err(LicenseError::NoFile);
        }

        let mut hasher = Sha256::new();
        hasher.update(&req.file_bytes);
        let computed_checksum = hex::encode(hasher.finalize());

        if let Some(claimed) = &req.claimed_checksum {
            if !claimed.eq_ignore_ascii_case(&computed_checksum) {
                return Err(LicenseError::ChecksumMismatch);
            }
        }

        let now = Utc::now().naive_utc();
        let filename = format!(
            "backup_{}_{}_{}.enc",
            req.business_id,
            sanitize_component(&req.counter_name),
            now.format("%Y%m%d_%H%M%S")
        );

        let dir = self.business_dir(&req.business_id);
        let final_path = dir.join(&filename);
        let relative_path = Path::new(&req.business_id).join(&filename);

        let write_result = self.write_blob(&dir, &final_path, &req.file_bytes).await;

        let mut backup = Backup {
            id: uuid::Uuid::new_v4().to_string(),
            business_id: req.business_id.clone(),
            counter_id: req.counter_id.clone(),
            storage_path: relative_path.to_string_lossy().to_string(),
            filename,
            file_size: req.file_bytes.len() as i64,
            checksum: computed_checksum,
            is_encrypted: true,
            encryption_version: None,
            backup_type: req.backup_type,
            status: "completed".to_string(),
            app_version: req.app_version,
            db_version: req.db_version,
            record_counts: req.record_counts,
            notes: req.notes,
            created_at: now,
            uploaded_at: Some(now),
            error_message: None,
        };

        if let Err(e) = write_result {
            error!(business_id = %backup.business_id, "backup write failed: {e}");
            backup.status = "failed".to_string();
            backup.error_message = Some(e.to_string());
            self.db.insert_backup(&backup).await?;
            return Err(LicenseError::UploadError(e.to_string()));
        }

        self.db.insert_backup(&backup).await?;

        if let Some(counter_id) = &req.counter_id {
            if let Some(mut counter) = self.db.get_counter(counter_id).await? {
                counter.last_sync_at = Some(now);
                self.db.upsert_counter(&counter).await?;
            }
        }

        info!(backup_id = %backup.id, business_id = %backup.business_id, "backup uploaded");
        Ok(backup)
    }

    async fn write_blob(&self, dir: &Path, final_path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(dir).await?;
        let tmp_path = final_path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
        }
        fs::rename(&tmp_path, final_path).await?;
        Ok(())
    }

    pub async fn download(&self, backup_id: &str) -> LicenseResult<(Backup, Vec<u8>)> {
        let backup = self.db.get_backup(backup_id).await?.ok_or(LicenseError::BackupNotFound)?;
        let path = self.storage_root.join(&backup.storage_path);
        let bytes = fs::read(&path).await.map_err(|e| {
            error!(backup_id = %backup_id, "backup blob missing on disk: {e}");
            LicenseError::BackupNotFound
        })?;
        Ok((backup, bytes))
    }

    pub async fn list(
        &self,
        business_id: &str,
        backup_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> LicenseResult<Vec<Backup>> {
        self.db.list_backups_by_business(business_id, backup_type, limit, offset).await
    }

    pub async fn delete(&self, backup_id: &str) -> LicenseResult<()> {
        let backup = self.db.get_backup(backup_id).await?.ok_or(LicenseError::BackupNotFound)?;
        let path = self.storage_root.join(&backup.storage_path);
        let _ = fs::remove_file(&path).await;
        self.db.delete_backup(backup_id).await?;
        Ok(())
    }

    /// Delete all but the `keep_count` newest backups for a business (optionally
    /// filtered by type). Snapshots the set of ids to keep before deleting so a
    /// concurrent upload can't be pruned out from under itself.
    pub async fn cleanup(
        &self,
        business_id: &str,
        keep_count: usize,
        backup_type: Option<&str>,
    ) -> LicenseResult<usize> {
        let guard = self.lock_for(business_id).await;
        let _permit = guard.lock().await;

        let ids_newest_first = self.db.list_backup_ids_newest_first(business_id, backup_type).await?;
        let to_delete = ids_newest_first.into_iter().skip(keep_count).collect::<Vec<_>>();

        let mut deleted = 0;
        for id in to_delete {
            if let Ok(backup) = self.db.get_backup(&id).await {
                if let Some(backup) = backup {
                    let path = self.storage_root.join(&backup.storage_path);
                    let _ = fs::remove_file(&path).await;
                }
            }
            if self.db.delete_backup(&id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

fn sanitize_component(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "device".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_component_strips_unsafe_chars() {
        assert_eq!(sanitize_component("POS Till #1"), "POS_Till__1");
    }

    #[test]
    fn sanitize_component_falls_back_for_empty_input() {
        assert_eq!(sanitize_component("***"), "device");
    }
}
