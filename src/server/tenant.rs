//! TenantStore: Business and Counter bookkeeping.
//!
//! A Business is the customer's registered storefront; Counters are the
//! individual point-of-sale devices synced under it. Both are upserted
//! through an allowlisted-fields update — unknown keys in the request body
//! are silently ignored rather than reflected onto the row.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use std::collections::HashMap;

use crate::errors::{LicenseError, LicenseResult};
use crate::server::database::{Business, Counter, Database};

#[derive(Debug, Default, serde::Deserialize)]
pub struct BusinessFields {
    pub name: Option<String>,
    pub legal_name: Option<String>,
    pub business_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub gst_number: Option<String>,
    pub pan_number: Option<String>,
    pub currency_code: Option<String>,
    pub currency_symbol: Option<String>,
    pub date_format: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct CounterFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub os_info: Option<String>,
    pub app_version: Option<String>,
    pub sync_enabled: Option<bool>,
}

#[derive(Clone)]
pub struct TenantStore {
    db: Arc<Database>,
    business_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TenantStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
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

    /// Upsert the Business for a License. If this is the first registration
    /// and `activation_id` already exists without a bound Counter, provision
    /// one (primary, since it's the first).
    pub async fn register_or_update_business(
        &self,
        license_id: &str,
        activation_id: Option<&str>,
        fields: BusinessFields,
    ) -> LicenseResult<Business> {
        let now = Utc::now().naive_utc();
        let existing_business = self.db.get_business_by_license(license_id).await?;
        let was_new = existing_business.is_none();
        let mut business = match existing_business {
            Some(existing) => existing,
            None => Business {
                id: uuid::Uuid::new_v4().to_string(),
                license_id: license_id.to_string(),
                name: fields.name.clone().unwrap_or_default(),
                legal_name: None,
                business_type: None,
                email: None,
                phone: None,
                website: None,
                address_line1: None,
                address_line2: None,
                city: None,
                state: None,
                country: None,
                postal_code: None,
                gst_number: None,
                pan_number: None,
                currency_code: None,
                currency_symbol: None,
                date_format: None,
                created_at: now,
                updated_at: now,
                last_synced_at: None,
            },
        };

        macro_rules! apply {
            ($field:ident) => {
                if let Some(v) = fields.$field {
                    business.$field = Some(v);
                }
            };
        }
        if let Some(name) = fields.name {
            business.name = name;
        }
        apply!(legal_name);
        apply!(business_type);
        apply!(email);
        apply!(phone);
        apply!(website);
        apply!(address_line1);
        apply!(address_line2);
        apply!(city);
        apply!(state);
        apply!(country);
        apply!(postal_code);
        apply!(gst_number);
        apply!(pan_number);
        apply!(currency_code);
        apply!(currency_symbol);
        apply!(date_format);

        business.updated_at = now;
        business.last_synced_at = Some(now);
        self.db.upsert_business(&business).await?;

        if was_new {
            if let Some(activation_id) = activation_id {
                if self.db.get_counter_by_activation(activation_id).await?.is_none() {
                    let counter = Counter {
                        id: uuid::Uuid::new_v4().to_string(),
                        business_id: business.id.clone(),
                        activation_id: activation_id.to_string(),
                        name: "Primary Counter".to_string(),
                        description: None,
                        device_name: None,
                        device_type: None,
                        os_info: None,
                        app_version: None,
                        status: "active".to_string(),
                        is_primary: true,
                        sync_enabled: true,
                        last_sync_at: None,
                    };
                    self.db.upsert_counter(&counter).await?;
                }
            }
        }

        Ok(business)
    }

    pub async fn update_counter(&self, counter_id: &str, fields: CounterFields) -> LicenseResult<Counter> {
        let mut counter = self
            .db
            .get_counter(counter_id)
            .await?
            .ok_or(LicenseError::CounterNotFound)?;

        if let Some(v) = fields.name {
            counter.name = v;
        }
        if let Some(v) = fields.description {
            counter.description = Some(v);
        }
        if let Some(v) = fields.device_name {
            counter.device_name = Some(v);
        }
        if let Some(v) = fields.device_type {
            counter.device_type = Some(v);
        }
        if let Some(v) = fields.os_info {
            counter.os_info = Some(v);
        }
        if let Some(v) = fields.app_version {
            counter.app_version = Some(v);
        }
        if let Some(v) = fields.sync_enabled {
            counter.sync_enabled = v;
        }

        self.db.upsert_counter(&counter).await?;
        Ok(counter)
    }

    pub async fn list_counters(
        &self,
        business_id: &str,
        current_activation_id: Option<&str>,
    ) -> LicenseResult<Vec<(Counter, bool)>> {
        let counters = self.db.list_counters_by_business(business_id).await?;
        Ok(counters
            .into_iter()
            .map(|c| {
                let is_current = current_activation_id.map(|id| id == c.activation_id).unwrap_or(false);
                (c, is_current)
            })
            .collect())
    }

    /// Deactivate a Counter, promoting the eldest remaining active Counter to
    /// primary if the deactivated one held that role.
    pub async fn deactivate_counter(&self, counter_id: &str) -> LicenseResult<()> {
        let mut counter = self
            .db
            .get_counter(counter_id)
            .await?
            .ok_or(LicenseError::CounterNotFound)?;

        let guard = self.lock_for(&counter.business_id).await;
        let _permit = guard.lock().await;

        let was_primary = counter.is_primary;
        counter.status = "inactive".to_string();
        counter.is_primary = false;
        self.db.upsert_counter(&counter).await?;

        if was_primary {
            let siblings = self.db.list_counters_by_business(&counter.business_id).await?;
            if let Some(mut successor) = siblings.into_iter().find(|c| c.status == "active" && c.id != counter.id) {
                successor.is_primary = true;
                self.db.upsert_counter(&successor).await?;
            }
        }

        Ok(())
    }
}
