//! HTTP router assembly for the RetailEase licensing API.

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::server::admin::{
    create_license_handler, extend_license_handler, get_license_handler, reinstate_license_handler,
    renew_license_handler, revoke_license_handler, suspend_license_handler,
};
use crate::server::handlers::{
    authenticate_handler, by_email_handler, check_license_handler, cleanup_backups_handler, complete_sync_handler,
    config_handler, deactivate_counter_handler, deactivate_license_handler, delete_backup_handler,
    download_backup_handler, get_business_handler, health_handler, list_backups_handler, list_counters_handler,
    logout_handler, public_key_handler, refresh_license_handler, register_business_handler, start_sync_handler,
    status_handler, sync_history_handler, update_counter_handler, upload_backup_handler, validate_license_handler,
    AppState,
};
use crate::server::ip_whitelist::IpWhitelistLayer;
use crate::server::logging::request_logging_middleware;

#[cfg(feature = "rate-limiting")]
use crate::server::rate_limit::{create_rate_limiter, RateLimitType};

/// Build the full application router.
///
/// ## Public routes
/// - `GET  /health`, `GET /config`, `GET /public-key`, `GET /license/by-email`
/// - `POST /license/validate`, `/license/check`, `/license/refresh`, `/license/deactivate`
/// - `POST /license/renew` (admin key)
/// - `POST /admin/licenses`, `GET /admin/licenses/:id`, `/admin/licenses/:id/{revoke,suspend,reinstate,extend}` (admin key)
///
/// ## Token-gated routes (`Authorization: Bearer <token>`)
/// - `POST /retailease/auth/`, `POST /retailease/logout`, `GET /retailease/status`
/// - `GET /retailease/business`, `POST /retailease/business/register`
/// - `GET /retailease/counters`, `PATCH /retailease/counters/:id`, `POST /retailease/counters/:id/deactivate`
/// - `GET /retailease/backups`, `POST /retailease/backups/upload/`, `GET /retailease/backups/:id`,
///   `POST /retailease/backups/:id/delete`, `POST /retailease/backups/cleanup`
/// - `POST /retailease/sync/start`, `POST /retailease/sync/:id/complete`, `GET /retailease/sync/history`
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/config", get(config_handler))
        .route("/public-key", get(public_key_handler))
        .route("/license/by-email", get(by_email_handler))
        .route("/license/validate", post(validate_license_handler))
        .route("/license/check", post(check_license_handler))
        .route("/license/refresh", post(refresh_license_handler))
        .route("/license/deactivate", post(deactivate_license_handler));

    #[cfg(feature = "rate-limiting")]
    let public = public.layer(create_rate_limiter(&state.config.rate_limit, RateLimitType::Validate));

    let admin = Router::new()
        .route("/license/renew", post(renew_license_handler))
        .route("/admin/licenses", post(create_license_handler))
        .route("/admin/licenses/:license_id", get(get_license_handler))
        .route("/admin/licenses/:license_id/revoke", post(revoke_license_handler))
        .route("/admin/licenses/:license_id/suspend", post(suspend_license_handler))
        .route("/admin/licenses/:license_id/reinstate", post(reinstate_license_handler))
        .route("/admin/licenses/:license_id/extend", post(extend_license_handler));

    let admin = if state.config.admin.ip_whitelist.is_empty() {
        admin
    } else {
        admin.layer(IpWhitelistLayer::from_config(&state.config.admin.ip_whitelist))
    };

    let auth = Router::new().route("/retailease/auth/", post(authenticate_handler));

    #[cfg(feature = "rate-limiting")]
    let auth = auth.layer(create_rate_limiter(&state.config.rate_limit, RateLimitType::Auth));

    let tenant = Router::new()
        .route("/retailease/logout", post(logout_handler))
        .route("/retailease/status", get(status_handler))
        .route("/retailease/business", get(get_business_handler))
        .route("/retailease/business/register", post(register_business_handler))
        .route("/retailease/counters", get(list_counters_handler))
        .route("/retailease/counters/:counter_id", patch(update_counter_handler))
        .route("/retailease/counters/:counter_id/deactivate", post(deactivate_counter_handler))
        .route("/retailease/backups", get(list_backups_handler))
        .route("/retailease/backups/:backup_id", get(download_backup_handler))
        .route("/retailease/backups/:backup_id/delete", post(delete_backup_handler))
        .route("/retailease/backups/cleanup", post(cleanup_backups_handler))
        .route("/retailease/sync/start", post(start_sync_handler))
        .route("/retailease/sync/:sync_id/complete", post(complete_sync_handler))
        .route("/retailease/sync/history", get(sync_history_handler));

    let uploads = Router::new().route("/retailease/backups/upload/", post(upload_backup_handler));

    #[cfg(feature = "rate-limiting")]
    let uploads = uploads.layer(create_rate_limiter(&state.config.rate_limit, RateLimitType::Backup));

    Router::new()
        .merge(public)
        .merge(admin)
        .merge(auth)
        .merge(tenant)
        .merge(uploads)
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
