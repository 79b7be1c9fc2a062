//! HTTP route handlers

pub mod catalog;
pub mod client;
pub mod devices;
pub mod licenses;
pub mod permissions;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::db::AppState;
use crate::middleware::require_admin;

/// Unauthenticated client endpoints: activation, validation, signed
/// downloads.
pub fn client_router() -> Router<AppState> {
    Router::new()
        .route("/api/client/activate", post(client::activate_license))
        .route("/api/client/validate", post(client::validate_license))
        .route("/api/client/files/{file_id}", get(client::download_file))
}

/// Admin endpoints, all behind API-key auth.
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/licenses",
            post(licenses::create_license).get(licenses::list_licenses),
        )
        .route(
            "/api/admin/licenses/{id}",
            get(licenses::get_license)
                .put(licenses::update_license)
                .delete(licenses::delete_license),
        )
        .route("/api/admin/licenses/{id}/revoke", post(licenses::revoke_license))
        .route(
            "/api/admin/licenses/{id}/devices",
            get(licenses::list_license_devices),
        )
        .route("/api/admin/devices/{id}/reactivate", post(devices::reactivate_device))
        .route("/api/admin/devices/{id}/deactivate", post(devices::deactivate_device))
        .route("/api/admin/devices/{id}", delete(devices::delete_device))
        .route("/api/admin/devices/{id}/logs", get(devices::device_activity))
        .route("/api/admin/devices/cleanup", post(devices::cleanup_devices))
        .route(
            "/api/admin/products",
            post(catalog::create_product).get(catalog::list_products),
        )
        .route("/api/admin/products/{id}", delete(catalog::delete_product))
        .route(
            "/api/admin/products/{id}/files",
            post(catalog::register_product_file),
        )
        .route(
            "/api/admin/policies",
            post(catalog::create_policy).get(catalog::list_policies),
        )
        .route("/api/admin/policies/{id}", delete(catalog::delete_policy))
        .route(
            "/api/admin/admins",
            post(permissions::create_admin).get(permissions::list_admins),
        )
        .route("/api/admin/admins/{id}", delete(permissions::delete_admin))
        .route(
            "/api/admin/admins/{id}/permissions",
            get(permissions::get_admin_permissions).put(permissions::set_admin_permissions),
        )
        .route("/api/admin/logs", get(permissions::admin_activity))
        .layer(axum::middleware::from_fn_with_state(state, require_admin))
}
