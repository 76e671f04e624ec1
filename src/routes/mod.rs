// src/routes/mod.rs
pub mod dashboard;
pub mod permissions;

use axum::{
    Router,
    http::{Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middleware::{USER_HEADER, filter_dashboard_response, load_permissions, require_admin};

pub use dashboard::health_check;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(USER_HEADER),
        ]);

    let dashboards = Router::new()
        .route("/analytics/dashboard/global", get(dashboard::global_dashboard))
        .route(
            "/analytics/dashboard/company/:company_id",
            get(dashboard::company_dashboard),
        )
        .route(
            "/analytics/dashboard/audit/:audit_id",
            get(dashboard::audit_dashboard),
        )
        .route("/analytics/entidades-criticas", get(dashboard::critical_entities))
        .route(
            "/analytics/entidades/:company_id/vulnerabilidades",
            get(dashboard::entity_vulnerabilities),
        )
        .route_layer(from_fn(filter_dashboard_response));

    let admin = Router::new()
        .route("/analytics/permissions", get(permissions::list_permissions))
        .route(
            "/analytics/permissions/options",
            get(permissions::permission_options),
        )
        .route(
            "/analytics/permissions/cleanup",
            post(permissions::cleanup_orphans),
        )
        .route(
            "/analytics/permissions/:user_id",
            get(permissions::get_permissions)
                .put(permissions::upsert_permissions)
                .patch(permissions::patch_permissions)
                .delete(permissions::reset_permissions),
        )
        .route(
            "/analytics/permissions/:user_id/check",
            get(permissions::check_access),
        )
        .route_layer(from_fn(require_admin));

    // Layers added last run first: identity resolution wraps both groups.
    let protected = Router::new()
        .route("/analytics/permissions/me", get(permissions::my_permissions))
        .merge(dashboards)
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), load_permissions));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
