// src/routes/dashboard.rs
use axum::{
    Extension,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
};
use serde_json::{Value, json};

use crate::AppState;
use crate::analytics::{DashboardFilters, DashboardScope};
use crate::error::Result;
use crate::middleware::CallerContext;

pub async fn health_check() -> ResponseJson<Value> {
    ResponseJson(json!({
        "status": "healthy",
        "service": "auditboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// GET /analytics/dashboard/global
pub async fn global_dashboard(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Query(filters): Query<DashboardFilters>,
) -> Result<ResponseJson<Value>> {
    let payload = state
        .engine
        .get_dashboard(&caller.permission, DashboardScope::Global, &filters)
        .await?;
    Ok(ResponseJson(payload))
}

// GET /analytics/dashboard/company/:company_id
pub async fn company_dashboard(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(company_id): Path<String>,
    Query(filters): Query<DashboardFilters>,
) -> Result<ResponseJson<Value>> {
    let payload = state
        .engine
        .get_dashboard(&caller.permission, DashboardScope::Company(company_id), &filters)
        .await?;
    Ok(ResponseJson(payload))
}

// GET /analytics/dashboard/audit/:audit_id
pub async fn audit_dashboard(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(audit_id): Path<String>,
) -> Result<ResponseJson<Value>> {
    let payload = state
        .engine
        .get_dashboard(
            &caller.permission,
            DashboardScope::Audit(audit_id),
            &DashboardFilters::default(),
        )
        .await?;
    Ok(ResponseJson(payload))
}

// GET /analytics/entidades-criticas
pub async fn critical_entities(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Query(filters): Query<DashboardFilters>,
) -> Result<ResponseJson<Value>> {
    let payload = state
        .engine
        .top_critical_entities(&caller.permission, &filters)
        .await?;
    Ok(ResponseJson(payload))
}

// GET /analytics/entidades/:company_id/vulnerabilidades
pub async fn entity_vulnerabilities(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(company_id): Path<String>,
    Query(filters): Query<DashboardFilters>,
) -> Result<ResponseJson<Value>> {
    let payload = state
        .engine
        .entity_vulnerabilities(&caller.permission, &company_id, &filters)
        .await?;
    Ok(ResponseJson(payload))
}
