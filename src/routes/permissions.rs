// src/routes/permissions.rs
use axum::{
    Extension,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::Result;
use crate::middleware::{CallerContext, PermissionInfo};
use crate::permissions::{AnalyticsPermission, EndpointName, PermissionOptions, PermissionSummary};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    pub company_id: String,
    pub endpoint: EndpointName,
}

// GET /analytics/permissions/me
pub async fn my_permissions(Extension(caller): Extension<CallerContext>) -> ResponseJson<Value> {
    ResponseJson(json!({
        "userId": caller.user.id,
        "role": caller.user.role,
        "permissions": caller.permission,
        "permissionInfo": PermissionInfo::from(&caller.permission),
    }))
}

// GET /analytics/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<PermissionSummary>>> {
    Ok(ResponseJson(state.permissions.list_permissions().await?))
}

// GET /analytics/permissions/options
pub async fn permission_options(
    State(state): State<AppState>,
) -> Result<ResponseJson<PermissionOptions>> {
    Ok(ResponseJson(state.permissions.options().await?))
}

// GET /analytics/permissions/:user_id
pub async fn get_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<ResponseJson<AnalyticsPermission>> {
    Ok(ResponseJson(state.permissions.get_permissions(&user_id).await?))
}

// PUT /analytics/permissions/:user_id
pub async fn upsert_permissions(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(user_id): Path<String>,
    ResponseJson(payload): ResponseJson<Value>,
) -> Result<ResponseJson<AnalyticsPermission>> {
    let permission = state
        .permissions
        .upsert_permissions(&user_id, &payload, &caller.user.id)
        .await?;
    Ok(ResponseJson(permission))
}

// PATCH /analytics/permissions/:user_id
pub async fn patch_permissions(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(user_id): Path<String>,
    ResponseJson(payload): ResponseJson<Value>,
) -> Result<ResponseJson<AnalyticsPermission>> {
    let permission = state
        .permissions
        .patch_permissions(&user_id, &payload, &caller.user.id)
        .await?;
    Ok(ResponseJson(permission))
}

// DELETE /analytics/permissions/:user_id
pub async fn reset_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<ResponseJson<Value>> {
    let removed = state.permissions.reset_permissions(&user_id).await?;
    Ok(ResponseJson(json!({ "userId": user_id, "reset": removed })))
}

// GET /analytics/permissions/:user_id/check?companyId=..&endpoint=..
pub async fn check_access(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<CheckQuery>,
) -> Result<ResponseJson<Value>> {
    let allowed = state
        .permissions
        .check_access(&user_id, &query.company_id, query.endpoint)
        .await?;
    Ok(ResponseJson(json!({
        "userId": user_id,
        "companyId": query.company_id,
        "endpoint": query.endpoint,
        "allowed": allowed,
    })))
}

// POST /analytics/permissions/cleanup
pub async fn cleanup_orphans(State(state): State<AppState>) -> Result<ResponseJson<Value>> {
    let removed = state.permissions.cleanup_orphans().await?;
    Ok(ResponseJson(json!({ "removed": removed })))
}
