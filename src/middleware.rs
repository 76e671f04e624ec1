// src/middleware.rs
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::AppState;
use crate::error::AnalyticsError;
use crate::models::User;
use crate::permissions::{AnalyticsPermission, PermissionEvaluator, PermissionService, SectionName};

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_HEADER: &str = "x-user-id";

pub const PERMISSION_INFO_KEY: &str = "_permissionInfo";

/// Caller identity and the permission record in force for this request.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user: User,
    pub permission: AnalyticsPermission,
}

/// Resolves the caller, rejects roles without analytics access and attaches
/// a [`CallerContext`] to the request.
pub async fn load_permissions(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AnalyticsError> {
    let user_id = request
        .headers()
        .get(USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AnalyticsError::Unauthorized(format!("Missing {} header", USER_HEADER)))?
        .to_string();

    let user = match state.permissions.user(&user_id).await {
        Ok(user) => user,
        Err(AnalyticsError::NotFound(_)) => {
            tracing::warn!("Rejected request from unknown user {}", user_id);
            return Err(AnalyticsError::Unauthorized("Unknown user".to_string()));
        }
        Err(e) => return Err(e),
    };
    if !PermissionService::is_analyst_or_admin(&user) {
        return Err(AnalyticsError::Forbidden(
            "Analytics is restricted to analysts and administrators".to_string(),
        ));
    }

    let permission = state.permissions.effective_permission(&user).await?;
    tracing::debug!(
        "Caller {} (custom permissions: {})",
        user.username,
        permission.custom_permissions_enabled
    );
    request
        .extensions_mut()
        .insert(CallerContext { user, permission });
    Ok(next.run(request).await)
}

/// Must run inside [`load_permissions`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AnalyticsError> {
    let is_admin = request
        .extensions()
        .get::<CallerContext>()
        .is_some_and(|caller| caller.user.is_admin());
    if !is_admin {
        return Err(AnalyticsError::Forbidden(
            "Administrator role required".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Block attached to every filtered dashboard payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionInfo {
    pub custom_permissions_enabled: bool,
    pub only_flagged_companies: bool,
    pub visible_sections: BTreeMap<SectionName, bool>,
    pub has_restrictions: bool,
}

impl From<&AnalyticsPermission> for PermissionInfo {
    fn from(permission: &AnalyticsPermission) -> Self {
        Self {
            custom_permissions_enabled: permission.custom_permissions_enabled,
            only_flagged_companies: permission.custom_permissions_enabled
                && permission.global_only_flagged_companies,
            visible_sections: PermissionEvaluator::new(permission).visible_sections(),
            has_restrictions: permission.has_restrictions(),
        }
    }
}

/// Drops the sections `info` marks hidden and attaches `_permissionInfo`.
/// Anything other than a JSON object is returned as is.
pub fn filter_response(payload: Value, info: &PermissionInfo) -> Value {
    let Value::Object(mut map) = payload else {
        return payload;
    };
    let info_value = match serde_json::to_value(info) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Sending unfiltered response: {}", e);
            return Value::Object(map);
        }
    };
    for (section, visible) in &info.visible_sections {
        if !visible {
            map.remove(section.as_str());
        }
    }
    map.insert(PERMISSION_INFO_KEY.to_string(), info_value);
    Value::Object(map)
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Applies [`filter_response`] to successful JSON responses of dashboard
/// handlers. Failures leave the payload unfiltered.
pub async fn filter_dashboard_response(request: Request, next: Next) -> Response {
    let info = request
        .extensions()
        .get::<CallerContext>()
        .map(|caller| PermissionInfo::from(&caller.permission));
    let response = next.run(request).await;

    let Some(info) = info else {
        return response;
    };
    if !response.status().is_success() || !is_json(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        // The body stream is consumed by now; there is no unfiltered payload
        // left to send.
        Err(e) => {
            tracing::error!("Failed to buffer dashboard response: {}", e);
            return AnalyticsError::Internal(anyhow::anyhow!(e.to_string())).into_response();
        }
    };
    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Sending unfiltered response: {}", e);
            return Response::from_parts(parts, Body::from(bytes));
        }
    };

    match serde_json::to_vec(&filter_response(payload, &info)) {
        Ok(filtered) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(filtered))
        }
        Err(e) => {
            tracing::warn!("Sending unfiltered response: {}", e);
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn restricted() -> AnalyticsPermission {
        let mut perm = AnalyticsPermission::unrestricted("u1");
        perm.custom_permissions_enabled = true;
        perm.global_only_flagged_companies = true;
        perm.visible_sections.insert(SectionName::PorTipo, false);
        perm.visible_sections.insert(SectionName::Stats, true);
        perm
    }

    #[test]
    fn test_hidden_sections_are_removed() {
        let info = PermissionInfo::from(&restricted());
        let out = filter_response(
            json!({"stats": {}, "porTipo": [], "porAlcance": [], "scope": "global"}),
            &info,
        );
        assert!(out.get("porTipo").is_none());
        assert!(out.get("stats").is_some());
        assert!(out.get("porAlcance").is_some());
        assert_eq!(out["scope"], "global");
        assert_eq!(out[PERMISSION_INFO_KEY]["hasRestrictions"], true);
        assert_eq!(out[PERMISSION_INFO_KEY]["onlyFlaggedCompanies"], true);
        assert_eq!(out[PERMISSION_INFO_KEY]["visibleSections"]["porTipo"], false);
    }

    #[test]
    fn test_master_switch_off_keeps_everything() {
        let mut perm = restricted();
        perm.custom_permissions_enabled = false;
        let info = PermissionInfo::from(&perm);
        let out = filter_response(json!({"porTipo": []}), &info);
        assert!(out.get("porTipo").is_some());
        assert_eq!(out[PERMISSION_INFO_KEY]["customPermissionsEnabled"], false);
        assert_eq!(out[PERMISSION_INFO_KEY]["hasRestrictions"], false);
        assert_eq!(out[PERMISSION_INFO_KEY]["onlyFlaggedCompanies"], false);
    }

    #[test]
    fn test_non_object_payload_passes_through() {
        let info = PermissionInfo::from(&restricted());
        assert_eq!(filter_response(json!([1, 2]), &info), json!([1, 2]));
        assert_eq!(filter_response(Value::Null, &info), Value::Null);
    }
}
