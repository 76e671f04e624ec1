// src/permissions/service.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::evaluator::PermissionEvaluator;
use super::model::{AnalyticsPermission, EndpointName, SectionName};
use super::validation::{PermissionUpdate, is_valid_company_id};
use crate::error::{AnalyticsError, Result};
use crate::models::{Company, Role, User, UserSummary};
use crate::store::{Collection, DocumentStore, Filter, decode, encode, find_as, find_by_id};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSummary {
    pub user: UserSummary,
    pub custom_permissions_enabled: bool,
    pub has_restrictions: bool,
    pub disabled_endpoints: Vec<EndpointName>,
    pub hidden_sections: Vec<SectionName>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedOption {
    pub name: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyOption {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub cuadro_de_mando: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionOptions {
    pub endpoints: Vec<NamedOption>,
    pub sections: Vec<NamedOption>,
    pub companies: Vec<CompanyOption>,
}

enum UpdateMode {
    Replace,
    Patch,
}

/// Owns the per-user permission records.
#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn DocumentStore>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn by_user(user_id: &str) -> Filter {
        Filter::new().with("userId", user_id)
    }

    pub async fn user(&self, user_id: &str) -> Result<User> {
        find_by_id(self.store.as_ref(), Collection::Users, user_id)
            .await?
            .ok_or_else(|| AnalyticsError::NotFound(format!("user {}", user_id)))
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<AnalyticsPermission>> {
        let doc = self
            .store
            .find_one(Collection::Permissions, &Self::by_user(user_id))
            .await?;
        Ok(doc.map(|d| decode(Collection::Permissions, d)).transpose()?)
    }

    /// Returns the stored record, creating the unrestricted default on first
    /// access. Concurrent first accesses converge on a single record.
    pub async fn get_or_create(&self, user_id: &str) -> Result<AnalyticsPermission> {
        let default = encode(Collection::Permissions, &AnalyticsPermission::unrestricted(user_id))?;
        let stored = self
            .store
            .insert_if_absent(Collection::Permissions, &Self::by_user(user_id), default)
            .await?;
        Ok(decode(Collection::Permissions, stored)?)
    }

    /// Record the evaluator should see for `user`. Administrators are never
    /// restricted, whatever their stored record says.
    pub async fn effective_permission(&self, user: &User) -> Result<AnalyticsPermission> {
        if user.is_admin() {
            return Ok(AnalyticsPermission::unrestricted(&user.id));
        }
        self.get_or_create(&user.id).await
    }

    pub async fn get_permissions(&self, user_id: &str) -> Result<AnalyticsPermission> {
        self.user(user_id).await?;
        self.get_or_create(user_id).await
    }

    /// Full replace of the user's record.
    pub async fn upsert_permissions(
        &self,
        user_id: &str,
        payload: &Value,
        acting_user_id: &str,
    ) -> Result<AnalyticsPermission> {
        self.write(user_id, payload, acting_user_id, UpdateMode::Replace)
            .await
    }

    /// Partial update: omitted fields keep their stored values.
    pub async fn patch_permissions(
        &self,
        user_id: &str,
        payload: &Value,
        acting_user_id: &str,
    ) -> Result<AnalyticsPermission> {
        self.write(user_id, payload, acting_user_id, UpdateMode::Patch)
            .await
    }

    async fn write(
        &self,
        user_id: &str,
        payload: &Value,
        acting_user_id: &str,
        mode: UpdateMode,
    ) -> Result<AnalyticsPermission> {
        let update = PermissionUpdate::parse(payload).map_err(AnalyticsError::BadParameters)?;
        self.user(user_id).await?;

        let mut permission = self.get_or_create(user_id).await?;
        match mode {
            UpdateMode::Replace => update.apply_replace(&mut permission),
            UpdateMode::Patch => update.apply_patch(&mut permission),
        }
        if permission.created_by.is_none() {
            permission.created_by = Some(acting_user_id.to_string());
        }
        permission.updated_by = Some(acting_user_id.to_string());
        permission.updated_at = Utc::now();

        // Last write wins between concurrent administrators.
        self.store
            .replace_one(
                Collection::Permissions,
                &Self::by_user(user_id),
                encode(Collection::Permissions, &permission)?,
            )
            .await?;
        tracing::info!(
            "Permissions for user {} updated by {} (custom={})",
            user_id,
            acting_user_id,
            permission.custom_permissions_enabled
        );
        Ok(permission)
    }

    /// Deletes the record; the user reverts to the unrestricted default.
    pub async fn reset_permissions(&self, user_id: &str) -> Result<bool> {
        let removed = self
            .store
            .delete_many(Collection::Permissions, &Self::by_user(user_id))
            .await?;
        tracing::info!("Reset permissions for user {} ({} removed)", user_id, removed);
        Ok(removed > 0)
    }

    /// Removes records whose owning user no longer exists.
    pub async fn cleanup_orphans(&self) -> Result<u64> {
        let users: Vec<User> = find_as(self.store.as_ref(), Collection::Users, &Filter::new()).await?;
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        let removed = self
            .store
            .delete_many(
                Collection::Permissions,
                &Filter::new().op("userId", "$nin", json!(ids)),
            )
            .await?;
        if removed > 0 {
            tracing::warn!("Removed {} orphaned permission records", removed);
        }
        Ok(removed)
    }

    /// Every analyst with a summary of their (possibly not yet created) record.
    pub async fn list_permissions(&self) -> Result<Vec<PermissionSummary>> {
        let analysts: Vec<User> = find_as(
            self.store.as_ref(),
            Collection::Users,
            &Filter::new().with("role", "analyst"),
        )
        .await?;

        let mut summaries = Vec::with_capacity(analysts.len());
        for user in &analysts {
            let stored = self.find(&user.id).await?;
            let permission = stored
                .clone()
                .unwrap_or_else(|| AnalyticsPermission::unrestricted(&user.id));
            let eval = PermissionEvaluator::new(&permission);
            summaries.push(PermissionSummary {
                user: UserSummary::from(user),
                custom_permissions_enabled: permission.custom_permissions_enabled,
                has_restrictions: permission.has_restrictions(),
                disabled_endpoints: EndpointName::ALL
                    .into_iter()
                    .filter(|e| !eval.is_endpoint_enabled(*e))
                    .collect(),
                hidden_sections: SectionName::ALL
                    .into_iter()
                    .filter(|s| !eval.is_section_visible(*s))
                    .collect(),
                updated_at: stored.map(|p| p.updated_at),
            });
        }
        summaries.sort_by(|a, b| a.user.username.cmp(&b.user.username));
        Ok(summaries)
    }

    /// Choices an administrator picks from when editing a record.
    pub async fn options(&self) -> Result<PermissionOptions> {
        let mut companies: Vec<Company> = find_as(
            self.store.as_ref(),
            Collection::Companies,
            &Filter::new().with("status", true),
        )
        .await?;
        companies.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(PermissionOptions {
            endpoints: EndpointName::ALL
                .into_iter()
                .map(|e| NamedOption {
                    name: e.as_str(),
                    label: e.label(),
                })
                .collect(),
            sections: SectionName::ALL
                .into_iter()
                .map(|s| NamedOption {
                    name: s.as_str(),
                    label: s.label(),
                })
                .collect(),
            companies: companies
                .into_iter()
                .map(|c| CompanyOption {
                    id: c.id,
                    name: c.name,
                    short_name: c.short_name,
                    cuadro_de_mando: c.flagged,
                })
                .collect(),
        })
    }

    pub async fn check_access(
        &self,
        user_id: &str,
        company_id: &str,
        endpoint: EndpointName,
    ) -> Result<bool> {
        if !is_valid_company_id(company_id) {
            return Err(AnalyticsError::bad_parameter(
                "companyId",
                format!("'{}' is not a valid company id", company_id),
            ));
        }
        let user = self.user(user_id).await?;
        let permission = self.effective_permission(&user).await?;
        Ok(PermissionEvaluator::new(&permission).is_company_allowed(company_id, endpoint))
    }

    /// Company filter fragment over the audit `company` field; empty when the
    /// user is unrestricted.
    pub async fn build_company_filter(&self, user_id: &str, endpoint: EndpointName) -> Result<Filter> {
        let user = self.user(user_id).await?;
        let permission = self.effective_permission(&user).await?;
        let allowed = PermissionEvaluator::new(&permission)
            .allowed_company_ids(self.store.as_ref(), endpoint)
            .await?;
        Ok(allowed.to_filter("company"))
    }

    pub fn is_analyst_or_admin(user: &User) -> bool {
        matches!(user.role, Role::Admin | Role::Analyst)
    }
}
