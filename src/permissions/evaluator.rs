// src/permissions/evaluator.rs
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

use super::model::{AnalyticsPermission, EndpointFilter, EndpointName, SectionName};
use crate::models::Company;
use crate::store::{Collection, DocumentStore, Filter, StoreError, find_as};

/// Result of resolving a user's company visibility for one endpoint.
///
/// `Unrestricted` means "do not filter"; `Only` with an empty set means
/// "match nothing". The two must never be conflated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ids", rename_all = "lowercase")]
pub enum AllowedCompanies {
    Unrestricted,
    Only(BTreeSet<String>),
}

impl AllowedCompanies {
    pub fn contains(&self, company_id: &str) -> bool {
        match self {
            AllowedCompanies::Unrestricted => true,
            AllowedCompanies::Only(ids) => ids.contains(company_id),
        }
    }

    /// Filter fragment over `field`; empty for `Unrestricted`.
    pub fn to_filter(&self, field: &str) -> Filter {
        match self {
            AllowedCompanies::Unrestricted => Filter::new(),
            AllowedCompanies::Only(ids) => Filter::new().op(field, "$in", json!(ids)),
        }
    }
}

/// Read-only view over a permission record. Every method honours the master
/// switch before looking at any restriction field.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator<'a> {
    permission: &'a AnalyticsPermission,
}

impl<'a> PermissionEvaluator<'a> {
    pub fn new(permission: &'a AnalyticsPermission) -> Self {
        Self { permission }
    }

    fn restricted(&self) -> bool {
        self.permission.custom_permissions_enabled
    }

    fn endpoint(&self, endpoint: EndpointName) -> Option<&'a EndpointFilter> {
        self.permission.endpoint(endpoint)
    }

    pub fn is_endpoint_enabled(&self, endpoint: EndpointName) -> bool {
        if !self.restricted() {
            return true;
        }
        self.endpoint(endpoint).map(|e| e.is_enabled()).unwrap_or(true)
    }

    pub fn should_filter_by_flagged(&self, endpoint: EndpointName) -> bool {
        if !self.restricted() {
            return false;
        }
        if self.permission.global_only_flagged_companies {
            return true;
        }
        self.endpoint(endpoint)
            .map(|e| e.only_flagged_companies)
            .unwrap_or(false)
    }

    /// The allow-list in force for `endpoint`: endpoint-level when non-empty,
    /// otherwise the global one when non-empty.
    fn effective_allow_list(&self, endpoint: EndpointName) -> Option<&'a BTreeSet<String>> {
        self.endpoint(endpoint)
            .map(|e| &e.allowed_companies)
            .filter(|ids| !ids.is_empty())
            .or_else(|| {
                Some(&self.permission.global_allowed_companies).filter(|ids| !ids.is_empty())
            })
    }

    pub fn is_company_allowed(&self, company_id: &str, endpoint: EndpointName) -> bool {
        if !self.restricted() {
            return true;
        }
        if self.permission.global_excluded_companies.contains(company_id) {
            return false;
        }
        if !self.is_endpoint_enabled(endpoint) {
            return false;
        }
        match self.effective_allow_list(endpoint) {
            Some(ids) => ids.contains(company_id),
            None => true,
        }
    }

    /// Company predicate for `endpoint`, or `None` when unrestricted.
    pub fn company_predicate(&self, endpoint: EndpointName) -> Option<Filter> {
        if !self.restricted() {
            return None;
        }
        let mut filter = Filter::new().with("status", true);
        if self.should_filter_by_flagged(endpoint) {
            filter = filter.with("cuadroDeMando", true);
        }
        if let Some(ids) = self.effective_allow_list(endpoint) {
            filter = filter.op("_id", "$in", json!(ids));
        }
        if !self.permission.global_excluded_companies.is_empty() {
            filter = filter.op("_id", "$nin", json!(self.permission.global_excluded_companies));
        }
        Some(filter)
    }

    /// Materializes [`Self::company_predicate`] against the company collection.
    pub async fn allowed_company_ids(
        &self,
        store: &dyn DocumentStore,
        endpoint: EndpointName,
    ) -> Result<AllowedCompanies, StoreError> {
        let Some(predicate) = self.company_predicate(endpoint) else {
            return Ok(AllowedCompanies::Unrestricted);
        };
        let companies: Vec<Company> = find_as(store, Collection::Companies, &predicate).await?;
        Ok(AllowedCompanies::Only(
            companies.into_iter().map(|c| c.id).collect(),
        ))
    }

    pub fn max_results(&self, endpoint: EndpointName) -> usize {
        if !self.restricted() {
            return 0;
        }
        self.endpoint(endpoint)
            .map(|e| e.max_results as usize)
            .unwrap_or(0)
    }

    pub fn excluded_fields(&self, endpoint: EndpointName) -> BTreeSet<String> {
        if !self.restricted() {
            return BTreeSet::new();
        }
        self.endpoint(endpoint)
            .map(|e| e.excluded_fields.clone())
            .unwrap_or_default()
    }

    pub fn is_section_visible(&self, section: SectionName) -> bool {
        !self.restricted() || self.permission.section_flag(section) != Some(false)
    }

    /// Full visibility map over every known section.
    pub fn visible_sections(&self) -> BTreeMap<SectionName, bool> {
        SectionName::ALL
            .into_iter()
            .map(|s| (s, self.is_section_visible(s)))
            .collect()
    }
}

/// Applies a result cap where `limit == 0` means unlimited.
pub fn cap<T>(mut rows: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 {
        rows.truncate(limit);
    }
    rows
}

/// Serializes rows and removes `excluded` keys from each object.
pub fn strip_fields<T: Serialize>(
    rows: &[T],
    excluded: &BTreeSet<String>,
) -> Result<Vec<Value>, serde_json::Error> {
    rows.iter()
        .map(|row| {
            let mut value = serde_json::to_value(row)?;
            if let Value::Object(map) = &mut value {
                for field in excluded {
                    map.remove(field);
                }
            }
            Ok(value)
        })
        .collect()
}
