// src/permissions/validation.rs
//! Parsing of administrative permission updates.
//!
//! The payload is checked field by field and every problem is reported, so an
//! admin UI can highlight all invalid inputs in one round trip.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::model::{AnalyticsPermission, EndpointFilter, EndpointName, SectionName};
use crate::error::FieldError;

static COMPANY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("static regex"));

/// Keys a client may echo back from a fetched record; they are ignored.
const READ_ONLY_KEYS: [&str; 7] = [
    "_id",
    "userId",
    "createdAt",
    "updatedAt",
    "createdBy",
    "updatedBy",
    "__v",
];

pub fn is_valid_company_id(id: &str) -> bool {
    COMPANY_ID_RE.is_match(id)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointFilterUpdate {
    pub enabled: Option<bool>,
    pub only_flagged_companies: Option<bool>,
    pub allowed_companies: Option<BTreeSet<String>>,
    pub excluded_fields: Option<BTreeSet<String>>,
    pub max_results: Option<u32>,
}

impl EndpointFilterUpdate {
    fn apply_to(&self, target: &mut EndpointFilter) {
        if let Some(enabled) = self.enabled {
            target.enabled = Some(enabled);
        }
        if let Some(flagged) = self.only_flagged_companies {
            target.only_flagged_companies = flagged;
        }
        if let Some(ids) = &self.allowed_companies {
            target.allowed_companies = ids.clone();
        }
        if let Some(fields) = &self.excluded_fields {
            target.excluded_fields = fields.clone();
        }
        if let Some(max) = self.max_results {
            target.max_results = max;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionUpdate {
    pub custom_permissions_enabled: Option<bool>,
    pub global_only_flagged_companies: Option<bool>,
    pub global_allowed_companies: Option<BTreeSet<String>>,
    pub global_excluded_companies: Option<BTreeSet<String>>,
    pub endpoints: Option<BTreeMap<EndpointName, EndpointFilterUpdate>>,
    pub visible_sections: Option<BTreeMap<SectionName, bool>>,
    pub notes: Option<String>,
}

impl PermissionUpdate {
    pub fn parse(payload: &Value) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();
        let Some(root) = payload.as_object() else {
            return Err(vec![FieldError::new("body", "must be a JSON object")]);
        };

        let mut update = PermissionUpdate::default();
        for (key, value) in root {
            match key.as_str() {
                "customPermissionsEnabled" => {
                    update.custom_permissions_enabled = read_bool(key, value, &mut errors)
                }
                "globalOnlyFlaggedCompanies" => {
                    update.global_only_flagged_companies = read_bool(key, value, &mut errors)
                }
                "globalAllowedCompanies" => {
                    update.global_allowed_companies = read_company_ids(key, value, &mut errors)
                }
                "globalExcludedCompanies" => {
                    update.global_excluded_companies = read_company_ids(key, value, &mut errors)
                }
                "endpoints" => update.endpoints = read_endpoints(value, &mut errors),
                "visibleSections" => update.visible_sections = read_sections(value, &mut errors),
                "notes" => match value {
                    Value::String(s) => update.notes = Some(s.clone()),
                    Value::Null => update.notes = Some(String::new()),
                    _ => errors.push(FieldError::new(key.as_str(), "must be a string")),
                },
                k if READ_ONLY_KEYS.contains(&k) => {}
                other => errors.push(FieldError::new(other, "unknown field")),
            }
        }

        if errors.is_empty() {
            Ok(update)
        } else {
            Err(errors)
        }
    }

    /// Partial update: only fields present in the payload change.
    pub fn apply_patch(&self, target: &mut AnalyticsPermission) {
        if let Some(v) = self.custom_permissions_enabled {
            target.custom_permissions_enabled = v;
        }
        if let Some(v) = self.global_only_flagged_companies {
            target.global_only_flagged_companies = v;
        }
        if let Some(v) = &self.global_allowed_companies {
            target.global_allowed_companies = v.clone();
        }
        if let Some(v) = &self.global_excluded_companies {
            target.global_excluded_companies = v.clone();
        }
        if let Some(endpoints) = &self.endpoints {
            for (name, update) in endpoints {
                update.apply_to(target.endpoints.entry(*name).or_default());
            }
        }
        if let Some(sections) = &self.visible_sections {
            target.visible_sections.extend(sections.iter().map(|(k, v)| (*k, *v)));
        }
        if let Some(notes) = &self.notes {
            target.notes = notes.clone();
        }
    }

    /// Full replace: omitted fields fall back to their unrestricted defaults.
    /// Identity and creation metadata of `target` are kept.
    pub fn apply_replace(&self, target: &mut AnalyticsPermission) {
        let mut fresh = AnalyticsPermission::unrestricted(&target.user_id);
        fresh.id = target.id.clone();
        fresh.created_at = target.created_at;
        fresh.created_by = target.created_by.clone();
        self.apply_patch(&mut fresh);
        *target = fresh;
    }
}

fn read_bool(key: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<bool> {
    match value.as_bool() {
        Some(b) => Some(b),
        None => {
            errors.push(FieldError::new(key, "must be a boolean"));
            None
        }
    }
}

fn read_string_set(key: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<Vec<String>> {
    let Some(items) = value.as_array() else {
        errors.push(FieldError::new(key, "must be an array of strings"));
        return None;
    };
    let mut out = Vec::with_capacity(items.len());
    let mut ok = true;
    for (idx, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
            _ => {
                errors.push(FieldError::new(format!("{}[{}]", key, idx), "must be a non-empty string"));
                ok = false;
            }
        }
    }
    ok.then_some(out)
}

fn read_company_ids(
    key: &str,
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<BTreeSet<String>> {
    let ids = read_string_set(key, value, errors)?;
    let mut ok = true;
    for (idx, id) in ids.iter().enumerate() {
        if !is_valid_company_id(id) {
            errors.push(FieldError::new(
                format!("{}[{}]", key, idx),
                format!("'{}' is not a valid company id", id),
            ));
            ok = false;
        }
    }
    ok.then(|| ids.into_iter().collect())
}

fn read_endpoints(
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<BTreeMap<EndpointName, EndpointFilterUpdate>> {
    let Some(map) = value.as_object() else {
        errors.push(FieldError::new("endpoints", "must be an object"));
        return None;
    };
    let before = errors.len();
    let mut out = BTreeMap::new();
    for (name, raw) in map {
        let path = format!("endpoints.{}", name);
        let Ok(endpoint) = name.parse::<EndpointName>() else {
            errors.push(FieldError::new(path, "unknown endpoint"));
            continue;
        };
        if let Some(update) = read_endpoint_filter(&path, raw, errors) {
            out.insert(endpoint, update);
        }
    }
    (errors.len() == before).then_some(out)
}

fn read_endpoint_filter(
    path: &str,
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<EndpointFilterUpdate> {
    let Some(map) = value.as_object() else {
        errors.push(FieldError::new(path, "must be an object"));
        return None;
    };
    let before = errors.len();
    let mut update = EndpointFilterUpdate::default();
    for (key, raw) in map {
        let field = format!("{}.{}", path, key);
        match key.as_str() {
            "enabled" => update.enabled = read_bool(&field, raw, errors),
            "onlyFlaggedCompanies" => update.only_flagged_companies = read_bool(&field, raw, errors),
            "allowedCompanies" => update.allowed_companies = read_company_ids(&field, raw, errors),
            "excludedFields" => {
                update.excluded_fields =
                    read_string_set(&field, raw, errors).map(|v| v.into_iter().collect())
            }
            "maxResults" => update.max_results = read_max_results(&field, raw, errors),
            _ => errors.push(FieldError::new(field, "unknown field")),
        }
    }
    (errors.len() == before).then_some(update)
}

fn read_max_results(field: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<u32> {
    match value.as_u64().and_then(|n| u32::try_from(n).ok()) {
        Some(n) => Some(n),
        None => {
            errors.push(FieldError::new(field, "must be a non-negative integer (0 = unlimited)"));
            None
        }
    }
}

fn read_sections(value: &Value, errors: &mut Vec<FieldError>) -> Option<BTreeMap<SectionName, bool>> {
    let Some(map) = value.as_object() else {
        errors.push(FieldError::new("visibleSections", "must be an object"));
        return None;
    };
    let before = errors.len();
    let mut out = BTreeMap::new();
    for (name, raw) in map {
        let path = format!("visibleSections.{}", name);
        let Ok(section) = name.parse::<SectionName>() else {
            errors.push(FieldError::new(path, "unknown section"));
            continue;
        };
        if let Some(visible) = read_bool(&path, raw, errors) {
            out.insert(section, visible);
        }
    }
    (errors.len() == before).then_some(out)
}
