// src/permissions/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Dashboard entry points a permission record can restrict independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointName {
    GlobalDashboard,
    CompanyDashboard,
    AuditDashboard,
    EntidadesCriticas,
    VulnerabilidadesEntidad,
}

impl EndpointName {
    pub const ALL: [EndpointName; 5] = [
        EndpointName::GlobalDashboard,
        EndpointName::CompanyDashboard,
        EndpointName::AuditDashboard,
        EndpointName::EntidadesCriticas,
        EndpointName::VulnerabilidadesEntidad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointName::GlobalDashboard => "globalDashboard",
            EndpointName::CompanyDashboard => "companyDashboard",
            EndpointName::AuditDashboard => "auditDashboard",
            EndpointName::EntidadesCriticas => "entidadesCriticas",
            EndpointName::VulnerabilidadesEntidad => "vulnerabilidadesEntidad",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EndpointName::GlobalDashboard => "Global dashboard",
            EndpointName::CompanyDashboard => "Company dashboard",
            EndpointName::AuditDashboard => "Audit dashboard",
            EndpointName::EntidadesCriticas => "Critical-risk entities",
            EndpointName::VulnerabilidadesEntidad => "Entity vulnerabilities",
        }
    }
}

impl std::fmt::Display for EndpointName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EndpointName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EndpointName::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown endpoint '{}'", s))
    }
}

/// Named blocks of a dashboard payload. The serialized name is the payload key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionName {
    Stats,
    PorProcedimiento,
    PorAlcance,
    PorEstado,
    PorTipo,
    PorSeveridad,
    TendenciaMensual,
    EntidadesEvaluadas,
    EvaluacionesRecientes,
    AlertasActivas,
    ClientesAsociados,
}

impl SectionName {
    pub const ALL: [SectionName; 11] = [
        SectionName::Stats,
        SectionName::PorProcedimiento,
        SectionName::PorAlcance,
        SectionName::PorEstado,
        SectionName::PorTipo,
        SectionName::PorSeveridad,
        SectionName::TendenciaMensual,
        SectionName::EntidadesEvaluadas,
        SectionName::EvaluacionesRecientes,
        SectionName::AlertasActivas,
        SectionName::ClientesAsociados,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Stats => "stats",
            SectionName::PorProcedimiento => "porProcedimiento",
            SectionName::PorAlcance => "porAlcance",
            SectionName::PorEstado => "porEstado",
            SectionName::PorTipo => "porTipo",
            SectionName::PorSeveridad => "porSeveridad",
            SectionName::TendenciaMensual => "tendenciaMensual",
            SectionName::EntidadesEvaluadas => "entidadesEvaluadas",
            SectionName::EvaluacionesRecientes => "evaluacionesRecientes",
            SectionName::AlertasActivas => "alertasActivas",
            SectionName::ClientesAsociados => "clientesAsociados",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SectionName::Stats => "General statistics",
            SectionName::PorProcedimiento => "By procedure",
            SectionName::PorAlcance => "By scope",
            SectionName::PorEstado => "By status",
            SectionName::PorTipo => "By audit type",
            SectionName::PorSeveridad => "By severity",
            SectionName::TendenciaMensual => "Monthly trend",
            SectionName::EntidadesEvaluadas => "Evaluated entities",
            SectionName::EvaluacionesRecientes => "Recent evaluations",
            SectionName::AlertasActivas => "Active alerts",
            SectionName::ClientesAsociados => "Associated clients",
        }
    }
}

impl std::str::FromStr for SectionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionName::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointFilter {
    /// `None` reads as enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub only_flagged_companies: bool,
    #[serde(default)]
    pub allowed_companies: BTreeSet<String>,
    #[serde(default)]
    pub excluded_fields: BTreeSet<String>,
    /// 0 = unlimited.
    #[serde(default)]
    pub max_results: u32,
}

impl EndpointFilter {
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPermission {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub custom_permissions_enabled: bool,
    #[serde(default)]
    pub global_only_flagged_companies: bool,
    #[serde(default)]
    pub global_allowed_companies: BTreeSet<String>,
    #[serde(default)]
    pub global_excluded_companies: BTreeSet<String>,
    #[serde(default)]
    pub endpoints: BTreeMap<EndpointName, EndpointFilter>,
    /// Absent keys read as visible, so sections added later default on.
    #[serde(default)]
    pub visible_sections: BTreeMap<SectionName, bool>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalyticsPermission {
    /// The record every user starts with: master switch off, nothing restricted.
    pub fn unrestricted(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            custom_permissions_enabled: false,
            global_only_flagged_companies: false,
            global_allowed_companies: BTreeSet::new(),
            global_excluded_companies: BTreeSet::new(),
            endpoints: BTreeMap::new(),
            visible_sections: BTreeMap::new(),
            created_by: None,
            updated_by: None,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn endpoint(&self, endpoint: EndpointName) -> Option<&EndpointFilter> {
        self.endpoints.get(&endpoint)
    }

    /// Stored visibility, without defaulting.
    pub fn section_flag(&self, section: SectionName) -> Option<bool> {
        self.visible_sections.get(&section).copied()
    }

    pub fn has_restrictions(&self) -> bool {
        self.custom_permissions_enabled
            && (self.global_only_flagged_companies
                || !self.global_allowed_companies.is_empty()
                || !self.global_excluded_companies.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persisted_shape_round_trips_field_names() {
        let mut perm = AnalyticsPermission::unrestricted("u1");
        perm.custom_permissions_enabled = true;
        perm.endpoints.insert(
            EndpointName::EntidadesCriticas,
            EndpointFilter {
                max_results: 5,
                ..Default::default()
            },
        );
        perm.visible_sections.insert(SectionName::PorAlcance, false);

        let value = serde_json::to_value(&perm).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["customPermissionsEnabled"], true);
        assert_eq!(value["endpoints"]["entidadesCriticas"]["maxResults"], 5);
        assert_eq!(value["visibleSections"]["porAlcance"], false);

        let back: AnalyticsPermission = serde_json::from_value(value).unwrap();
        assert_eq!(back, perm);
    }

    #[test]
    fn test_missing_sub_records_default() {
        let perm: AnalyticsPermission = serde_json::from_value(json!({
            "_id": "p1",
            "userId": "u1",
            "customPermissionsEnabled": true,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(perm.endpoint(EndpointName::GlobalDashboard).is_none());
        assert_eq!(perm.section_flag(SectionName::Stats), None);
        assert!(!perm.has_restrictions());
    }

    #[test]
    fn test_names_parse() {
        assert_eq!("auditDashboard".parse::<EndpointName>(), Ok(EndpointName::AuditDashboard));
        assert!("adminDashboard".parse::<EndpointName>().is_err());
        assert_eq!("clientesAsociados".parse::<SectionName>(), Ok(SectionName::ClientesAsociados));
        assert_eq!(SectionName::ALL.len(), 11);
    }
}
