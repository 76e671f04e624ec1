// src/analytics/audit.rs
use serde::Serialize;

use crate::findings::percentage;
use crate::models::{AuditRecord, AuditState};

/// Share of the completion checklist an audit has satisfied: the four
/// document references, approval, and at least one recorded finding.
pub fn completion_percentage(audit: &AuditRecord) -> u64 {
    let present = |doc: &Option<String>| doc.as_deref().is_some_and(|d| !d.trim().is_empty());
    let docs = &audit.documents;
    let checks = [
        present(&docs.solicitud),
        present(&docs.instructivo),
        present(&docs.informe),
        present(&docs.respuesta),
        audit.state == AuditState::Approved,
        !audit.findings.is_empty(),
    ];
    let done = checks.iter().filter(|c| **c).count() as u64;
    percentage(done, checks.len() as u64)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
    pub client: Option<String>,
    pub audit_type: Option<String>,
    pub alcance: Vec<String>,
    pub state: AuditState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub evaluation_days: Option<f64>,
    pub completion: u64,
}

impl From<&AuditRecord> for AuditSummary {
    fn from(audit: &AuditRecord) -> Self {
        Self {
            id: audit.id.clone(),
            name: audit.name.clone(),
            company: audit.company.clone(),
            client: audit.client.clone(),
            audit_type: audit.audit_type.clone(),
            alcance: audit.alcance.clone(),
            state: audit.state,
            created_at: audit.created_at,
            date_start: audit.date_start.clone(),
            date_end: audit.date_end.clone(),
            evaluation_days: audit.evaluation_days(),
            completion: completion_percentage(audit),
        }
    }
}
