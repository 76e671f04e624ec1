// src/analytics/lists.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::cvss::{Severity, finding_severity};
use crate::findings::analyze;
use crate::models::{AuditRecord, AuditState, Company, RetestStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEvaluation {
    pub id: String,
    pub name: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub state: AuditState,
    pub created_at: DateTime<Utc>,
    pub findings: u64,
    pub critical: u64,
    pub high: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedEntity {
    pub company_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub cuadro_de_mando: bool,
    pub audits: u64,
    pub findings: u64,
    pub remediation_rate: u64,
    pub last_evaluation: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlert {
    pub audit_id: String,
    pub audit_name: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub critical_active: u64,
    pub high_active: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociatedClient {
    pub client: String,
    pub audits: u64,
}

fn company_name(audit: &AuditRecord, companies: &HashMap<String, Company>) -> Option<String> {
    audit
        .company
        .as_ref()
        .and_then(|id| companies.get(id))
        .map(|c| c.name.clone())
}

/// Newest audits first.
pub fn recent_evaluations(
    audits: &[AuditRecord],
    companies: &HashMap<String, Company>,
) -> Vec<RecentEvaluation> {
    let mut rows: Vec<RecentEvaluation> = audits
        .iter()
        .map(|audit| {
            let stats = analyze(&audit.findings);
            RecentEvaluation {
                id: audit.id.clone(),
                name: audit.name.clone(),
                company_id: audit.company.clone(),
                company_name: company_name(audit, companies),
                state: audit.state,
                created_at: audit.created_at,
                findings: stats.total,
                critical: stats.critical,
                high: stats.high,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    rows
}

/// Companies with at least one matched audit, most audited first.
pub fn evaluated_entities(
    audits: &[AuditRecord],
    companies: &HashMap<String, Company>,
) -> Vec<EvaluatedEntity> {
    let mut grouped: HashMap<&str, Vec<&AuditRecord>> = HashMap::new();
    for audit in audits {
        if let Some(company) = audit.company.as_deref() {
            grouped.entry(company).or_default().push(audit);
        }
    }

    let mut rows: Vec<EvaluatedEntity> = grouped
        .into_iter()
        .filter_map(|(company_id, audits)| {
            let last_evaluation = audits.iter().map(|a| a.created_at).max()?;
            let stats = analyze(audits.iter().flat_map(|a| a.findings.iter()));
            let company = companies.get(company_id);
            Some(EvaluatedEntity {
                company_id: company_id.to_string(),
                name: company
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| company_id.to_string()),
                short_name: company.and_then(|c| c.short_name.clone()),
                cuadro_de_mando: company.map(|c| c.flagged).unwrap_or(false),
                audits: audits.len() as u64,
                findings: stats.total,
                remediation_rate: stats.remediation_rate,
                last_evaluation,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.audits.cmp(&a.audits).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// Audits that still carry unremediated critical findings.
pub fn active_alerts(
    audits: &[AuditRecord],
    companies: &HashMap<String, Company>,
) -> Vec<ActiveAlert> {
    let mut rows: Vec<ActiveAlert> = audits
        .iter()
        .filter_map(|audit| {
            let active: Vec<Severity> = audit
                .findings
                .iter()
                .filter(|f| f.retest() != RetestStatus::Ok)
                .map(finding_severity)
                .collect();
            let critical_active = active.iter().filter(|s| **s == Severity::Critical).count() as u64;
            if critical_active == 0 {
                return None;
            }
            Some(ActiveAlert {
                audit_id: audit.id.clone(),
                audit_name: audit.name.clone(),
                company_id: audit.company.clone(),
                company_name: company_name(audit, companies),
                critical_active,
                high_active: active.iter().filter(|s| **s == Severity::High).count() as u64,
                created_at: audit.created_at,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.critical_active
            .cmp(&a.critical_active)
            .then_with(|| b.high_active.cmp(&a.high_active))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    rows
}

pub fn associated_clients(audits: &[AuditRecord]) -> Vec<AssociatedClient> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for audit in audits {
        if let Some(client) = audit.client.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            *counts.entry(client).or_default() += 1;
        }
    }
    let mut rows: Vec<AssociatedClient> = counts
        .into_iter()
        .map(|(client, audits)| AssociatedClient {
            client: client.to_string(),
            audits,
        })
        .collect();
    rows.sort_by(|a, b| b.audits.cmp(&a.audits).then_with(|| a.client.cmp(&b.client)));
    rows
}
