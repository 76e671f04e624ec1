// src/analytics/breakdowns.rs
use serde::Serialize;
use std::collections::HashMap;

use crate::config::SeverityColors;
use crate::cvss::Severity;
use crate::findings::FindingStats;
use crate::models::{AuditRecord, Procedure, ProcedureTemplate, Status};

pub const NEUTRAL_COLOR: &str = "#9e9e9e";
pub const UNSPECIFIED: &str = "Unspecified";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureBucket {
    pub origen: String,
    pub name: String,
    pub color: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlcanceBucket {
    pub alcance: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBucket {
    pub status_id: String,
    pub name: String,
    pub color: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeBucket {
    pub audit_type: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityBucket {
    pub severity: Severity,
    pub total: u64,
    pub color: String,
}

/// Canonical form of a procedure `origen` code: `VERIF*` and `RETEST*`
/// collapse onto one catalog entry each, `PR*` and anything else is kept.
pub fn normalize_origen(code: &str) -> String {
    let code = code.trim();
    let upper = code.to_uppercase();
    if upper.starts_with("VERIF") {
        "VERIF-001".to_string()
    } else if upper.starts_with("RETEST") {
        "RETEST".to_string()
    } else {
        code.to_string()
    }
}

fn sorted_desc<T>(mut rows: Vec<T>, total: impl Fn(&T) -> u64, key: impl Fn(&T) -> &str) -> Vec<T> {
    rows.sort_by(|a, b| total(b).cmp(&total(a)).then_with(|| key(a).cmp(key(b))));
    rows
}

/// Audits without a resolvable procedure or `origen` are left out.
pub fn by_procedure(
    audits: &[AuditRecord],
    procedures: &HashMap<String, Procedure>,
    templates: &[ProcedureTemplate],
) -> Vec<ProcedureBucket> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for audit in audits {
        let origen = audit
            .procedure
            .as_ref()
            .and_then(|id| procedures.get(id))
            .and_then(|p| p.origen.as_deref())
            .filter(|o| !o.trim().is_empty());
        if let Some(origen) = origen {
            *counts.entry(normalize_origen(origen)).or_default() += 1;
        }
    }

    let rows = counts
        .into_iter()
        .map(|(origen, total)| {
            let template = templates.iter().find(|t| t.code == origen);
            ProcedureBucket {
                name: template.map(|t| t.name.clone()).unwrap_or_else(|| origen.clone()),
                color: template
                    .and_then(|t| t.color.clone())
                    .unwrap_or_else(|| NEUTRAL_COLOR.to_string()),
                origen,
                total,
            }
        })
        .collect();
    sorted_desc(rows, |r| r.total, |r| r.origen.as_str())
}

/// Each scope tag of an audit counts once for that tag.
pub fn by_alcance(audits: &[AuditRecord]) -> Vec<AlcanceBucket> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for audit in audits {
        for tag in audit.alcance.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            *counts.entry(tag).or_default() += 1;
        }
    }
    let rows = counts
        .into_iter()
        .map(|(alcance, total)| AlcanceBucket {
            alcance: alcance.to_string(),
            total,
        })
        .collect();
    sorted_desc(rows, |r| r.total, |r| r.alcance.as_str())
}

/// Audits whose status record cannot be resolved are left out.
pub fn by_status(audits: &[AuditRecord], statuses: &HashMap<String, Status>) -> Vec<StatusBucket> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for audit in audits {
        if let Some(status) = audit.status.as_deref().filter(|s| statuses.contains_key(*s)) {
            *counts.entry(status).or_default() += 1;
        }
    }
    let rows = counts
        .into_iter()
        .filter_map(|(id, total)| {
            let status = statuses.get(id)?;
            Some(StatusBucket {
                status_id: id.to_string(),
                name: status.name.clone(),
                color: status.color.clone().unwrap_or_else(|| NEUTRAL_COLOR.to_string()),
                total,
            })
        })
        .collect();
    sorted_desc(rows, |r| r.total, |r| r.name.as_str())
}

pub fn by_type(audits: &[AuditRecord]) -> Vec<TypeBucket> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for audit in audits {
        let kind = audit
            .audit_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNSPECIFIED);
        *counts.entry(kind).or_default() += 1;
    }
    let rows = counts
        .into_iter()
        .map(|(kind, total)| TypeBucket {
            audit_type: kind.to_string(),
            total,
        })
        .collect();
    sorted_desc(rows, |r| r.total, |r| r.audit_type.as_str())
}

/// Always five buckets, most severe first.
pub fn by_severity(stats: &FindingStats, colors: &SeverityColors) -> Vec<SeverityBucket> {
    Severity::ALL
        .into_iter()
        .map(|severity| SeverityBucket {
            severity,
            total: stats.severity_count(severity),
            color: colors.color(severity).to_string(),
        })
        .collect()
}
