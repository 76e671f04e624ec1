// src/analytics/risk.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::cvss::{Severity, finding_score, finding_severity, retest_label};
use crate::models::{AuditRecord, Company, RetestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RiskTier {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [RiskTier; 5] = [
        RiskTier::Critical,
        RiskTier::High,
        RiskTier::Medium,
        RiskTier::Low,
        RiskTier::Minimal,
    ];
}

/// Threshold ladder over active critical and high findings; first match wins.
pub fn classify(critical_active: u64, high_active: u64) -> RiskTier {
    if critical_active >= 5 || (critical_active >= 3 && high_active >= 10) {
        RiskTier::Critical
    } else if critical_active >= 2 || (critical_active >= 1 && high_active >= 5) {
        RiskTier::High
    } else if critical_active >= 1 || high_active >= 3 {
        RiskTier::Medium
    } else if high_active >= 1 {
        RiskTier::Low
    } else {
        RiskTier::Minimal
    }
}

/// Per-company severity rollup. "Active" means the finding is not verified
/// as remediated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRisk {
    pub company_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub cuadro_de_mando: bool,
    pub audits: u64,
    pub total_findings: u64,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub critical_active: u64,
    pub high_active: u64,
    pub remediated: u64,
    pub risk_tier: RiskTier,
    pub last_evaluation: Option<DateTime<Utc>>,
}

impl EntityRisk {
    fn new(company_id: &str, company: Option<&Company>) -> Self {
        Self {
            company_id: company_id.to_string(),
            name: company
                .map(|c| c.name.clone())
                .unwrap_or_else(|| company_id.to_string()),
            short_name: company.and_then(|c| c.short_name.clone()),
            cuadro_de_mando: company.map(|c| c.flagged).unwrap_or(false),
            audits: 0,
            total_findings: 0,
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            critical_active: 0,
            high_active: 0,
            remediated: 0,
            risk_tier: RiskTier::Minimal,
            last_evaluation: None,
        }
    }

    fn record(&mut self, audit: &AuditRecord) {
        self.audits += 1;
        self.last_evaluation = self.last_evaluation.max(Some(audit.created_at));
        for finding in &audit.findings {
            let active = finding.retest() != RetestStatus::Ok;
            self.total_findings += 1;
            if !active {
                self.remediated += 1;
            }
            match finding_severity(finding) {
                Severity::Critical => {
                    self.critical += 1;
                    self.critical_active += active as u64;
                }
                Severity::High => {
                    self.high += 1;
                    self.high_active += active as u64;
                }
                Severity::Medium => self.medium += 1,
                Severity::Low => self.low += 1,
                Severity::Info => {}
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub total_entities: u64,
    pub critical_active: u64,
    pub high_active: u64,
    pub by_tier: Vec<TierCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: RiskTier,
    pub total: u64,
}

/// Rolls audits up per company and orders them by risk: flagged companies
/// first when `prioritize_flagged`, then active criticals, then active highs.
/// Audits without a company are skipped.
pub fn rank_entities(
    audits: &[AuditRecord],
    companies: &HashMap<String, Company>,
    prioritize_flagged: bool,
) -> Vec<EntityRisk> {
    let mut rollup: HashMap<&str, EntityRisk> = HashMap::new();
    for audit in audits {
        let Some(company_id) = audit.company.as_deref() else {
            continue;
        };
        rollup
            .entry(company_id)
            .or_insert_with(|| EntityRisk::new(company_id, companies.get(company_id)))
            .record(audit);
    }

    let mut entities: Vec<EntityRisk> = rollup
        .into_values()
        .map(|mut e| {
            e.risk_tier = classify(e.critical_active, e.high_active);
            e
        })
        .collect();
    entities.sort_by(|a, b| {
        let flagged = if prioritize_flagged {
            b.cuadro_de_mando.cmp(&a.cuadro_de_mando)
        } else {
            std::cmp::Ordering::Equal
        };
        flagged
            .then_with(|| b.critical_active.cmp(&a.critical_active))
            .then_with(|| b.high_active.cmp(&a.high_active))
            .then_with(|| a.name.cmp(&b.name))
    });
    entities
}

/// Totals over every ranked entity, before any limit is applied.
pub fn summarize(entities: &[EntityRisk]) -> RiskSummary {
    RiskSummary {
        total_entities: entities.len() as u64,
        critical_active: entities.iter().map(|e| e.critical_active).sum(),
        high_active: entities.iter().map(|e| e.high_active).sum(),
        by_tier: RiskTier::ALL
            .into_iter()
            .map(|tier| TierCount {
                tier,
                total: entities.iter().filter(|e| e.risk_tier == tier).count() as u64,
            })
            .collect(),
    }
}

/// A single finding as listed in an entity's vulnerability report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFinding {
    pub audit_id: String,
    pub audit_name: String,
    pub title: String,
    pub category: Option<String>,
    pub score: f64,
    pub severity: Severity,
    pub retest_status: &'static str,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Every finding of the given audits, most severe first.
pub fn entity_findings(audits: &[AuditRecord]) -> Vec<EntityFinding> {
    let mut rows: Vec<EntityFinding> = audits
        .iter()
        .flat_map(|audit| {
            audit.findings.iter().map(move |finding| EntityFinding {
                audit_id: audit.id.clone(),
                audit_name: audit.name.clone(),
                title: finding.title.clone(),
                category: finding.category.clone(),
                score: finding_score(finding),
                severity: finding_severity(finding),
                retest_status: retest_label(finding.retest()),
                active: finding.retest() != RetestStatus::Ok,
                created_at: audit.created_at,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    rows
}
