// src/analytics/stats.rs
use serde::Serialize;
use std::collections::HashSet;

use crate::findings::{FindingStats, analyze};
use crate::models::{AuditRecord, AuditState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_audits: u64,
    pub editing: u64,
    pub in_review: u64,
    pub approved: u64,
    pub companies_evaluated: u64,
    pub active_companies: u64,
    /// Percentage with one decimal.
    pub coverage: f64,
    pub findings: FindingStats,
    pub avg_evaluation_days: f64,
    pub remediation_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStats {
    pub total_audits: u64,
    pub editing: u64,
    pub in_review: u64,
    pub approved: u64,
    pub audits_with_findings: u64,
    pub findings: FindingStats,
    pub avg_evaluation_days: f64,
    pub remediation_rate: u64,
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn count_state(audits: &[AuditRecord], state: AuditState) -> u64 {
    audits.iter().filter(|a| a.state == state).count() as u64
}

/// Mean `|end - start|` in days over audits with both dates, or `fallback`.
pub fn average_evaluation_days(audits: &[AuditRecord], fallback: f64) -> f64 {
    let durations: Vec<f64> = audits.iter().filter_map(AuditRecord::evaluation_days).collect();
    if durations.is_empty() {
        return fallback;
    }
    round1(durations.iter().sum::<f64>() / durations.len() as f64)
}

pub fn global_stats(audits: &[AuditRecord], active_companies: u64, fallback_days: f64) -> GlobalStats {
    let companies: HashSet<&str> = audits.iter().filter_map(|a| a.company.as_deref()).collect();
    let findings = analyze(audits.iter().flat_map(|a| a.findings.iter()));
    let coverage = if active_companies == 0 {
        0.0
    } else {
        round1(companies.len() as f64 * 100.0 / active_companies as f64)
    };

    GlobalStats {
        total_audits: audits.len() as u64,
        editing: count_state(audits, AuditState::Editing),
        in_review: count_state(audits, AuditState::Review),
        approved: count_state(audits, AuditState::Approved),
        companies_evaluated: companies.len() as u64,
        active_companies,
        coverage,
        remediation_rate: findings.remediation_rate,
        findings,
        avg_evaluation_days: average_evaluation_days(audits, fallback_days),
    }
}

pub fn company_stats(audits: &[AuditRecord], fallback_days: f64) -> CompanyStats {
    let findings = analyze(audits.iter().flat_map(|a| a.findings.iter()));
    let audits_with_findings: HashSet<&str> = audits
        .iter()
        .filter(|a| !a.findings.is_empty())
        .map(|a| a.id.as_str())
        .collect();

    CompanyStats {
        total_audits: audits.len() as u64,
        editing: count_state(audits, AuditState::Editing),
        in_review: count_state(audits, AuditState::Review),
        approved: count_state(audits, AuditState::Approved),
        audits_with_findings: audits_with_findings.len() as u64,
        remediation_rate: findings.remediation_rate,
        findings,
        avg_evaluation_days: average_evaluation_days(audits, fallback_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EVAL_DAYS;
    use serde_json::json;

    fn audit(value: serde_json::Value) -> AuditRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_global_stats() {
        let audits = vec![
            audit(json!({
                "_id": "a1", "company": "c1", "state": "approved",
                "createdAt": "2024-02-01T00:00:00Z",
                "dateStart": "2024-02-01", "dateEnd": "2024-02-11",
                "findings": [{"retestStatus": "ok"}, {"retestStatus": "ko"}]
            })),
            audit(json!({
                "_id": "a2", "company": "c1", "state": "editing",
                "createdAt": "2024-02-03T00:00:00Z",
                "dateStart": "2024-02-01", "dateEnd": "2024-02-06"
            })),
            audit(json!({
                "_id": "a3", "company": "c2", "state": "review",
                "createdAt": "2024-02-05T00:00:00Z",
                "dateStart": "garbage", "dateEnd": "2024-02-06"
            })),
        ];
        let stats = global_stats(&audits, 3, DEFAULT_EVAL_DAYS);
        assert_eq!(stats.total_audits, 3);
        assert_eq!(stats.editing, 1);
        assert_eq!(stats.in_review, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.companies_evaluated, 2);
        assert_eq!(stats.coverage, 66.7);
        assert_eq!(stats.findings.total, 2);
        assert_eq!(stats.remediation_rate, 50);
        assert_eq!(stats.avg_evaluation_days, 7.5);
    }

    #[test]
    fn test_fallbacks_without_data() {
        let stats = global_stats(&[], 0, DEFAULT_EVAL_DAYS);
        assert_eq!(stats.coverage, 0.0);
        assert_eq!(stats.avg_evaluation_days, 12.4);
        assert_eq!(stats.remediation_rate, 0);
    }

    #[test]
    fn test_company_stats_counts_audits_with_findings() {
        let audits = vec![
            audit(json!({"_id": "a1", "createdAt": "2024-01-01T00:00:00Z", "findings": [{}]})),
            audit(json!({"_id": "a2", "createdAt": "2024-01-02T00:00:00Z"})),
        ];
        let stats = company_stats(&audits, 3.0);
        assert_eq!(stats.total_audits, 2);
        assert_eq!(stats.audits_with_findings, 1);
        assert_eq!(stats.avg_evaluation_days, 3.0);
    }
}
