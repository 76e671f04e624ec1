// src/findings.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cvss::{Severity, finding_severity};
use crate::models::{Finding, RetestStatus};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingStats {
    pub total: u64,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub info: u64,
    pub remediated: u64,
    pub not_remediated: u64,
    pub partial: u64,
    pub unverified: u64,
    pub verified: u64,
    pub remediation_rate: u64,
}

impl FindingStats {
    pub fn severity_count(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    fn record(&mut self, finding: &Finding) {
        self.total += 1;
        match finding_severity(finding) {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
        match finding.retest() {
            RetestStatus::Ok => self.remediated += 1,
            RetestStatus::Ko => self.not_remediated += 1,
            RetestStatus::Partial => self.partial += 1,
            RetestStatus::Unknown => self.unverified += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.verified = self.remediated + self.not_remediated + self.partial;
        self.remediation_rate = percentage(self.remediated, self.total);
        self
    }
}

/// `round(100 * part / whole)`, or 0 for an empty whole.
pub fn percentage(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 * 100.0) / whole as f64).round() as u64
}

pub fn analyze<'a, I>(findings: I) -> FindingStats
where
    I: IntoIterator<Item = &'a Finding>,
{
    findings
        .into_iter()
        .fold(FindingStats::default(), |mut stats, finding| {
            stats.record(finding);
            stats
        })
        .finish()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub total: u64,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub info: u64,
    pub remediated: u64,
}

pub fn group_by_category<'a, I>(findings: I) -> Vec<CategoryStats>
where
    I: IntoIterator<Item = &'a Finding>,
{
    let mut groups: HashMap<String, CategoryStats> = HashMap::new();
    for finding in findings {
        let name = finding
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED);
        let entry = groups.entry(name.to_string()).or_insert_with(|| CategoryStats {
            category: name.to_string(),
            total: 0,
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            info: 0,
            remediated: 0,
        });
        entry.total += 1;
        match finding_severity(finding) {
            Severity::Critical => entry.critical += 1,
            Severity::High => entry.high += 1,
            Severity::Medium => entry.medium += 1,
            Severity::Low => entry.low += 1,
            Severity::Info => entry.info += 1,
        }
        if finding.retest() == RetestStatus::Ok {
            entry.remediated += 1;
        }
    }

    let mut categories: Vec<CategoryStats> = groups.into_values().collect();
    categories.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    categories
}
