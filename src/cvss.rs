// src/cvss.rs
//! Heuristic severity scoring from CVSS vector strings.
//!
//! This is not a conformant CVSS calculator. It sums fixed weights per
//! metric value and clamps to `[0, 10]`; stored dashboards depend on these
//! exact weights.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Finding, RetestStatus};

static METRIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|/)(AV|PR|UI|C|I|A|VC|VI|VA):([A-Z])").expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Highest first, the order dashboards list buckets in.
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 9.0 => Severity::Critical,
            s if s >= 7.0 => Severity::High,
            s if s >= 4.0 => Severity::Medium,
            s if s > 0.0 => Severity::Low,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Approximate score for a vector string; absent or empty vectors score 0.
pub fn approximate_score(vector: Option<&str>) -> f64 {
    let Some(vector) = vector.map(str::trim).filter(|v| !v.is_empty()) else {
        return 0.0;
    };

    let metrics: HashMap<&str, &str> = METRIC_RE
        .captures_iter(vector)
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        .collect();
    // v4 splits impact into vulnerable/subsequent system; the vulnerable
    // system metrics stand in for C/I/A.
    let metric = |v3: &str, v4: &str| metrics.get(v3).or_else(|| metrics.get(v4)).copied();

    let mut score: f64 = match metric("AV", "AV") {
        Some("N") => 3.0,
        Some("A") => 2.0,
        Some("L") => 1.0,
        Some("P") => 0.5,
        _ => 0.0,
    };
    score += match metric("PR", "PR") {
        Some("N") => 2.0,
        Some("L") => 1.0,
        Some("H") => 0.5,
        _ => 0.0,
    };
    if metric("UI", "UI") == Some("N") {
        score += 1.0;
    }
    score += match metric("C", "VC") {
        Some("H") => 1.5,
        Some("L") => 0.5,
        _ => 0.0,
    };
    score += match metric("I", "VI") {
        Some("H") => 1.5,
        Some("L") => 0.5,
        _ => 0.0,
    };
    score += match metric("A", "VA") {
        Some("H") => 1.0,
        Some("L") => 0.3,
        _ => 0.0,
    };

    score.clamp(0.0, 10.0)
}

pub fn finding_score(finding: &Finding) -> f64 {
    approximate_score(finding.vector())
}

pub fn finding_severity(finding: &Finding) -> Severity {
    Severity::from_score(finding_score(finding))
}

pub fn retest_label(status: RetestStatus) -> &'static str {
    match status {
        RetestStatus::Ok => "Remediated",
        RetestStatus::Ko => "Not Remediated",
        RetestStatus::Partial => "Partial",
        RetestStatus::Unknown => "Unverified",
    }
}
