use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cvss::Severity;

/// Fallback for the average evaluation duration when no audit has a usable
/// start/end pair.
pub const DEFAULT_EVAL_DAYS: f64 = 12.4;

/// Display colors per severity bucket, as read by the dashboard UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityColors(BTreeMap<Severity, String>);

impl Default for SeverityColors {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Severity::Critical, "#dc3545".to_string()),
            (Severity::High, "#fd7e14".to_string()),
            (Severity::Medium, "#ffc107".to_string()),
            (Severity::Low, "#28a745".to_string()),
            (Severity::Info, "#17a2b8".to_string()),
        ]))
    }
}

impl SeverityColors {
    pub fn color(&self, severity: Severity) -> &str {
        self.0.get(&severity).map(String::as_str).unwrap_or("#9e9e9e")
    }

    /// Applies `Label=#hex` overrides separated by commas.
    pub fn with_overrides(mut self, raw: &str) -> Result<Self> {
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (label, color) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid severity color entry: {}", pair))?;
            let severity: Severity = label.parse().map_err(|e: String| anyhow!(e))?;
            let color = color.trim();
            if !color.starts_with('#') {
                return Err(anyhow!("Severity color for {} must be a hex value", label));
            }
            self.0.insert(severity, color.to_string());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub base_url: String,
    pub seed_file: Option<PathBuf>,
    pub default_eval_days: f64,
    pub top_entities_limit: usize,
    pub recent_evaluations_limit: usize,
    pub severity_colors: SeverityColors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            seed_file: None,
            default_eval_days: DEFAULT_EVAL_DAYS,
            top_entities_limit: 10,
            recent_evaluations_limit: 10,
            severity_colors: SeverityColors::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|e| anyhow!("Invalid PORT '{}': {}", raw, e))?,
            None => defaults.port,
        };

        let default_eval_days = match lookup("AUDITBOARD_DEFAULT_EVAL_DAYS") {
            Some(raw) => {
                let days: f64 = raw
                    .parse()
                    .map_err(|e| anyhow!("Invalid AUDITBOARD_DEFAULT_EVAL_DAYS '{}': {}", raw, e))?;
                if !days.is_finite() || days < 0.0 {
                    return Err(anyhow!("AUDITBOARD_DEFAULT_EVAL_DAYS must be a non-negative number"));
                }
                days
            }
            None => defaults.default_eval_days,
        };

        let top_entities_limit = match lookup("AUDITBOARD_TOP_ENTITIES_LIMIT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow!("Invalid AUDITBOARD_TOP_ENTITIES_LIMIT '{}': {}", raw, e))?,
            None => defaults.top_entities_limit,
        };

        let recent_evaluations_limit = match lookup("AUDITBOARD_RECENT_LIMIT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow!("Invalid AUDITBOARD_RECENT_LIMIT '{}': {}", raw, e))?,
            None => defaults.recent_evaluations_limit,
        };

        let severity_colors = match lookup("AUDITBOARD_SEVERITY_COLORS") {
            Some(raw) => defaults.severity_colors.clone().with_overrides(&raw)?,
            None => defaults.severity_colors.clone(),
        };

        Ok(Config {
            port,
            base_url: lookup("BASE_URL").unwrap_or(defaults.base_url),
            seed_file: lookup("AUDITBOARD_SEED_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            default_eval_days,
            top_entities_limit,
            recent_evaluations_limit,
            severity_colors,
        })
    }
}
