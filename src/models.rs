// src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditState {
    #[default]
    #[serde(alias = "EDIT")]
    Editing,
    #[serde(alias = "REVIEW")]
    Review,
    #[serde(alias = "APPROVED")]
    Approved,
}

impl AuditState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditState::Editing => "editing",
            AuditState::Review => "review",
            AuditState::Approved => "approved",
        }
    }
}

/// Remediation-verification outcome of a finding. Stored values other than
/// the three known ones read as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetestStatus {
    Ok,
    Ko,
    Partial,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(rename = "_id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "vulnType", alias = "category", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cvssv3: Option<String>,
    #[serde(default)]
    pub cvssv4: Option<String>,
    #[serde(default)]
    pub retest_status: Option<RetestStatus>,
}

impl Finding {
    /// The populated vector, v3 first.
    pub fn vector(&self) -> Option<&str> {
        self.cvssv3
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.cvssv4.as_deref().filter(|v| !v.trim().is_empty()))
    }

    pub fn retest(&self) -> RetestStatus {
        self.retest_status.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditDocuments {
    #[serde(default)]
    pub solicitud: Option<String>,
    #[serde(default)]
    pub instructivo: Option<String>,
    #[serde(default)]
    pub informe: Option<String>,
    #[serde(default)]
    pub respuesta: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub procedure: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub audit_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alcance: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: AuditState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub date_end: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collaborators: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub documents: AuditDocuments,
    #[serde(default, deserialize_with = "null_as_default")]
    pub findings: Vec<Finding>,
}

impl AuditRecord {
    /// Evaluation length in days when both dates parse.
    pub fn evaluation_days(&self) -> Option<f64> {
        let start = parse_day(self.date_start.as_deref()?)?;
        let end = parse_day(self.date_end.as_deref()?)?;
        Some((end - start).num_days().abs() as f64)
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(rename = "cuadroDeMando", default, deserialize_with = "null_as_default")]
    pub flagged: bool,
    #[serde(default = "default_active")]
    pub status: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub origen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureTemplate {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Analyst,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Public projection of a user, as embedded in dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        let name = [user.firstname.as_deref(), user.lastname.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_retest_status_reads_as_unknown() {
        let finding: Finding = serde_json::from_value(json!({
            "title": "XSS",
            "retestStatus": "pending"
        }))
        .unwrap();
        assert_eq!(finding.retest(), RetestStatus::Unknown);

        let absent: Finding = serde_json::from_value(json!({"title": "SQLi"})).unwrap();
        assert_eq!(absent.retest(), RetestStatus::Unknown);
    }

    #[test]
    fn test_vector_prefers_v3() {
        let finding = Finding {
            cvssv3: Some("CVSS:3.1/AV:N".into()),
            cvssv4: Some("CVSS:4.0/AV:L".into()),
            ..Default::default()
        };
        assert_eq!(finding.vector(), Some("CVSS:3.1/AV:N"));

        let v4_only = Finding {
            cvssv3: Some("  ".into()),
            cvssv4: Some("CVSS:4.0/AV:L".into()),
            ..Default::default()
        };
        assert_eq!(v4_only.vector(), Some("CVSS:4.0/AV:L"));
    }

    #[test]
    fn test_evaluation_days() {
        let audit: AuditRecord = serde_json::from_value(json!({
            "_id": "a1",
            "createdAt": "2024-03-01T00:00:00Z",
            "dateStart": "2024-03-10",
            "dateEnd": "2024-03-01T12:00:00Z",
            "state": "APPROVED"
        }))
        .unwrap();
        assert_eq!(audit.state, AuditState::Approved);
        assert_eq!(audit.evaluation_days(), Some(9.0));
    }

    #[test]
    fn test_null_collections_read_as_empty() {
        let audit: AuditRecord = serde_json::from_value(json!({
            "_id": "a1",
            "createdAt": "2024-03-01T00:00:00Z",
            "state": null,
            "alcance": null,
            "collaborators": null,
            "documents": null,
            "findings": null
        }))
        .unwrap();
        assert_eq!(audit.state, AuditState::Editing);
        assert!(audit.alcance.is_empty());
        assert!(audit.collaborators.is_empty());
        assert!(audit.documents.informe.is_none());
        assert!(audit.findings.is_empty());

        let company: Company = serde_json::from_value(json!({
            "_id": "c1", "name": "Acme", "cuadroDeMando": null
        }))
        .unwrap();
        assert!(!company.flagged);
    }
}
