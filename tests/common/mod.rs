// tests/common/mod.rs
#![allow(dead_code)]

use auditboard::store::{Collection, MemoryStore};
use auditboard::{AppState, Config};
use serde_json::{Value, json};
use std::sync::Arc;

pub const ACME: &str = "64a000000000000000000001";
pub const BANK: &str = "64a000000000000000000002";
pub const CLOSED: &str = "64a000000000000000000003";
pub const MISSING: &str = "64a0000000000000000000ff";

pub const ADMIN: &str = "u-admin";
pub const ANALYST: &str = "u-analyst";
pub const VIEWER: &str = "u-viewer";

pub const CRITICAL: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H";
pub const HIGH: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:L/A:N";
pub const MEDIUM: &str = "CVSS:3.1/AV:N/AC:H/PR:L/UI:R/S:U/C:L/I:N/A:N";

pub fn seed() -> Value {
    json!({
        "companies": [
            {"_id": ACME, "name": "Acme", "shortName": "ACM", "cuadroDeMando": true, "status": true},
            {"_id": BANK, "name": "Bank", "cuadroDeMando": false, "status": true},
            {"_id": CLOSED, "name": "Closed", "status": false}
        ],
        "users": [
            {"_id": ADMIN, "username": "admin", "firstname": "Ada", "lastname": "Min", "role": "admin"},
            {"_id": ANALYST, "username": "analyst", "firstname": "Ana", "role": "analyst"},
            {"_id": VIEWER, "username": "viewer", "role": "user"}
        ],
        "procedures": [
            {"_id": "p1", "origen": "VERIF-004"},
            {"_id": "p2", "origen": "PR01"}
        ],
        "procedureTemplates": [
            {"code": "VERIF-001", "name": "Verificación", "color": "#336699"}
        ],
        "statuses": [
            {"_id": "s1", "name": "En curso", "color": "#00aa00"}
        ],
        "audits": [
            {
                "_id": "a1", "name": "Acme Q1", "company": ACME, "client": "Ministry",
                "procedure": "p1", "status": "s1", "auditType": "Pentest",
                "alcance": ["web", "api"], "state": "approved",
                "createdAt": "2024-03-04T10:00:00Z",
                "dateStart": "2024-03-01", "dateEnd": "2024-03-11",
                "creator": ANALYST, "collaborators": [ADMIN],
                "documents": {"solicitud": "req.pdf", "informe": "report.pdf"},
                "findings": [
                    {"_id": "f1", "title": "RCE", "vulnType": "Injection", "cvssv3": CRITICAL, "retestStatus": "ok"},
                    {"_id": "f2", "title": "SQLi", "vulnType": "Injection", "cvssv3": CRITICAL, "retestStatus": "ko"},
                    {"_id": "f3", "title": "IDOR", "vulnType": "Access", "cvssv3": HIGH, "retestStatus": "ko"}
                ]
            },
            {
                "_id": "a2", "name": "Bank web", "company": BANK, "procedure": "p2",
                "state": "editing", "createdAt": "2024-03-20T10:00:00Z",
                "dateStart": "2024-03-20", "dateEnd": "2024-03-25",
                "findings": []
            },
            {
                "_id": "a3", "name": "Acme Q3", "company": ACME, "state": "review",
                "createdAt": "2024-07-10T10:00:00Z",
                "findings": [{"_id": "f4", "title": "Verbose errors", "cvssv3": MEDIUM, "retestStatus": "partial"}]
            },
            {"_id": "a4", "name": "Unassigned", "createdAt": "2024-05-05T10:00:00Z"},
            {"_id": "a5", "name": "Bank 2023", "company": BANK, "createdAt": "2023-06-01T10:00:00Z"}
        ]
    })
}

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_seed(&seed()).unwrap())
}

pub fn state_with(store: Arc<MemoryStore>) -> AppState {
    AppState::new(Config::default(), store)
}

pub fn state() -> AppState {
    state_with(store())
}

/// Stores a permission record for `user_id` built from `fields`. Call it
/// before the service first touches `user_id`, which creates a default record.
pub fn restrict(store: &MemoryStore, user_id: &str, fields: Value) {
    let mut doc = json!({
        "_id": format!("perm-{}", user_id),
        "userId": user_id,
        "customPermissionsEnabled": true,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    });
    if let (Some(target), Some(extra)) = (doc.as_object_mut(), fields.as_object()) {
        target.extend(extra.clone());
    }
    store.insert(Collection::Permissions, doc);
}
