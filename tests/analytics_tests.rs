// tests/analytics_tests.rs
mod common;

use auditboard::AnalyticsError;
use auditboard::analytics::{
    AnalyticsEngine, AnalyticsSettings, DashboardFilters, DashboardScope,
};
use auditboard::config::Config;
use auditboard::permissions::{AnalyticsPermission, EndpointFilter, EndpointName};
use auditboard::store::Collection;
use common::*;
use serde_json::json;
use std::collections::BTreeSet;

fn engine() -> AnalyticsEngine {
    AnalyticsEngine::new(store(), AnalyticsSettings::default())
}

fn year(year: i32) -> DashboardFilters {
    DashboardFilters {
        year: Some(year),
        ..Default::default()
    }
}

fn open() -> AnalyticsPermission {
    AnalyticsPermission::unrestricted(ADMIN)
}

fn only(companies: &[&str]) -> AnalyticsPermission {
    let mut perm = AnalyticsPermission::unrestricted(ANALYST);
    perm.custom_permissions_enabled = true;
    perm.global_allowed_companies = companies.iter().map(|c| c.to_string()).collect();
    perm
}

#[tokio::test]
async fn test_global_dashboard_unrestricted() {
    let payload = engine()
        .get_dashboard(&open(), DashboardScope::Global, &year(2024))
        .await
        .unwrap();

    let stats = &payload["stats"];
    assert_eq!(stats["totalAudits"], 4);
    assert_eq!(stats["editing"], 2);
    assert_eq!(stats["inReview"], 1);
    assert_eq!(stats["approved"], 1);
    assert_eq!(stats["companiesEvaluated"], 2);
    assert_eq!(stats["activeCompanies"], 2);
    assert_eq!(stats["coverage"], 100.0);
    assert_eq!(stats["findings"]["total"], 4);
    assert_eq!(stats["findings"]["critical"], 2);
    assert_eq!(stats["remediationRate"], 25);
    assert_eq!(stats["avgEvaluationDays"], 7.5);

    let trend = payload["tendenciaMensual"].as_array().unwrap();
    assert_eq!(trend.len(), 12);
    assert_eq!(trend[2]["mes"], "Mar");
    assert_eq!(trend[2]["evaluaciones"], 2);
    assert_eq!(trend[2]["vulnerabilidades"], 3);
    assert_eq!(trend[2]["remediadas"], 1);
    assert_eq!(trend[2]["noRemediadas"], 2);
    assert_eq!(trend[0]["evaluaciones"], 0);

    let procedures = payload["porProcedimiento"].as_array().unwrap();
    assert!(
        procedures
            .iter()
            .any(|p| p["origen"] == "VERIF-001" && p["name"] == "Verificación")
    );
    assert!(procedures.iter().any(|p| p["origen"] == "PR01" && p["color"] == "#9e9e9e"));

    let alcance = payload["porAlcance"].as_array().unwrap();
    assert_eq!(alcance.len(), 2);

    let severity = payload["porSeveridad"].as_array().unwrap();
    assert_eq!(severity.len(), 5);
    assert_eq!(severity[0]["severity"], "Critical");
    assert_eq!(severity[0]["total"], 2);
    assert_eq!(severity[0]["color"], "#dc3545");

    assert_eq!(payload["alertasActivas"].as_array().unwrap().len(), 1);
    assert_eq!(payload["clientesAsociados"][0]["client"], "Ministry");
}

#[tokio::test]
async fn test_global_dashboard_respects_allowed_companies() {
    let payload = engine()
        .global_dashboard(&only(&[ACME]), &year(2024))
        .await
        .unwrap();
    let stats = &payload["stats"];
    assert_eq!(stats["totalAudits"], 2);
    assert_eq!(stats["activeCompanies"], 1);
    assert_eq!(stats["coverage"], 100.0);

    let entities = payload["entidadesEvaluadas"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["companyId"], ACME);
}

#[tokio::test]
async fn test_disabled_endpoint_is_forbidden() {
    let mut perm = only(&[]);
    perm.endpoints.insert(
        EndpointName::GlobalDashboard,
        EndpointFilter {
            enabled: Some(false),
            ..Default::default()
        },
    );
    let err = engine().global_dashboard(&perm, &year(2024)).await.unwrap_err();
    assert!(matches!(err, AnalyticsError::Forbidden(_)));
}

#[tokio::test]
async fn test_max_results_and_excluded_fields_shape_lists() {
    let mut perm = only(&[]);
    perm.endpoints.insert(
        EndpointName::GlobalDashboard,
        EndpointFilter {
            max_results: 1,
            excluded_fields: BTreeSet::from(["companyName".to_string()]),
            ..Default::default()
        },
    );
    let payload = engine().global_dashboard(&perm, &year(2024)).await.unwrap();
    let recent = payload["evaluacionesRecientes"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["id"], "a3");
    assert!(recent[0].get("companyName").is_none());
    assert_eq!(payload["entidadesEvaluadas"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_explicit_date_range() {
    let filters = DashboardFilters {
        start_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
        end_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 31),
        ..Default::default()
    };
    let payload = engine().global_dashboard(&open(), &filters).await.unwrap();
    assert_eq!(payload["stats"]["totalAudits"], 2);
}

#[tokio::test]
async fn test_company_dashboard() {
    let payload = engine()
        .get_dashboard(&open(), DashboardScope::Company(ACME.to_string()), &year(2024))
        .await
        .unwrap();
    assert_eq!(payload["company"]["name"], "Acme");
    assert_eq!(payload["stats"]["totalAudits"], 2);
    assert_eq!(payload["stats"]["auditsWithFindings"], 2);
    assert_eq!(payload["stats"]["avgEvaluationDays"], 10.0);
    assert_eq!(payload["tendenciaMensual"][6]["parciales"], 1);
}

#[tokio::test]
async fn test_company_dashboard_errors() {
    let engine = engine();
    let denied = engine
        .company_dashboard(&only(&[ACME]), BANK, &year(2024))
        .await
        .unwrap_err();
    assert!(matches!(denied, AnalyticsError::Forbidden(_)));

    let invalid = engine
        .company_dashboard(&open(), "bank", &year(2024))
        .await
        .unwrap_err();
    assert!(matches!(invalid, AnalyticsError::BadParameters(_)));

    let missing = engine
        .company_dashboard(&open(), MISSING, &year(2024))
        .await
        .unwrap_err();
    assert!(matches!(missing, AnalyticsError::NotFound(_)));
}

#[tokio::test]
async fn test_audit_dashboard() {
    let payload = engine()
        .get_dashboard(&open(), DashboardScope::Audit("a1".into()), &DashboardFilters::default())
        .await
        .unwrap();
    assert_eq!(payload["audit"]["name"], "Acme Q1");
    assert_eq!(payload["completion"], 67);
    assert_eq!(payload["stats"]["total"], 3);
    assert_eq!(payload["procedure"]["origen"], "VERIF-004");
    assert_eq!(payload["status"]["name"], "En curso");
    assert_eq!(payload["creator"]["username"], "analyst");
    assert_eq!(payload["collaborators"][0]["name"], "Ada Min");
    assert_eq!(payload["categorias"][0]["category"], "Injection");
}

#[tokio::test]
async fn test_audit_dashboard_access() {
    let engine = engine();
    let missing = engine.audit_dashboard(&open(), "nope").await.unwrap_err();
    assert!(matches!(missing, AnalyticsError::NotFound(_)));

    // An audit without a company is only visible to unrestricted callers.
    assert!(engine.audit_dashboard(&open(), "a4").await.is_ok());
    let hidden = engine.audit_dashboard(&only(&[ACME]), "a4").await.unwrap_err();
    assert!(matches!(hidden, AnalyticsError::Forbidden(_)));
    let other = engine.audit_dashboard(&only(&[ACME]), "a2").await.unwrap_err();
    assert!(matches!(other, AnalyticsError::Forbidden(_)));
}

#[tokio::test]
async fn test_top_critical_entities() {
    let filters = DashboardFilters {
        year: Some(2024),
        limit: Some(1),
        ..Default::default()
    };
    let payload = engine().top_critical_entities(&open(), &filters).await.unwrap();
    let rows = payload["entidades"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["companyId"], ACME);
    assert_eq!(rows[0]["criticalActive"], 1);
    assert_eq!(rows[0]["highActive"], 1);
    assert_eq!(rows[0]["riskTier"], "Medium");
    assert_eq!(payload["summary"]["totalEntities"], 2);
    assert_eq!(payload["limit"], 1);
}

#[tokio::test]
async fn test_top_critical_entities_limit_capped_by_max_results() {
    let mut perm = only(&[]);
    perm.endpoints.insert(
        EndpointName::EntidadesCriticas,
        EndpointFilter {
            max_results: 1,
            ..Default::default()
        },
    );
    let payload = engine().top_critical_entities(&perm, &year(2024)).await.unwrap();
    assert_eq!(payload["limit"], 1);
    assert_eq!(payload["entidades"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_entity_vulnerabilities() {
    let payload = engine()
        .entity_vulnerabilities(&open(), ACME, &year(2024))
        .await
        .unwrap();
    let rows = payload["vulnerabilidades"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["severity"], "Critical");
    assert_eq!(payload["riskTier"], "Medium");
    assert_eq!(payload["stats"]["partial"], 1);
}

#[tokio::test]
async fn test_fallback_eval_days_is_configurable() {
    let config = Config {
        default_eval_days: 3.0,
        ..Config::default()
    };
    let engine = AnalyticsEngine::new(store(), AnalyticsSettings::from(&config));
    let payload = engine.global_dashboard(&open(), &year(2023)).await.unwrap();
    assert_eq!(payload["stats"]["totalAudits"], 1);
    assert_eq!(payload["stats"]["avgEvaluationDays"], 3.0);
}

#[tokio::test]
async fn test_null_findings_count_as_empty() {
    let store = store();
    store.insert(
        Collection::Audits,
        json!({
            "_id": "n1", "name": "Legacy", "company": ACME,
            "createdAt": "2024-04-01T00:00:00Z",
            "findings": null, "alcance": null, "collaborators": null
        }),
    );
    let engine = AnalyticsEngine::new(store, AnalyticsSettings::default());

    let global = engine.global_dashboard(&open(), &year(2024)).await.unwrap();
    assert_eq!(global["stats"]["totalAudits"], 5);
    assert_eq!(global["stats"]["findings"]["total"], 4);
    assert_eq!(global["tendenciaMensual"][3]["evaluaciones"], 1);
    assert_eq!(global["tendenciaMensual"][3]["vulnerabilidades"], 0);

    let ranking = engine.top_critical_entities(&open(), &year(2024)).await.unwrap();
    assert_eq!(ranking["entidades"][0]["audits"], 3);

    let audit = engine.audit_dashboard(&open(), "n1").await.unwrap();
    assert_eq!(audit["stats"]["total"], 0);
}
