// tests/permissions_tests.rs
mod common;

use auditboard::AnalyticsError;
use auditboard::permissions::{
    AllowedCompanies, EndpointName, PermissionEvaluator, PermissionService, SectionName,
};
use auditboard::store::{Collection, DocumentStore, Filter};
use common::*;
use serde_json::json;

fn service() -> (std::sync::Arc<auditboard::store::MemoryStore>, PermissionService) {
    let store = store();
    (store.clone(), PermissionService::new(store))
}

#[tokio::test]
async fn test_get_permissions_creates_unrestricted_default_once() {
    let (store, service) = service();
    let first = service.get_permissions(ANALYST).await.unwrap();
    let second = service.get_permissions(ANALYST).await.unwrap();

    assert!(!first.custom_permissions_enabled);
    assert_eq!(first.id, second.id);
    assert_eq!(store.len(Collection::Permissions), 1);
}

#[tokio::test]
async fn test_concurrent_first_access_converges() {
    let (store, service) = service();
    let (a, b) = tokio::join!(service.get_or_create(ANALYST), service.get_or_create(ANALYST));
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(store.len(Collection::Permissions), 1);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let (_, service) = service();
    let err = service.get_permissions("nobody").await.unwrap_err();
    assert!(matches!(err, AnalyticsError::NotFound(_)));
}

#[tokio::test]
async fn test_patch_keeps_omitted_fields_and_replace_resets_them() {
    let (_, service) = service();
    service
        .upsert_permissions(
            ANALYST,
            &json!({
                "customPermissionsEnabled": true,
                "globalAllowedCompanies": [ACME],
                "endpoints": {"globalDashboard": {"maxResults": 5}},
                "visibleSections": {"porTipo": false}
            }),
            ADMIN,
        )
        .await
        .unwrap();

    let patched = service
        .patch_permissions(
            ANALYST,
            &json!({"endpoints": {"globalDashboard": {"onlyFlaggedCompanies": true}}}),
            ADMIN,
        )
        .await
        .unwrap();
    assert!(patched.custom_permissions_enabled);
    assert!(patched.global_allowed_companies.contains(ACME));
    let global = patched.endpoint(EndpointName::GlobalDashboard).unwrap();
    assert_eq!(global.max_results, 5);
    assert!(global.only_flagged_companies);
    assert_eq!(patched.section_flag(SectionName::PorTipo), Some(false));
    assert_eq!(patched.created_by.as_deref(), Some(ADMIN));

    let fetched = service.get_permissions(ANALYST).await.unwrap();
    assert_eq!(fetched, patched);

    let replaced = service
        .upsert_permissions(ANALYST, &json!({"customPermissionsEnabled": true}), ADMIN)
        .await
        .unwrap();
    assert!(replaced.global_allowed_companies.is_empty());
    assert!(replaced.endpoints.is_empty());
    assert_eq!(replaced.section_flag(SectionName::PorTipo), None);
    assert_eq!(replaced.id, patched.id);
}

#[tokio::test]
async fn test_invalid_update_lists_every_field() {
    let (store, service) = service();
    let err = service
        .upsert_permissions(
            ANALYST,
            &json!({
                "endpoints": {"unknownEndpoint": {}},
                "globalExcludedCompanies": ["not-an-id"],
                "visibleSections": {"porTipo": "no"}
            }),
            ADMIN,
        )
        .await
        .unwrap_err();

    match err {
        AnalyticsError::BadParameters(fields) => {
            let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(fields.len(), 3, "{:?}", names);
            assert!(names.contains(&"globalExcludedCompanies[0]"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(store.len(Collection::Permissions), 0);
}

#[tokio::test]
async fn test_reset_reverts_to_default() {
    let (_, service) = service();
    service
        .upsert_permissions(ANALYST, &json!({"customPermissionsEnabled": true}), ADMIN)
        .await
        .unwrap();
    assert!(service.reset_permissions(ANALYST).await.unwrap());
    assert!(!service.reset_permissions(ANALYST).await.unwrap());
    assert!(!service.get_permissions(ANALYST).await.unwrap().custom_permissions_enabled);
}

#[tokio::test]
async fn test_cleanup_removes_orphans_only() {
    let (store, service) = service();
    service.get_or_create(ANALYST).await.unwrap();
    restrict(&store, "deleted-user", json!({}));

    assert_eq!(service.cleanup_orphans().await.unwrap(), 1);
    assert_eq!(store.len(Collection::Permissions), 1);
    assert_eq!(service.cleanup_orphans().await.unwrap(), 0);
}

#[tokio::test]
async fn test_check_access_exclusion_wins() {
    let (store, service) = service();
    restrict(
        &store,
        ANALYST,
        json!({
            "globalExcludedCompanies": [ACME],
            "endpoints": {"companyDashboard": {"allowedCompanies": [ACME, BANK]}}
        }),
    );

    assert!(!service.check_access(ANALYST, ACME, EndpointName::CompanyDashboard).await.unwrap());
    assert!(service.check_access(ANALYST, BANK, EndpointName::CompanyDashboard).await.unwrap());
    // Admins are never restricted.
    restrict(&store, ADMIN, json!({"globalExcludedCompanies": [ACME]}));
    assert!(service.check_access(ADMIN, ACME, EndpointName::CompanyDashboard).await.unwrap());

    let err = service
        .check_access(ANALYST, "acme", EndpointName::CompanyDashboard)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::BadParameters(_)));
}

#[tokio::test]
async fn test_build_company_filter() {
    let (store, service) = service();
    restrict(&store, ANALYST, json!({"globalOnlyFlaggedCompanies": true}));

    let open = service
        .build_company_filter(ADMIN, EndpointName::GlobalDashboard)
        .await
        .unwrap();
    assert!(open.is_empty());

    let flagged = service
        .build_company_filter(ANALYST, EndpointName::GlobalDashboard)
        .await
        .unwrap();
    assert_eq!(flagged.get("company"), Some(&json!({"$in": [ACME]})));

    // The record created on first access stays in force afterwards.
    let later = service
        .build_company_filter(ANALYST, EndpointName::GlobalDashboard)
        .await
        .unwrap();
    assert_eq!(later, flagged);
    assert_eq!(store.len(Collection::Permissions), 1);
}

#[tokio::test]
async fn test_master_switch_off_ignores_stale_restrictions() {
    let (store, _) = service();
    restrict(
        &store,
        ANALYST,
        json!({
            "customPermissionsEnabled": false,
            "globalAllowedCompanies": [BANK],
            "visibleSections": {"stats": false}
        }),
    );
    let doc = store
        .find_one(Collection::Permissions, &Filter::new().with("userId", ANALYST))
        .await
        .unwrap()
        .unwrap();
    let permission = serde_json::from_value(doc).unwrap();
    let evaluator = PermissionEvaluator::new(&permission);

    assert!(evaluator.visible_sections().values().all(|v| *v));
    assert_eq!(
        evaluator
            .allowed_company_ids(store.as_ref(), EndpointName::GlobalDashboard)
            .await
            .unwrap(),
        AllowedCompanies::Unrestricted
    );
}

#[tokio::test]
async fn test_list_permissions_covers_analysts() {
    let (store, service) = service();
    restrict(&store, ANALYST, json!({"endpoints": {"auditDashboard": {"enabled": false}}}));
    let list = service.list_permissions().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].user.username, "analyst");
    assert_eq!(list[0].disabled_endpoints, vec![EndpointName::AuditDashboard]);

    let options = service.options().await.unwrap();
    assert_eq!(options.endpoints.len(), 5);
    assert_eq!(options.sections.len(), 11);
    let names: Vec<&str> = options.companies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Acme", "Bank"]);
}
