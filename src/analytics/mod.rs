// src/analytics/mod.rs
pub mod audit;
pub mod breakdowns;
pub mod lists;
pub mod period;
pub mod risk;
pub mod stats;
pub mod trend;

use chrono::Utc;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, SeverityColors};
use crate::error::{AnalyticsError, Result};
use crate::findings::{analyze, group_by_category};
use crate::models::{
    AuditRecord, Company, Procedure, ProcedureTemplate, Status, User, UserSummary,
};
use crate::permissions::{
    AllowedCompanies, AnalyticsPermission, EndpointName, PermissionEvaluator, cap,
    is_valid_company_id, strip_fields,
};
use crate::store::{Collection, DocumentStore, Filter, find_as, find_by_id, find_one_as};

pub use period::{DashboardFilters, TimeRange};
pub use risk::{RiskTier, classify};

/// Tunables the engine reads from [`Config`].
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    pub default_eval_days: f64,
    pub top_entities_limit: usize,
    pub recent_evaluations_limit: usize,
    pub severity_colors: SeverityColors,
}

impl From<&Config> for AnalyticsSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_eval_days: config.default_eval_days,
            top_entities_limit: config.top_entities_limit,
            recent_evaluations_limit: config.recent_evaluations_limit,
            severity_colors: config.severity_colors.clone(),
        }
    }
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardScope {
    Global,
    Company(String),
    Audit(String),
}

/// Catalog collections the breakdowns resolve against.
struct Catalogs {
    companies: HashMap<String, Company>,
    procedures: HashMap<String, Procedure>,
    templates: Vec<ProcedureTemplate>,
    statuses: HashMap<String, Status>,
}

/// Computes dashboard payloads. Every read takes the caller's permission
/// record and never mutates it.
#[derive(Clone)]
pub struct AnalyticsEngine {
    store: Arc<dyn DocumentStore>,
    settings: Arc<AnalyticsSettings>,
}

fn forbidden(endpoint: EndpointName) -> AnalyticsError {
    AnalyticsError::Forbidden(format!("Access to {} is disabled", endpoint.label()))
}

fn require_company_id(company_id: &str) -> Result<()> {
    if is_valid_company_id(company_id) {
        Ok(())
    } else {
        Err(AnalyticsError::bad_parameter(
            "companyId",
            format!("'{}' is not a valid company id", company_id),
        ))
    }
}

/// Caps `base` by the endpoint's `maxResults`; zero means unlimited on both.
fn list_limit(max_results: usize, base: usize) -> usize {
    match (max_results, base) {
        (0, base) => base,
        (max, 0) => max,
        (max, base) => base.min(max),
    }
}

fn by_id<T>(rows: Vec<T>, id: impl Fn(&T) -> &str) -> HashMap<String, T> {
    rows.into_iter().map(|row| (id(&row).to_string(), row)).collect()
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn DocumentStore>, settings: AnalyticsSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &AnalyticsSettings {
        &self.settings
    }

    fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub async fn get_dashboard(
        &self,
        permission: &AnalyticsPermission,
        scope: DashboardScope,
        filters: &DashboardFilters,
    ) -> Result<Value> {
        match scope {
            DashboardScope::Global => self.global_dashboard(permission, filters).await,
            DashboardScope::Company(id) => self.company_dashboard(permission, &id, filters).await,
            DashboardScope::Audit(id) => self.audit_dashboard(permission, &id).await,
        }
    }

    /// Resolves the enabled check and the company set for `endpoint`.
    async fn scope_for(
        &self,
        permission: &AnalyticsPermission,
        endpoint: EndpointName,
    ) -> Result<AllowedCompanies> {
        let evaluator = PermissionEvaluator::new(permission);
        if !evaluator.is_endpoint_enabled(endpoint) {
            return Err(forbidden(endpoint));
        }
        Ok(evaluator.allowed_company_ids(self.store(), endpoint).await?)
    }

    /// Loads a company the caller may see through `endpoint`.
    async fn visible_company(
        &self,
        permission: &AnalyticsPermission,
        company_id: &str,
        endpoint: EndpointName,
    ) -> Result<Company> {
        require_company_id(company_id)?;
        let allowed = self.scope_for(permission, endpoint).await?;
        if !allowed.contains(company_id) {
            return Err(AnalyticsError::Forbidden(format!(
                "No access to company {}",
                company_id
            )));
        }
        find_by_id(self.store(), Collection::Companies, company_id)
            .await?
            .ok_or_else(|| AnalyticsError::NotFound(format!("company {}", company_id)))
    }

    async fn catalogs(&self) -> Result<Catalogs> {
        let all = Filter::new();
        let (companies, procedures, templates, statuses) = tokio::try_join!(
            find_as::<Company>(self.store(), Collection::Companies, &all),
            find_as::<Procedure>(self.store(), Collection::Procedures, &all),
            find_as::<ProcedureTemplate>(self.store(), Collection::ProcedureTemplates, &all),
            find_as::<Status>(self.store(), Collection::Statuses, &all),
        )?;
        Ok(Catalogs {
            companies: by_id(companies, |c| c.id.as_str()),
            procedures: by_id(procedures, |p| p.id.as_str()),
            templates,
            statuses: by_id(statuses, |s| s.id.as_str()),
        })
    }

    /// Audits in the reporting period and audits in the trend year, both
    /// narrowed by `scope`.
    async fn period_audits(
        &self,
        filters: &DashboardFilters,
        scope: &Filter,
    ) -> Result<(Vec<AuditRecord>, Vec<AuditRecord>, i32)> {
        let now = Utc::now();
        let range = filters.time_range(now)?;
        let trend_year = filters.trend_year(now)?;
        let trend_range = TimeRange::for_year(trend_year)?;

        let audit_filter = range.filter("createdAt").merge(scope);
        let trend_filter = trend_range.filter("createdAt").merge(scope);
        tracing::debug!("Audit filter: {}", json!(audit_filter));

        let (audits, trend_audits) = tokio::try_join!(
            find_as::<AuditRecord>(self.store(), Collection::Audits, &audit_filter),
            find_as::<AuditRecord>(self.store(), Collection::Audits, &trend_filter),
        )?;
        Ok((audits, trend_audits, trend_year))
    }

    pub async fn global_dashboard(
        &self,
        permission: &AnalyticsPermission,
        filters: &DashboardFilters,
    ) -> Result<Value> {
        let endpoint = EndpointName::GlobalDashboard;
        let allowed = self.scope_for(permission, endpoint).await?;
        let company_scope = allowed.to_filter("company");
        let active_filter = Filter::new()
            .with("status", true)
            .merge(&allowed.to_filter("_id"));

        let (period, active_companies, catalogs) = tokio::try_join!(
            self.period_audits(filters, &company_scope),
            async {
                self.store()
                    .count(Collection::Companies, &active_filter)
                    .await
                    .map_err(AnalyticsError::from)
            },
            self.catalogs(),
        )?;
        let (audits, trend_audits, trend_year) = period;

        let evaluator = PermissionEvaluator::new(permission);
        let excluded = evaluator.excluded_fields(endpoint);
        let stats = stats::global_stats(&audits, active_companies, self.settings.default_eval_days);

        let entities = cap(
            lists::evaluated_entities(&audits, &catalogs.companies),
            evaluator.max_results(endpoint),
        );
        let recent = cap(
            lists::recent_evaluations(&audits, &catalogs.companies),
            list_limit(evaluator.max_results(endpoint), self.settings.recent_evaluations_limit),
        );
        let alerts = cap(
            lists::active_alerts(&audits, &catalogs.companies),
            evaluator.max_results(endpoint),
        );

        tracing::info!(
            "Global dashboard: {} audits, {} companies evaluated",
            stats.total_audits,
            stats.companies_evaluated
        );

        Ok(json!({
            "scope": "global",
            "porProcedimiento": breakdowns::by_procedure(&audits, &catalogs.procedures, &catalogs.templates),
            "porAlcance": breakdowns::by_alcance(&audits),
            "porEstado": breakdowns::by_status(&audits, &catalogs.statuses),
            "porTipo": breakdowns::by_type(&audits),
            "porSeveridad": breakdowns::by_severity(&stats.findings, &self.settings.severity_colors),
            "tendenciaMensual": trend::monthly_trend(&trend_audits, trend_year),
            "entidadesEvaluadas": strip_fields(&entities, &excluded)?,
            "evaluacionesRecientes": strip_fields(&recent, &excluded)?,
            "alertasActivas": strip_fields(&alerts, &excluded)?,
            "clientesAsociados": lists::associated_clients(&audits),
            "stats": stats,
        }))
    }

    pub async fn company_dashboard(
        &self,
        permission: &AnalyticsPermission,
        company_id: &str,
        filters: &DashboardFilters,
    ) -> Result<Value> {
        let endpoint = EndpointName::CompanyDashboard;
        let company = self.visible_company(permission, company_id, endpoint).await?;
        let company_scope = Filter::new().with("company", company_id);

        let (period, catalogs) = tokio::try_join!(
            self.period_audits(filters, &company_scope),
            self.catalogs(),
        )?;
        let (audits, trend_audits, trend_year) = period;

        let evaluator = PermissionEvaluator::new(permission);
        let excluded = evaluator.excluded_fields(endpoint);
        let stats = stats::company_stats(&audits, self.settings.default_eval_days);
        let recent = cap(
            lists::recent_evaluations(&audits, &catalogs.companies),
            list_limit(evaluator.max_results(endpoint), self.settings.recent_evaluations_limit),
        );
        let alerts = cap(
            lists::active_alerts(&audits, &catalogs.companies),
            evaluator.max_results(endpoint),
        );

        tracing::info!("Company dashboard for {}: {} audits", company.id, stats.total_audits);

        Ok(json!({
            "scope": "company",
            "company": company,
            "porProcedimiento": breakdowns::by_procedure(&audits, &catalogs.procedures, &catalogs.templates),
            "porAlcance": breakdowns::by_alcance(&audits),
            "porEstado": breakdowns::by_status(&audits, &catalogs.statuses),
            "porTipo": breakdowns::by_type(&audits),
            "porSeveridad": breakdowns::by_severity(&stats.findings, &self.settings.severity_colors),
            "tendenciaMensual": trend::monthly_trend(&trend_audits, trend_year),
            "evaluacionesRecientes": strip_fields(&recent, &excluded)?,
            "alertasActivas": strip_fields(&alerts, &excluded)?,
            "clientesAsociados": lists::associated_clients(&audits),
            "stats": stats,
        }))
    }

    pub async fn audit_dashboard(
        &self,
        permission: &AnalyticsPermission,
        audit_id: &str,
    ) -> Result<Value> {
        let endpoint = EndpointName::AuditDashboard;
        let allowed = self.scope_for(permission, endpoint).await?;
        let audit: AuditRecord = find_by_id(self.store(), Collection::Audits, audit_id)
            .await?
            .ok_or_else(|| AnalyticsError::NotFound(format!("audit {}", audit_id)))?;

        let visible = match (&allowed, audit.company.as_deref()) {
            (AllowedCompanies::Unrestricted, _) => true,
            (allowed, Some(company)) => allowed.contains(company),
            (_, None) => false,
        };
        if !visible {
            return Err(AnalyticsError::Forbidden(format!("No access to audit {}", audit_id)));
        }

        let people: Vec<String> = audit
            .creator
            .iter()
            .chain(audit.collaborators.iter())
            .cloned()
            .collect();
        let procedure_filter = Filter::new().with("_id", audit.procedure.clone().unwrap_or_default());
        let status_filter = Filter::new().with("_id", audit.status.clone().unwrap_or_default());
        let user_filter = Filter::new().op("_id", "$in", json!(people));

        let (procedure, status, users) = tokio::try_join!(
            find_one_as::<Procedure>(self.store(), Collection::Procedures, &procedure_filter),
            find_one_as::<Status>(self.store(), Collection::Statuses, &status_filter),
            find_as::<User>(self.store(), Collection::Users, &user_filter),
        )?;
        let users = by_id(users, |u| u.id.as_str());
        let creator = audit
            .creator
            .as_ref()
            .and_then(|id| users.get(id))
            .map(UserSummary::from);
        let collaborators: Vec<UserSummary> = audit
            .collaborators
            .iter()
            .filter_map(|id| users.get(id))
            .map(UserSummary::from)
            .collect();

        let findings = analyze(&audit.findings);
        tracing::info!("Audit dashboard for {}: {} findings", audit.id, findings.total);

        Ok(json!({
            "scope": "audit",
            "audit": audit::AuditSummary::from(&audit),
            "porSeveridad": breakdowns::by_severity(&findings, &self.settings.severity_colors),
            "categorias": group_by_category(&audit.findings),
            "procedure": procedure,
            "status": status,
            "creator": creator,
            "collaborators": collaborators,
            "completion": audit::completion_percentage(&audit),
            "stats": findings,
        }))
    }

    /// Companies ranked by active critical exposure over the reporting period.
    pub async fn top_critical_entities(
        &self,
        permission: &AnalyticsPermission,
        filters: &DashboardFilters,
    ) -> Result<Value> {
        let endpoint = EndpointName::EntidadesCriticas;
        let allowed = self.scope_for(permission, endpoint).await?;
        let range = filters.time_range(Utc::now())?;
        let audit_filter = range.filter("createdAt").merge(&allowed.to_filter("company"));

        let all = Filter::new();
        let (audits, companies) = tokio::try_join!(
            find_as::<AuditRecord>(self.store(), Collection::Audits, &audit_filter),
            find_as::<Company>(self.store(), Collection::Companies, &all),
        )?;
        let companies = by_id(companies, |c| c.id.as_str());

        let ranked = risk::rank_entities(
            &audits,
            &companies,
            filters.prioritize_flagged.unwrap_or(false),
        );
        let summary = risk::summarize(&ranked);

        let evaluator = PermissionEvaluator::new(permission);
        let requested = filters.limit.unwrap_or(self.settings.top_entities_limit);
        let limit = list_limit(evaluator.max_results(endpoint), requested);
        let rows = strip_fields(&cap(ranked, limit), &evaluator.excluded_fields(endpoint))?;

        Ok(json!({
            "entidades": rows,
            "summary": summary,
            "limit": limit,
        }))
    }

    /// Findings of one company over the reporting period, most severe first.
    pub async fn entity_vulnerabilities(
        &self,
        permission: &AnalyticsPermission,
        company_id: &str,
        filters: &DashboardFilters,
    ) -> Result<Value> {
        let endpoint = EndpointName::VulnerabilidadesEntidad;
        let company = self.visible_company(permission, company_id, endpoint).await?;
        let range = filters.time_range(Utc::now())?;
        let audit_filter = range
            .filter("createdAt")
            .merge(&Filter::new().with("company", company_id));
        let audits: Vec<AuditRecord> =
            find_as(self.store(), Collection::Audits, &audit_filter).await?;

        let stats = analyze(audits.iter().flat_map(|a| a.findings.iter()));
        let companies = HashMap::from([(company.id.clone(), company.clone())]);
        let tier = risk::rank_entities(&audits, &companies, false)
            .first()
            .map(|e| e.risk_tier)
            .unwrap_or(RiskTier::Minimal);

        let evaluator = PermissionEvaluator::new(permission);
        let rows = cap(risk::entity_findings(&audits), evaluator.max_results(endpoint));

        Ok(json!({
            "company": company,
            "riskTier": tier,
            "porSeveridad": breakdowns::by_severity(&stats, &self.settings.severity_colors),
            "vulnerabilidades": strip_fields(&rows, &evaluator.excluded_fields(endpoint))?,
            "stats": stats,
        }))
    }
}
