// src/permissions/mod.rs
pub mod evaluator;
pub mod model;
pub mod service;
pub mod validation;

pub use evaluator::{AllowedCompanies, PermissionEvaluator, cap, strip_fields};
pub use model::{AnalyticsPermission, EndpointFilter, EndpointName, SectionName};
pub use service::{PermissionOptions, PermissionService, PermissionSummary};
pub use validation::{PermissionUpdate, is_valid_company_id};
