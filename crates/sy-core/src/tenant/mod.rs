//! Multi-tenant support for Schoolyard.
//!
//! A tenant is one school: an isolated customer whose rows must never be
//! visible to another school. This module provides:
//! - [`Tenant`]: the durable tenant record (the tenant directory entry)
//! - [`TenantContext`]: lightweight request-scoped tenant context
//! - [`TenantSettings`] / [`TenantStatus`]: per-tenant configuration and
//!   lifecycle state

mod types;

pub use types::{TenantSettings, TenantStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during tenant operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// Code validation failed.
    #[error("Invalid tenant code: {0}")]
    InvalidCode(String),

    /// Tenant not found.
    #[error("Tenant not found: {0}")]
    NotFound(Uuid),

    /// Tenant is not in an operational state.
    #[error("Tenant is not operational (status: {0})")]
    NotOperational(TenantStatus),
}

/// Validates a tenant code (the subdomain-style key):
/// - lowercase alphanumeric characters and hyphens only
/// - 3-63 characters long
/// - must start with a letter
/// - cannot end with a hyphen, no consecutive hyphens
fn validate_code(code: &str) -> Result<(), TenantError> {
    if code.len() < 3 || code.len() > 63 {
        return Err(TenantError::InvalidCode(format!(
            "code must be between 3 and 63 characters, got {}",
            code.len()
        )));
    }

    if !code.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        return Err(TenantError::InvalidCode(
            "code must start with a lowercase letter".to_string(),
        ));
    }

    if code.ends_with('-') {
        return Err(TenantError::InvalidCode(
            "code cannot end with a hyphen".to_string(),
        ));
    }

    let mut prev_hyphen = false;
    for ch in code.chars() {
        if ch == '-' {
            if prev_hyphen {
                return Err(TenantError::InvalidCode(
                    "code cannot contain consecutive hyphens".to_string(),
                ));
            }
            prev_hyphen = true;
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            prev_hyphen = false;
        } else {
            return Err(TenantError::InvalidCode(format!(
                "code contains invalid character '{}'; only lowercase letters, digits, and hyphens are allowed",
                ch
            )));
        }
    }

    Ok(())
}

/// A tenant record: one school on the platform.
///
/// Created by provisioning, read by the tenant resolver, never mutated by the
/// isolation core itself. The `code` doubles as the subdomain key
/// (`greenfield.schoolyard.app` resolves the tenant with code `greenfield`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique identifier.
    pub id: Uuid,

    /// Registered name of the school.
    pub name: String,

    /// URL-safe subdomain key. Lowercase alphanumeric with hyphens,
    /// 3-63 chars, starting with a letter.
    pub code: String,

    /// Lifecycle status; only `Active` tenants serve traffic.
    pub status: TenantStatus,

    /// Display and localization settings.
    pub settings: TenantSettings,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Creates a new active tenant with a generated id.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::InvalidCode`] if the code fails validation.
    pub fn new(code: &str, name: &str) -> Result<Self, TenantError> {
        Self::with_id(Uuid::new_v4(), code, name)
    }

    /// Creates a tenant with a specific id (for seeding and tests).
    pub fn with_id(id: Uuid, code: &str, name: &str) -> Result<Self, TenantError> {
        validate_code(code)?;

        let now = Utc::now();
        Ok(Self {
            id,
            name: name.to_string(),
            code: code.to_string(),
            status: TenantStatus::Active,
            settings: TenantSettings::default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns true if the tenant may serve traffic.
    pub fn is_operational(&self) -> bool {
        self.status.is_operational()
    }

    /// Replaces the settings blob.
    pub fn update_settings(&mut self, settings: TenantSettings) {
        self.settings = settings;
        self.updated_at = Utc::now();
    }

    /// Transitions the lifecycle status.
    pub fn update_status(&mut self, status: TenantStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Request-scoped tenant context.
///
/// Attached to request extensions by the tenant resolver so handlers that
/// prefer explicit access over the ambient identity slot can read it. The
/// settings are behind an `Arc`, so cloning is cheap.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// The resolved tenant id.
    pub tenant_id: Uuid,

    /// The tenant's subdomain code.
    pub tenant_code: String,

    /// Shared settings snapshot taken at resolution time.
    pub settings: Arc<TenantSettings>,
}

impl TenantContext {
    /// Builds a context from a tenant record.
    pub fn from_tenant(tenant: &Tenant) -> Self {
        Self {
            tenant_id: tenant.id,
            tenant_code: tenant.code.clone(),
            settings: Arc::new(tenant.settings.clone()),
        }
    }

    /// Builds a context from explicit parts.
    pub fn new(tenant_id: Uuid, tenant_code: String, settings: Arc<TenantSettings>) -> Self {
        Self {
            tenant_id,
            tenant_code,
            settings,
        }
    }

    /// Checks whether a feature is explicitly overridden for this tenant.
    pub fn feature_override(&self, feature: &str) -> Option<bool> {
        self.settings.feature_overrides.get(feature).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_creation() {
        let tenant = Tenant::new("greenfield", "Greenfield Academy").unwrap();
        assert_eq!(tenant.code, "greenfield");
        assert_eq!(tenant.name, "Greenfield Academy");
        assert_eq!(tenant.status, TenantStatus::Active);
        assert!(tenant.is_operational());
    }

    #[test]
    fn tenant_with_id() {
        let id = Uuid::new_v4();
        let tenant = Tenant::with_id(id, "hillcrest", "Hillcrest School").unwrap();
        assert_eq!(tenant.id, id);
    }

    #[test]
    fn code_validation_accepts_valid_codes() {
        assert!(validate_code("abc").is_ok());
        assert!(validate_code("st-marys").is_ok());
        assert!(validate_code("school123").is_ok());
        assert!(validate_code("a-b-c").is_ok());
        assert!(validate_code("a".repeat(63).as_str()).is_ok());
    }

    #[test]
    fn code_validation_rejects_bad_lengths() {
        assert!(validate_code("ab").is_err());
        assert!(validate_code(&"a".repeat(64)).is_err());
    }

    #[test]
    fn code_validation_rejects_bad_shapes() {
        assert!(validate_code("1school").is_err());
        assert!(validate_code("-school").is_err());
        assert!(validate_code("school-").is_err());
        assert!(validate_code("st--marys").is_err());
        assert!(validate_code("StMarys").is_err());
        assert!(validate_code("st_marys").is_err());
        assert!(validate_code("st.marys").is_err());
    }

    #[test]
    fn context_from_tenant() {
        let tenant = Tenant::new("greenfield", "Greenfield Academy").unwrap();
        let ctx = TenantContext::from_tenant(&tenant);
        assert_eq!(ctx.tenant_id, tenant.id);
        assert_eq!(ctx.tenant_code, tenant.code);
    }

    #[test]
    fn context_clone_shares_settings() {
        let tenant = Tenant::new("greenfield", "Greenfield Academy").unwrap();
        let ctx1 = TenantContext::from_tenant(&tenant);
        let ctx2 = ctx1.clone();
        assert!(Arc::ptr_eq(&ctx1.settings, &ctx2.settings));
    }

    #[test]
    fn context_feature_override() {
        let mut tenant = Tenant::new("greenfield", "Greenfield Academy").unwrap();
        tenant
            .settings
            .feature_overrides
            .insert("transport_module".to_string(), false);
        let ctx = TenantContext::from_tenant(&tenant);
        assert_eq!(ctx.feature_override("transport_module"), Some(false));
        assert_eq!(ctx.feature_override("fees_module"), None);
    }

    #[test]
    fn update_status_leaves_operational_state() {
        let mut tenant = Tenant::new("greenfield", "Greenfield Academy").unwrap();
        tenant.update_status(TenantStatus::Suspended);
        assert!(!tenant.is_operational());
        tenant.update_status(TenantStatus::Archived);
        assert!(!tenant.is_operational());
    }

    #[test]
    fn tenant_serialization() {
        let tenant = Tenant::new("greenfield", "Greenfield Academy").unwrap();
        let json = serde_json::to_string(&tenant).unwrap();
        let parsed: Tenant = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, tenant.id);
        assert_eq!(parsed.code, tenant.code);
        assert_eq!(parsed.status, tenant.status);
    }
}
