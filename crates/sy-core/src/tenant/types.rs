//! Tenant settings and lifecycle status types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a tenant (school) in the platform lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// School is active and operational.
    #[default]
    Active,
    /// School is suspended (e.g., billing hold). Requests do not resolve to
    /// suspended tenants.
    Suspended,
    /// School is archived; data is retained but the tenant no longer serves
    /// traffic.
    Archived,
}

impl TenantStatus {
    /// Database string representation (snake_case).
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Archived => "archived",
        }
    }

    /// Parses the database representation.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TenantStatus::Active),
            "suspended" => Some(TenantStatus::Suspended),
            "archived" => Some(TenantStatus::Archived),
            _ => None,
        }
    }

    /// Returns true if requests may resolve to this tenant.
    pub fn is_operational(&self) -> bool {
        matches!(self, TenantStatus::Active)
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "Active"),
            TenantStatus::Suspended => write!(f, "Suspended"),
            TenantStatus::Archived => write!(f, "Archived"),
        }
    }
}

/// Per-tenant display and localization settings.
///
/// Stored as a JSON blob on the tenant record. Feature modules read these;
/// the isolation core only carries them through resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantSettings {
    /// Name shown in page headers and reports, when different from the
    /// registered name.
    pub display_name: Option<String>,

    /// BCP 47 locale tag used for formatting.
    pub locale: String,

    /// IANA timezone name for calendars and attendance timestamps.
    pub timezone: String,

    /// Label of the current academic year, e.g. "2026/2027".
    pub academic_year: Option<String>,

    /// Per-tenant feature flag overrides; these win over platform defaults.
    pub feature_overrides: HashMap<String, bool>,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            display_name: None,
            locale: "en".to_string(),
            timezone: "UTC".to_string(),
            academic_year: None,
            feature_overrides: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_default_is_active() {
        assert_eq!(TenantStatus::default(), TenantStatus::Active);
    }

    #[test]
    fn status_operational() {
        assert!(TenantStatus::Active.is_operational());
        assert!(!TenantStatus::Suspended.is_operational());
        assert!(!TenantStatus::Archived.is_operational());
    }

    #[test]
    fn status_db_round_trip() {
        for status in [
            TenantStatus::Active,
            TenantStatus::Suspended,
            TenantStatus::Archived,
        ] {
            assert_eq!(TenantStatus::from_db_str(status.as_db_str()), Some(status));
        }
        assert_eq!(TenantStatus::from_db_str("deleted"), None);
    }

    #[test]
    fn settings_defaults() {
        let settings = TenantSettings::default();
        assert_eq!(settings.locale, "en");
        assert_eq!(settings.timezone, "UTC");
        assert!(settings.display_name.is_none());
        assert!(settings.feature_overrides.is_empty());
    }

    #[test]
    fn settings_serialization() {
        let mut settings = TenantSettings::default();
        settings.academic_year = Some("2026/2027".to_string());
        settings
            .feature_overrides
            .insert("transport_module".to_string(), true);

        let json = serde_json::to_string(&settings).unwrap();
        let parsed: TenantSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
