//! Audit trail for administrative and tenant-lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// Timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event type.
    pub event_type: AuditEventType,
    /// Actor (user id or system component).
    pub actor: String,
    /// Tenant the event happened in, if any. Platform-level events (tenant
    /// provisioning, system lifecycle) have none.
    pub tenant_id: Option<Uuid>,
    /// Description of the event.
    pub description: String,
    /// Additional details.
    pub details: serde_json::Value,
    /// Result/outcome.
    pub result: AuditResult,
}

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// System startup/shutdown.
    SystemLifecycle,
    /// Tenant provisioned.
    TenantCreated,
    /// Tenant status changed (suspended, archived, reactivated).
    TenantStatusChanged,
    /// Tenant settings updated.
    TenantSettingsChanged,
    /// A request could not be resolved to a tenant.
    TenantResolutionFailed,
    /// Branch created.
    BranchCreated,
    /// Branch assignment created or updated.
    AssignmentChanged,
    /// User login.
    UserLogin,
    /// Custom event.
    Custom(String),
}

/// Result of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure(String),
    Denied(String),
}

/// Audit log with capped in-memory storage.
///
/// Entries are also emitted through tracing so production deployments get
/// them in the aggregated log stream; the in-memory ring exists for the
/// admin API and tests.
pub struct AuditLog {
    entries: Arc<RwLock<VecDeque<AuditLogEntry>>>,
    max_entries: usize,
    log_to_tracing: bool,
}

impl AuditLog {
    /// Creates a new audit log.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            log_to_tracing: true,
        }
    }

    /// Creates an audit log without tracing output (for tests).
    pub fn without_tracing(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            log_to_tracing: false,
        }
    }

    /// Logs an audit entry.
    pub async fn log(&self, entry: AuditLogEntry) {
        if self.log_to_tracing {
            info!(
                event_type = ?entry.event_type,
                actor = %entry.actor,
                tenant_id = ?entry.tenant_id,
                result = ?entry.result,
                "Audit: {}",
                entry.description
            );
        }

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Logs a platform-level event with no tenant.
    pub async fn log_event(
        &self,
        event_type: AuditEventType,
        actor: &str,
        description: &str,
        result: AuditResult,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            actor: actor.to_string(),
            tenant_id: None,
            description: description.to_string(),
            details: serde_json::json!({}),
            result,
        };
        self.log(entry).await;
    }

    /// Logs an event within one tenant.
    pub async fn log_tenant_event(
        &self,
        event_type: AuditEventType,
        actor: &str,
        tenant_id: Uuid,
        description: &str,
        details: serde_json::Value,
        result: AuditResult,
    ) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            actor: actor.to_string(),
            tenant_id: Some(tenant_id),
            description: description.to_string(),
            details,
            result,
        };
        self.log(entry).await;
    }

    /// Gets all entries.
    pub async fn get_entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Gets entries for one tenant.
    pub async fn get_tenant_entries(&self, tenant_id: Uuid) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.tenant_id == Some(tenant_id))
            .cloned()
            .collect()
    }

    /// Gets entries by event type.
    pub async fn get_entries_by_type(&self, event_type: AuditEventType) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Exports entries as JSON.
    pub async fn export_json(&self) -> String {
        let entries = self.get_entries().await;
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }

    /// Gets the number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Checks if the audit log is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(10000)
    }
}
