//! Append-only audit trail of privileged actions.
//!
//! Recording never blocks or fails the action that produced it: entries are
//! written on a spawned task and a failed write only logs a warning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use jobboard_core::{AdminId, AuditEntryId};

use crate::store::{AuditStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ApproveCompany,
    DenyCompany,
    HoldCompany,
    RevokeCompanyAccess,
    MessageCompany,
    OverrideJobStatus,
    TriggerSubscriptionSweep,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ApproveCompany => "approve_company",
            AuditAction::DenyCompany => "deny_company",
            AuditAction::HoldCompany => "hold_company",
            AuditAction::RevokeCompanyAccess => "revoke_company_access",
            AuditAction::MessageCompany => "message_company",
            AuditAction::OverrideJobStatus => "override_job_status",
            AuditAction::TriggerSubscriptionSweep => "trigger_subscription_sweep",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "approve_company" => AuditAction::ApproveCompany,
            "deny_company" => AuditAction::DenyCompany,
            "hold_company" => AuditAction::HoldCompany,
            "revoke_company_access" => AuditAction::RevokeCompanyAccess,
            "message_company" => AuditAction::MessageCompany,
            "override_job_status" => AuditAction::OverrideJobStatus,
            "trigger_subscription_sweep" => AuditAction::TriggerSubscriptionSweep,
            _ => return None,
        })
    }
}

/// What kind of thing an audited action touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    Company,
    Job,
    System,
}

impl AuditEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEntityType::Company => "company",
            AuditEntityType::Job => "job",
            AuditEntityType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "company" => AuditEntityType::Company,
            "job" => AuditEntityType::Job,
            "system" => AuditEntityType::System,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub admin_id: AdminId,
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        admin_id: AdminId,
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: impl Into<String>,
        details: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            admin_id,
            action,
            entity_type,
            entity_id: entity_id.into(),
            details,
            timestamp,
        }
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Record an entry in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn record(&self, entry: AuditLogEntry) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            write_entry(store.as_ref(), &entry).await;
        });
    }

    /// Record an entry and wait for the write; failures are still only logged.
    pub async fn record_now(&self, entry: AuditLogEntry) {
        write_entry(self.store.as_ref(), &entry).await;
    }

    pub async fn recent(&self, limit: usize) -> StoreResult<Vec<AuditLogEntry>> {
        self.store.list(limit).await
    }
}

async fn write_entry(store: &dyn AuditStore, entry: &AuditLogEntry) {
    match store.append(entry).await {
        Ok(()) => debug!(
            action = entry.action.as_str(),
            entity_id = %entry.entity_id,
            admin_id = %entry.admin_id,
            "audit entry recorded"
        ),
        Err(e) => warn!(
            action = entry.action.as_str(),
            entity_id = %entry.entity_id,
            error = %e,
            "failed to record audit entry"
        ),
    }
}
