//! Best-effort audit trail for sensitive mutations.
//!
//! An audit write never decides the outcome of the request that caused it:
//! failures are logged here and returned only as a value the caller drops.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::{Principal, RequestContext};
use crate::store::Store;
use crate::types::AuditEntry;

#[derive(Error, Debug)]
#[error("audit write failed: {0}")]
pub struct AuditWriteFailed(pub String);

pub type AuditTask = JoinHandle<Result<AuditEntry, AuditWriteFailed>>;

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn Store>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Spawn the write of one entry.
    pub fn record(
        &self,
        actor: &str,
        action: &str,
        target_type: &str,
        target_id: &str,
        meta: serde_json::Value,
    ) -> AuditTask {
        let entry = AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            meta,
            created_at: Utc::now().to_rfc3339(),
        };
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            match store.insert_audit_entry(&entry).await {
                Ok(()) => {
                    tracing::info!(action = %entry.action, target_id = %entry.target_id, "Audit entry recorded");
                    Ok(entry)
                }
                Err(e) => {
                    tracing::warn!(
                        action = %entry.action,
                        target_id = %entry.target_id,
                        error = %e,
                        "Audit create failed"
                    );
                    Err(AuditWriteFailed(e.to_string()))
                }
            }
        })
    }

    /// Record the route's mutation after it committed, before the response goes out.
    ///
    /// The invocation must not return while the write is in flight: Lambda
    /// freezes the sandbox once the response is sent.
    pub async fn record_mutation(
        &self,
        ctx: &RequestContext,
        principal: &Principal,
        target_id: &str,
        meta: serde_json::Value,
    ) {
        let Some(mutation) = ctx.mutation else {
            return;
        };
        let task = self.record(
            &principal.subject,
            mutation.action,
            mutation.target_type,
            target_id,
            meta,
        );
        // outcome already logged inside the task
        let _ = task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_record_appends_entry() {
        let store = Arc::new(MemoryStore::new());
        let recorder = AuditRecorder::new(store.clone());

        let entry = recorder
            .record("admin1", "delete_user", "user", "u2", serde_json::json!({"email": "u2@x.io"}))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.actor, "admin1");
        let stored = store.audit_entries();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], entry);
    }

    #[tokio::test]
    async fn test_failed_write_is_returned_not_raised() {
        let store = Arc::new(MemoryStore::new());
        store.set_audit_failing(true);
        let recorder = AuditRecorder::new(store.clone());

        let outcome = recorder
            .record("admin1", "delete_user", "user", "u2", serde_json::Value::Null)
            .await
            .unwrap();

        assert!(outcome.is_err());
        assert!(store.audit_entries().is_empty());
    }
}
