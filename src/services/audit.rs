//! Append-only audit trail of security events.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::{AuditFilter, Store, StoreError};
use crate::domain::{AuditEvent, AuditKind, timestamp_now};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit write failed: {0}")]
    Write(#[source] StoreError),

    #[error("Audit read failed: {0}")]
    Read(#[source] StoreError),
}

/// Durable sink for audit events.
///
/// `append` returns only after the event is committed; callers must not
/// report an outcome whose audit write failed.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(
        &self,
        kind: AuditKind,
        actor: &str,
        description: &str,
        timestamp: &str,
    ) -> Result<(), AuditError>;

    /// Events matching `filter`, newest first.
    async fn read(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError>;

    /// One 1-based page of `read(filter)` and the total page count.
    async fn read_page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<AuditEvent>, u64), AuditError>;

    /// Appends an event stamped with the current time.
    async fn record(
        &self,
        kind: AuditKind,
        actor: &str,
        description: &str,
    ) -> Result<(), AuditError> {
        self.append(kind, actor, description, &timestamp_now()).await
    }
}

/// `SeaORM` implementation writing to the `logs` table.
///
/// Every event is mirrored to `tracing` at a level matching its kind.
pub struct SeaOrmAuditLog {
    store: Store,
}

impl SeaOrmAuditLog {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditLog for SeaOrmAuditLog {
    async fn append(
        &self,
        kind: AuditKind,
        actor: &str,
        description: &str,
        timestamp: &str,
    ) -> Result<(), AuditError> {
        self.store
            .add_audit_event(kind, actor, description, timestamp)
            .await
            .map_err(AuditError::Write)?;

        match kind {
            AuditKind::Info | AuditKind::Success => {
                info!(target: "audit", kind = %kind, actor, "{description}");
            }
            AuditKind::Warning => warn!(target: "audit", kind = %kind, actor, "{description}"),
            AuditKind::Error => error!(target: "audit", kind = %kind, actor, "{description}"),
        }

        Ok(())
    }

    async fn read(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.store
            .get_audit_events(filter)
            .await
            .map_err(AuditError::Read)
    }

    async fn read_page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<AuditEvent>, u64), AuditError> {
        self.store
            .get_audit_page(filter, page, page_size)
            .await
            .map_err(AuditError::Read)
    }
}
