use std::sync::Arc;
use tracing::error;

use crate::domain::{AuditKind, Role, Session};
use crate::services::audit::AuditLog;
use crate::services::auth_service::AccessError;

/// Decides whether a session may enter an area that needs `required`.
pub struct AccessGate {
    audit: Arc<dyn AuditLog>,
}

impl AccessGate {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditLog>) -> Self {
        Self { audit }
    }

    /// Denials for insufficient role are audited. A failed audit write does
    /// not turn a denial into an allow.
    pub async fn require(&self, session: Option<&Session>, required: Role) -> Result<(), AccessError> {
        let Some(session) = session else {
            return Err(AccessError::NotAuthenticated);
        };

        if session.role.satisfies(required) {
            return Ok(());
        }

        let description = format!("Unauthorized access attempt to role {}", required.level());
        if let Err(e) = self
            .audit
            .record(AuditKind::Warning, &session.username, &description)
            .await
        {
            error!(error = %e, user = %session.username, "Failed to audit access denial");
        }

        Err(AccessError::Forbidden { required })
    }
}
