use serde::Serialize;
use std::fmt;

/// Severity of an audit event, stored verbatim in `logs.event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditKind {
    Info,
    Success,
    Warning,
    Error,
}

impl AuditKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Parses the stored column value. Unknown values are rejected.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(Self::Info),
            "SUCCESS" => Some(Self::Success),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of a security-relevant action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub id: i64,
    pub kind: AuditKind,
    /// Username, or `SYSTEM` for events with no attributable user.
    pub actor: String,
    pub description: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_kind_column_values() {
        for kind in [
            AuditKind::Info,
            AuditKind::Success,
            AuditKind::Warning,
            AuditKind::Error,
        ] {
            assert_eq!(AuditKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AuditKind::parse("warning"), None);
        assert_eq!(AuditKind::Warning.to_string(), "WARNING");
    }
}
