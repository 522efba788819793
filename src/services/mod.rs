pub mod access_gate;
pub use access_gate::AccessGate;

pub mod audit;
pub use audit::{AuditError, AuditLog, SeaOrmAuditLog};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AccessError, AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;
