//! Domain service for authentication and user management.
//!
//! The only surface the UI consults for security decisions: registration,
//! login with lockout, the current session, role checks, and the
//! administrator operations on accounts and the audit trail.

use thiserror::Error;

use crate::db::AuditFilter;
use crate::domain::{Account, AuditEvent, Role, Session, UserId};

/// Outcome of a denied role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    /// No session; the UI must send the user back to login.
    #[error("Please login to access this feature")]
    NotAuthenticated,

    #[error("You do not have permission to access this feature (required role: {required})")]
    Forbidden { required: Role },
}

/// Errors specific to authentication operations.
///
/// Variants carry no lower-layer detail. Unknown users and wrong passwords
/// both surface as [`AuthError::InvalidCredentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid input")]
    InvalidInput,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked")]
    AccountLocked,

    #[error("Username already exists")]
    DuplicateUsername,

    /// Only returned to administrators acting on a named account.
    #[error("User not found")]
    UserNotFound,

    #[error("An administrator already exists")]
    AdministratorExists,

    #[error("Internal error")]
    Internal,

    #[error(transparent)]
    Access(#[from] AccessError),
}

impl AuthError {
    /// Uniform message suitable for display next to a login or register form.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Please check the username and password requirements",
            Self::InvalidCredentials => "Invalid credentials",
            Self::AccountLocked => "Account locked",
            Self::DuplicateUsername => "Username is already taken",
            Self::UserNotFound => "No such user",
            Self::AdministratorExists => "An administrator already exists",
            Self::Internal => "Something went wrong, please try again",
            Self::Access(AccessError::NotAuthenticated) => "Please login to access this feature",
            Self::Access(AccessError::Forbidden { .. }) => {
                "You do not have permission to access this feature"
            }
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates a `Client` account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] if either field fails validation and
    /// [`AuthError::DuplicateUsername`] if the name is taken.
    async fn register(&self, username: &str, password: &str) -> Result<(), AuthError>;

    /// Like [`AuthService::register`], but first checks that the confirmation
    /// matches the password.
    async fn register_with_confirmation(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), AuthError>;

    /// Verifies credentials, applies the lockout policy and, on success,
    /// makes the returned session current.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for unknown users and wrong
    /// passwords alike, and [`AuthError::AccountLocked`] for locked accounts.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session, AuthError>;

    /// Clears the current session.
    async fn logout(&self) -> Result<(), AuthError>;

    async fn current_session(&self) -> Option<Session>;

    /// Checks the current session against `required`.
    async fn require(&self, required: Role) -> Result<(), AccessError>;

    /// The whole audit trail, newest first. Administrator only.
    async fn audit_read(&self) -> Result<Vec<AuditEvent>, AuthError>;

    /// The audit trail narrowed by kind and actor. Administrator only.
    async fn audit_query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuthError>;

    /// One 1-based page of the filtered trail and the total page count.
    /// Administrator only.
    async fn audit_page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<AuditEvent>, u64), AuthError>;

    /// Changes the password of the current session's user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if `current_password` is wrong
    /// and [`AuthError::InvalidInput`] if the new password fails validation.
    /// A wrong current password counts as a failed login attempt; once the
    /// account locks, the session ends and [`AuthError::AccountLocked`] is
    /// returned.
    async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Creates the first administrator. Needs no session; refused once any
    /// administrator exists.
    async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<UserId, AuthError>;

    /// Creates an account with an explicit role. Administrator only.
    async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<UserId, AuthError>;

    /// All accounts without credential fields. Administrator only.
    async fn list_users(&self) -> Result<Vec<Account>, AuthError>;

    /// Deletes an account. Administrator only.
    async fn remove_user(&self, username: &str) -> Result<(), AuthError>;

    /// Clears a lockout and the attempt counter. Administrator only.
    async fn unlock_user(&self, username: &str) -> Result<(), AuthError>;

    /// Changes an account's role. Administrator only.
    async fn set_role(&self, username: &str, role: Role) -> Result<(), AuthError>;
}
