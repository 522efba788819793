use serde::Serialize;

use super::{Role, UserId};

/// The authenticated identity of the current process.
///
/// A `Session` is built from a stored user record but has no field that could
/// hold credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub locked: bool,
}

impl From<&Account> for Session {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            role: account.role,
            locked: account.locked,
        }
    }
}

/// A user record as shown to administrators (no password hash or salt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub locked: bool,
    pub login_attempts: i32,
    pub last_login_attempt: Option<String>,
    pub created_at: String,
    pub last_password_change: String,
}
