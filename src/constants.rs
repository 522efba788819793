/// Actor recorded on audit events that are not attributable to a user.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

pub mod lockout {

    /// Consecutive failed logins that lock an account.
    pub const THRESHOLD: i32 = 3;
}

pub mod credentials {

    pub const SALT_LEN: usize = 16;

    pub const USERNAME_MIN_LEN: usize = 3;

    pub const USERNAME_MAX_LEN: usize = 20;

    pub const PASSWORD_MIN_LEN: usize = 8;
}
