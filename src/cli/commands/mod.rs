mod account;
mod logs;
mod prompt;
mod users;

pub use account::{cmd_bootstrap_admin, cmd_login, cmd_passwd, cmd_register};
pub use logs::{LogsQuery, cmd_logs};
pub use users::{cmd_users_add, cmd_users_list, cmd_users_remove, cmd_users_role, cmd_users_unlock};
