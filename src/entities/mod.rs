pub mod prelude;

pub mod logs;
pub mod users;
