mod auth;
mod health;
mod users;

pub use auth::{login, refresh};
pub use health::{handler_404, health};
pub use users::{change_password, get_user, register, set_user_status};
