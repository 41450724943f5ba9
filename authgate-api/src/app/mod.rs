mod error;
mod extract;
mod handlers;
mod middleware;
mod router;
mod state;


pub use middleware::ADMIN_ROLE;
pub use router::app_router;
pub use state::AppState;
