pub mod cashiers;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod tickets;
pub mod ws;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
