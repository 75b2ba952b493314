//! Shared axum infrastructure: error responses, health endpoints, and
//! server bootstrap with graceful shutdown.

pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;

pub use errors::{AppError, ErrorResponse};
pub use health::{health_router, HealthResponse};
pub use server::{create_app, create_router};
pub use shutdown::shutdown_signal;
