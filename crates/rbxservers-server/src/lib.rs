pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use error::ApiError;
pub use observability::init_tracing;
pub use server::{AppState, RbxServersServer, ServerBuilder, build_app, build_router};
