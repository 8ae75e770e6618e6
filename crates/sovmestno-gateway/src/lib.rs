pub mod config;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ServiceConfig};
pub use gateway::{GatewayError, GatewayRouter, HealthAggregator, HealthResponse, PublicRoutes};
pub use observability::{init_tracing, shutdown_tracing};
pub use server::{GatewayServer, GatewayState, ServerBuilder, build_app, serve_with_grace};
