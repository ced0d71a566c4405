//! Axum HTTP API server.
//!
//! This crate provides:
//! - Ticket authentication for every task route
//! - Upload, status and result download endpoints
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use auth::{TicketAuthenticator, TicketIdentity};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::TaskService;
pub use state::AppState;
