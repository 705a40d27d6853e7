//! # API Shared
//!
//! Shared definitions for the Carebook APIs.
//!
//! Contains:
//! - Request and response DTOs (`dto` module), documented with `utoipa`
//! - Shared services like `HealthService`
//! - Bearer token handling (usable by the REST server and the CLI)
//!
//! Used by `api-rest` and `cli` for common functionality.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{decode_token, issue_token, Claims, TokenError};
pub use health::{HealthRes, HealthService};
