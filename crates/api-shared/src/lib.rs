//! # API Shared
//!
//! Shared utilities and definitions for SPMR APIs.
//!
//! Contains:
//! - JSON wire types with OpenAPI schemas (`wire` module)
//! - Shared services like `HealthService`
//! - Bearer-token authentication and role checks
//!
//! Used by `api-rest` and the `spmr` CLI.

pub mod auth;
pub mod health;
pub mod wire;

pub use auth::{authorize, AuthError, Claims, JwtKeys, Role};
pub use health::HealthService;
pub use wire::*;
