//! Authentication
//!
//! JWT token service plus the axum extractor that turns a Bearer token
//! into a [`CurrentUser`].

pub mod extractor;
pub mod jwt;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
