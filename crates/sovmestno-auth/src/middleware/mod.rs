//! HTTP helpers for bearer authentication.
//!
//! - Bearer credential extraction from the `Authorization` header
//! - JSON `401` rendering for [`AuthError`](crate::AuthError)

pub mod auth;
pub mod error;

pub use auth::bearer_token;
