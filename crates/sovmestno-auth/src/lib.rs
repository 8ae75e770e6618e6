//! # sovmestno-auth
//!
//! Bearer token verification for the Sovmestno API gateway.
//!
//! This crate provides:
//! - HMAC-family JWT verification with explicit expiry checks
//! - The identity claim set issued by the user service
//! - [`VerifiedIdentity`], the only trusted carrier of caller identity
//! - JSON `401` responses for authentication failures
//!
//! ## Modules
//!
//! - [`identity`] - Claim set, roles and the verified identity type
//! - [`token`] - Token verification and signing
//! - [`middleware`] - Bearer extraction and error responses
//! - [`error`] - Authentication error type

pub mod error;
pub mod identity;
pub mod middleware;
pub mod token;

pub use error::AuthError;
pub use identity::{IdentityClaims, ParseRoleError, Role, VerifiedIdentity};
pub use middleware::bearer_token;
pub use token::TokenVerifier;
