//! Bearer token verification and signing.

pub mod jwt;

pub use jwt::{HMAC_ALGORITHMS, TokenVerifier};
