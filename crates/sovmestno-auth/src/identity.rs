//! Identity claim set carried by bearer tokens.
//!
//! [`IdentityClaims`] is the decoded payload of a token issued by the user
//! service. [`VerifiedIdentity`] wraps a claim set whose signature and expiry
//! were checked by [`TokenVerifier`](crate::token::TokenVerifier); it has no
//! public constructor and cannot be deserialized, so request code can only
//! obtain one by verifying a token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Content creator looking for venues.
    Creator,
    /// Venue owner publishing events.
    Venue,
    /// Platform administrator.
    Admin,
}

impl Role {
    /// Returns the wire form used in tokens and the `X-User-Role` header.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Venue => "venue",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creator" => Ok(Self::Creator),
            "venue" => Ok(Self::Venue),
            "admin" => Ok(Self::Admin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Claims issued by the user service.
///
/// Field names match the JSON claim names in the token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject identifier.
    pub user_id: i64,

    /// Role of the subject.
    pub role: Role,

    /// Issued-at time (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration time (Unix seconds).
    pub exp: i64,
}

impl IdentityClaims {
    /// Creates claims issued at `now` and valid for `ttl_secs` seconds.
    #[must_use]
    pub fn new(user_id: i64, role: Role, now: i64, ttl_secs: i64) -> Self {
        Self {
            user_id,
            role,
            iat: Some(now),
            exp: now.saturating_add(ttl_secs),
        }
    }
}

/// Identity of a request whose bearer token passed verification.
///
/// This is the only source the gateway uses when telling downstream services
/// who the caller is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    claims: IdentityClaims,
}

impl VerifiedIdentity {
    pub(crate) fn new(claims: IdentityClaims) -> Self {
        Self { claims }
    }

    /// Subject identifier.
    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.claims.user_id
    }

    /// Role of the subject.
    #[must_use]
    pub fn role(&self) -> Role {
        self.claims.role
    }

    /// Issued-at time, if the token carried one.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.claims.iat
    }

    /// Expiration time (Unix seconds).
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }

    /// The verified claim set.
    #[must_use]
    pub fn claims(&self) -> &IdentityClaims {
        &self.claims
    }
}
