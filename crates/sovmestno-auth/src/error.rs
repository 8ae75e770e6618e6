//! Authentication error types.
//!
//! Every variant is rendered as `401 Unauthorized` by the `IntoResponse`
//! implementation in [`crate::middleware::error`].

/// Errors raised while admitting a request with a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header was sent to a protected route.
    #[error("missing token")]
    MissingCredential,

    /// The credential is malformed or its signature does not verify.
    #[error("{message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token's `exp` is at or before the current time.
    #[error("token has expired")]
    TokenExpired,

    /// The token is signed with an algorithm outside the HMAC family.
    #[error("unexpected signing method: {algorithm}")]
    UnsupportedAlgorithm {
        /// The `alg` value from the token header.
        algorithm: String,
    },

    /// The verifier has no signing secret; protected routes fail closed.
    #[error("{message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Machine-readable reason, reported in the response body and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidToken { .. } => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            Self::Configuration { .. } => "not_configured",
        }
    }
}
