//! HMAC-signed JWT verification.
//!
//! Tokens are issued by the user service with a shared symmetric secret.
//! The verifier accepts only the HMAC family (`HS256`, `HS384`, `HS512`);
//! a token whose header names any other algorithm is rejected before the
//! signature is looked at, so a public key can never be used as an HMAC
//! secret.
//!
//! ## Example
//!
//! ```ignore
//! use sovmestno_auth::token::TokenVerifier;
//!
//! let verifier = TokenVerifier::new("shared-secret");
//! let identity = verifier.verify(&token)?;
//! println!("user {} ({})", identity.user_id(), identity.role());
//! ```

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use time::OffsetDateTime;

use crate::error::AuthError;
use crate::identity::{IdentityClaims, VerifiedIdentity};

/// Algorithms accepted by [`TokenVerifier`].
pub const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::InvalidSignature => Self::invalid_token("signature is invalid"),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::invalid_token("signing method is not accepted")
            }
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::invalid_token(format!("missing required claim: {claim}"))
            }
            ErrorKind::Json(e) => Self::invalid_token(format!("invalid claims: {e}")),
            ErrorKind::Base64(_) | ErrorKind::InvalidToken => {
                Self::invalid_token("token is malformed")
            }
            _ => Self::invalid_token(err.to_string()),
        }
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Verifies bearer tokens against a shared HMAC secret.
///
/// Cloning is cheap; the keys are shared.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Option<Arc<Keys>>,
}

impl TokenVerifier {
    /// Creates a verifier for `secret`.
    ///
    /// An empty secret produces a verifier that rejects every token with
    /// [`AuthError::Configuration`].
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Self { keys: None };
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.leeway = 0;
        // Expiry is compared below so that `exp == now` is already expired.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            keys: Some(Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
            })),
        }
    }

    /// Returns `true` if a signing secret is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    /// Verifies `token` against the current time.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, signed with a foreign
    /// algorithm or secret, expired, or carries invalid claims.
    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.verify_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Verifies `token` as of `now` (Unix seconds).
    ///
    /// # Errors
    /// See [`TokenVerifier::verify`].
    pub fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedIdentity, AuthError> {
        let keys = self.keys()?;

        let header = decode_header(token)?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            tracing::debug!(alg = ?header.alg, "Rejecting token with non-HMAC algorithm");
            return Err(AuthError::unsupported_algorithm(format!("{:?}", header.alg)));
        }

        let data = decode::<IdentityClaims>(token, &keys.decoding, &keys.validation)?;
        if data.claims.exp <= now {
            tracing::debug!(exp = data.claims.exp, now, "Token expired");
            return Err(AuthError::TokenExpired);
        }

        Ok(VerifiedIdentity::new(data.claims))
    }

    /// Signs `claims` with HS256.
    ///
    /// Token issuance belongs to the user service; this exists for tooling
    /// and tests that need tokens the gateway will accept.
    ///
    /// # Errors
    /// Returns an error if no secret is configured or encoding fails.
    pub fn sign(&self, claims: &IdentityClaims) -> Result<String, AuthError> {
        let keys = self.keys()?;
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(|e| AuthError::invalid_token(format!("failed to encode token: {e}")))
    }

    fn keys(&self) -> Result<&Keys, AuthError> {
        self.keys
            .as_deref()
            .ok_or_else(|| AuthError::configuration("authentication is not configured"))
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}
