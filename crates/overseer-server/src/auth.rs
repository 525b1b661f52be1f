// crates/overseer-server/src/auth.rs
// ============================================================================
// Module: Server Auth
// Description: API user login and sandbox token issuance over HS256 JWTs.
// Purpose: Authenticate operators and adapters without holding sessions.
// Dependencies: jsonwebtoken, sha2, overseer-config, overseer-core
// ============================================================================

//! ## Overview
//! Operators log in with configured credentials and receive an HS256
//! access/refresh token pair. Adapters receive sandbox-scoped tokens at
//! spawn and renew them through `/api/token/renew`. One shared secret signs
//! everything; the token `kind` claim separates the three audiences.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use overseer_config::AuthSection;
use overseer_core::AgentId;
use overseer_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Auth failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling; the HTTP layer maps
///   every variant to 401.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Token failed verification or expired.
    #[error("invalid token")]
    InvalidToken,
    /// Token is valid but of the wrong kind for the operation.
    #[error("wrong token kind: {0}")]
    WrongKind(String),
    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Token audience kind.
///
/// # Invariants
/// - Variants are stable inside issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Operator API access token.
    Access,
    /// Operator refresh token.
    Refresh,
    /// Sandbox-scoped adapter token.
    Sandbox,
}

/// JWT claims issued by the server.
///
/// # Invariants
/// - `sub` is a username for operator tokens and an agent id for sandbox
///   tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username or agent id).
    pub sub: String,
    /// Role label.
    pub role: String,
    /// Token kind.
    pub kind: TokenKind,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Issued-at (unix seconds).
    pub iat: i64,
}

/// Issued operator token pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Access token expiry (unix ms).
    pub expires_at: i64,
}

// ============================================================================
// SECTION: Auth Service
// ============================================================================

/// Stateless token service over the configured secret and users.
///
/// # Invariants
/// - Issued tokens always carry a `kind` claim; verification checks it.
pub struct AuthService {
    /// Auth configuration (users and lifetimes).
    config: AuthSection,
    /// Signing key.
    encoding: EncodingKey,
    /// Verification key.
    decoding: DecodingKey,
}

impl AuthService {
    /// Creates the service from the auth configuration.
    #[must_use]
    pub fn new(config: AuthSection) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding,
            decoding,
        }
    }

    /// Signs a claims payload.
    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
            .map_err(|error| AuthError::Signing(error.to_string()))
    }

    /// Builds claims expiring `ttl_minutes` from now.
    fn claims(sub: &str, role: &str, kind: TokenKind, ttl_minutes: u64) -> Claims {
        let now = Timestamp::now().as_unix_millis() / 1_000;
        let ttl = i64::try_from(ttl_minutes).unwrap_or(i64::MAX).saturating_mul(60);
        Claims {
            sub: sub.to_string(),
            role: role.to_string(),
            kind,
            exp: now.saturating_add(ttl),
            iat: now,
        }
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] on signature or expiry failure.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Verifies a token and checks its kind.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] on verification failure or kind mismatch.
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if claims.kind != kind {
            return Err(AuthError::WrongKind(format!("{:?}", claims.kind)));
        }
        Ok(claims)
    }

    /// Authenticates a user and issues a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on unknown user or wrong
    /// password.
    pub fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let digest = format!("{:x}", Sha256::digest(password.as_bytes()));
        let user = self
            .config
            .users
            .iter()
            .find(|user| user.username == username && user.password_sha256 == digest)
            .ok_or(AuthError::InvalidCredentials)?;
        self.issue_pair(&user.username, &user.role)
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the refresh token is invalid.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.verify_kind(refresh_token, TokenKind::Refresh)?;
        self.issue_pair(&claims.sub, &claims.role)
    }

    /// Issues an access/refresh pair for a subject.
    fn issue_pair(&self, sub: &str, role: &str) -> Result<TokenPair, AuthError> {
        let access = Self::claims(sub, role, TokenKind::Access, self.config.access_ttl_minutes);
        let refresh = Self::claims(sub, role, TokenKind::Refresh, self.config.refresh_ttl_minutes);
        Ok(TokenPair {
            expires_at: access.exp.saturating_mul(1_000),
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
        })
    }

    /// Issues a sandbox token for an agent. Returns `(token, expiry_ms)`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] when signing fails.
    pub fn issue_sandbox(&self, agent_id: &AgentId) -> Result<(String, i64), AuthError> {
        let claims = Self::claims(
            agent_id.as_str(),
            "sandbox",
            TokenKind::Sandbox,
            self.config.sandbox_ttl_minutes,
        );
        let expires_at = claims.exp.saturating_mul(1_000);
        Ok((self.sign(&claims)?, expires_at))
    }

    /// Renews a sandbox token presented by an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the presented token is not a valid
    /// sandbox token.
    pub fn renew_sandbox(&self, token: &str) -> Result<(String, i64), AuthError> {
        let claims = self.verify_kind(token, TokenKind::Sandbox)?;
        self.issue_sandbox(&AgentId::new(claims.sub))
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").field("users", &self.config.users.len()).finish_non_exhaustive()
    }
}
