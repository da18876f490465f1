// 🔐 Login Gate - operator authentication behind a swappable policy
//
// The shipped policy compares against one configured username and an Argon2 password
// hash in PHC form. Deployments with a real identity system plug in an IdentityProvider
// through ExternalIdentityPolicy; callers only see AuthenticationPolicy.

use crate::config::AppConfig;
use crate::error::AuthError;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// OPERATOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub username: String,
    /// Which policy admitted this operator
    pub authenticated_by: String,
}

// ============================================================================
// PASSWORD HASHING
// ============================================================================

/// Argon2id PHC string with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// False for a wrong password; Err only when `stored` is not a PHC string.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// ============================================================================
// POLICY TRAIT
// ============================================================================

pub trait AuthenticationPolicy: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Result<Operator, AuthError>;

    fn name(&self) -> &str;
}

/// Single administrator account from configuration.
pub struct FixedCredentialPolicy {
    username: String,
    password_hash: String,
}

impl FixedCredentialPolicy {
    pub fn new(username: &str, password: &str) -> Result<Self, AuthError> {
        Ok(FixedCredentialPolicy {
            username: username.to_string(),
            password_hash: hash_password(password)?,
        })
    }

    /// Build from an already-hashed password (Argon2 PHC string), rejected up front if malformed.
    pub fn from_hash(username: &str, password_hash: &str) -> Result<Self, AuthError> {
        PasswordHash::new(password_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        Ok(FixedCredentialPolicy {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    /// The stored hash wins over the plain password when both are configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        match &config.admin_password_hash {
            Some(hash) => Self::from_hash(&config.admin_username, hash),
            None => Self::new(&config.admin_username, &config.admin_password),
        }
    }
}

impl AuthenticationPolicy for FixedCredentialPolicy {
    fn authenticate(&self, username: &str, password: &str) -> Result<Operator, AuthError> {
        // Username is not revealed separately from the password
        let user_ok = username.trim() == self.username;
        let pass_ok = verify_password(password, &self.password_hash)?;

        if user_ok && pass_ok {
            Ok(Operator {
                username: self.username.clone(),
                authenticated_by: self.name().to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    fn name(&self) -> &str {
        "fixed-credential"
    }
}

// ============================================================================
// EXTERNAL IDENTITY
// ============================================================================

/// Anything that can check a username/password pair elsewhere (directory, SSO bridge).
pub trait IdentityProvider: Send + Sync {
    /// Ok(true) accepted, Ok(false) rejected, Err when the provider itself failed
    fn verify(&self, username: &str, password: &str) -> Result<bool, String>;

    fn provider_name(&self) -> &str;
}

pub struct ExternalIdentityPolicy<P: IdentityProvider> {
    provider: P,
}

impl<P: IdentityProvider> ExternalIdentityPolicy<P> {
    pub fn new(provider: P) -> Self {
        ExternalIdentityPolicy { provider }
    }
}

impl<P: IdentityProvider> AuthenticationPolicy for ExternalIdentityPolicy<P> {
    fn authenticate(&self, username: &str, password: &str) -> Result<Operator, AuthError> {
        match self.provider.verify(username, password) {
            Ok(true) => Ok(Operator {
                username: username.trim().to_string(),
                authenticated_by: self.provider.provider_name().to_string(),
            }),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => Err(AuthError::Provider(e)),
        }
    }

    fn name(&self) -> &str {
        self.provider.provider_name()
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Logged-in state for one interactive front end. No expiry.
pub struct Session {
    policy: Box<dyn AuthenticationPolicy>,
    operator: Option<Operator>,
}

impl Session {
    pub fn new(policy: Box<dyn AuthenticationPolicy>) -> Self {
        Session {
            policy,
            operator: None,
        }
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<&Operator, AuthError> {
        match self.policy.authenticate(username, password) {
            Ok(operator) => {
                info!(user = %operator.username, policy = self.policy.name(), "operator logged in");
                let operator: &Operator = self.operator.insert(operator);
                Ok(operator)
            }
            Err(e) => {
                warn!(user = %username.trim(), error = %e, "login rejected");
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        if let Some(op) = self.operator.take() {
            info!(user = %op.username, "operator logged out");
        }
    }

    pub fn operator(&self) -> Option<&Operator> {
        self.operator.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.operator.is_some()
    }

    /// Operator or NotAuthenticated, for gating operations
    pub fn require(&self) -> Result<&Operator, AuthError> {
        self.operator.as_ref().ok_or(AuthError::NotAuthenticated)
    }
}
