//! Tenant credentials and tenant identity.
//!
//! A tenant is one `(host, login, password)` triple. Host and login compare
//! case-insensitively; the password compares exactly. The password is held
//! as a [`SecretString`] and never appears in `Debug` output or logs.

use crate::{digest_parts, Digest32};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Connection credentials for one remote system account.
pub struct Credentials {
    host: String,
    login: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(host: impl Into<String>, login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            login: login.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    /// Expose the password. Only remote client implementations should call this.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Whether `other` names the same tenant.
    pub fn matches(&self, other: &Credentials) -> bool {
        self.host.eq_ignore_ascii_case(&other.host)
            && self.login.eq_ignore_ascii_case(&other.login)
            && self.password.expose_secret() == other.password.expose_secret()
    }

    /// Hashable identity of this tenant.
    pub fn key(&self) -> CredentialKey {
        CredentialKey {
            host: self.host.to_ascii_lowercase(),
            login: self.login.to_ascii_lowercase(),
            password_digest: digest_parts([self.password.expose_secret().as_bytes()]),
        }
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            login: self.login.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Normalized tenant identity used as the registry key.
///
/// Host and login are lowercased; the password is reduced to a SHA-256 digest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    host: String,
    login: String,
    password_digest: Digest32,
}

impl CredentialKey {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn login(&self) -> &str {
        &self.login
    }
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialKey({}@{})", self.login, self.host)
    }
}
