//! Credential types.
//!
//! [`ServiceIdentity`] is the privileged account the gateway binds with for directory
//! operations. [`Credential`] is an end-user identifier/secret pair that only lives for the
//! duration of a single verification call.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// Privileged directory identity used by the long-lived session.
#[derive(Debug, Serialize)]
pub struct ServiceIdentity {
    /// Bind name (DN, UPN or down-level logon name)
    pub bind_name: String,

    /// Bind password
    #[serde(skip_serializing)]
    bind_password: SecretString,
}

impl ServiceIdentity {
    /// Create a new service identity.
    ///
    /// # Arguments
    ///
    /// * `bind_name` - The account the gateway binds as
    /// * `bind_password` - The account password
    #[must_use]
    pub fn new(bind_name: impl Into<String>, bind_password: impl Into<String>) -> Self {
        Self {
            bind_name: bind_name.into(),
            bind_password: SecretString::from(bind_password.into()),
        }
    }

    /// Get the bind name.
    #[must_use]
    pub fn bind_name(&self) -> &str {
        &self.bind_name
    }

    /// Get the bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }
}

/// End-user credentials presented for verification.
#[derive(Debug)]
pub struct Credential {
    identifier: String,
    secret: SecretString,
}

impl Credential {
    /// Create a credential pair.
    #[must_use]
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// The caller-supplied identifier, before principal normalization.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    /// True when either half is blank. Such credentials are never sent to the directory.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.identifier.trim().is_empty() || self.secret.expose_secret().is_empty()
    }
}
