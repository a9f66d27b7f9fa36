//! Configuration structures for the directory gateway.
//!
//! [`DirectorySettings`] is the flat, serializable form of the gateway configuration. It can be
//! deserialized from a config file or assembled from `AD_*` environment variables, and is
//! validated before use. The directory crate turns it into its runtime configuration.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Environment variable holding the directory URL.
pub const ENV_URL: &str = "AD_URL";
/// Environment variable holding the base distinguished name.
pub const ENV_BASE_DN: &str = "AD_DN";
/// Environment variable holding the service bind name.
pub const ENV_BIND_NAME: &str = "AD_USER";
/// Environment variable holding the service bind password.
pub const ENV_BIND_PASSWORD: &str = "AD_PASSWORD";
/// Environment variable holding the realm suffix appended to bare logon names.
pub const ENV_PRINCIPAL_SUFFIX: &str = "AD_PRINCIPAL_SUFFIX";
/// Environment variable overriding the container new users are created in.
pub const ENV_USERS_CONTAINER: &str = "AD_USERS_CONTAINER";
/// Environment variable overriding the placeholder password for new users.
pub const ENV_DEFAULT_PASSWORD: &str = "AD_DEFAULT_PASSWORD";
/// Environment variable toggling TLS certificate verification.
pub const ENV_TLS_VERIFY: &str = "AD_TLS_VERIFY";
/// Environment variable pointing at a PEM CA certificate.
pub const ENV_CA_CERT: &str = "AD_CA_CERT";
/// Environment variable overriding the connection timeout.
pub const ENV_CONNECT_TIMEOUT: &str = "AD_CONNECT_TIMEOUT_SECS";
/// Environment variable overriding the per-operation timeout.
pub const ENV_OPERATION_TIMEOUT: &str = "AD_OPERATION_TIMEOUT_SECS";

/// Placeholder password assigned to new accounts when none is supplied.
pub const DEFAULT_INITIAL_PASSWORD: &str = "changemepass";

/// Flat directory gateway settings.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct DirectorySettings {
    /// Directory URL (`ldap://` or `ldaps://`)
    #[validate(url)]
    pub url: String,

    /// Base distinguished name searches run under
    #[validate(length(min = 1))]
    pub base_dn: String,

    /// Service identity bind name
    #[validate(length(min = 1))]
    pub bind_name: String,

    /// Service identity password
    #[serde(skip_serializing, default)]
    #[validate(length(min = 1))]
    pub bind_password: String,

    /// Realm suffix appended to bare logon names during verification (e.g. `@corp.example.com`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_suffix: Option<String>,

    /// Container new users are created in (defaults to `CN=Users,<base_dn>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_container: Option<String>,

    /// Placeholder password for new accounts
    #[serde(skip_serializing, default = "default_initial_password")]
    pub default_initial_password: String,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to custom CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_initial_password() -> String {
    DEFAULT_INITIAL_PASSWORD.to_string()
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    10
}

impl DirectorySettings {
    /// Create settings with required parameters and defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(
        url: impl Into<String>,
        base_dn: impl Into<String>,
        bind_name: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Result<Self, Error> {
        let settings = Self {
            url: url.into(),
            base_dn: base_dn.into(),
            bind_name: bind_name.into(),
            bind_password: bind_password.into(),
            principal_suffix: None,
            users_container: None,
            default_initial_password: default_initial_password(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            connection_timeout_secs: default_timeout_secs(),
            operation_timeout_secs: default_timeout_secs(),
        };

        settings
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(settings)
    }

    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup (environment, secrets store, test map).
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::ConfigError(format!("missing required variable {key}")))
        };

        let mut settings = Self::new(
            required(ENV_URL)?,
            required(ENV_BASE_DN)?,
            required(ENV_BIND_NAME)?,
            required(ENV_BIND_PASSWORD)?,
        )?;

        settings.principal_suffix = lookup(ENV_PRINCIPAL_SUFFIX).filter(|v| !v.is_empty());
        settings.users_container = lookup(ENV_USERS_CONTAINER).filter(|v| !v.is_empty());
        if let Some(password) = lookup(ENV_DEFAULT_PASSWORD).filter(|v| !v.is_empty()) {
            settings.default_initial_password = password;
        }
        if let Some(raw) = lookup(ENV_TLS_VERIFY) {
            settings.tls_verify = parse_bool(ENV_TLS_VERIFY, &raw)?;
        }
        settings.tls_ca_cert = lookup(ENV_CA_CERT)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT) {
            settings.connection_timeout_secs = parse_secs(ENV_CONNECT_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_OPERATION_TIMEOUT) {
            settings.operation_timeout_secs = parse_secs(ENV_OPERATION_TIMEOUT, &raw)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Set the realm suffix for bare logon names.
    #[must_use]
    pub fn with_principal_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.principal_suffix = Some(suffix.into());
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Get the connection timeout as a Duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get the operation timeout as a Duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Parse and validate the directory URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or uses a non-LDAP scheme.
    pub fn parse_url(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ldap" | "ldaps" | "ldapi" => Ok(url),
            other => Err(Error::ConfigError(format!(
                "unsupported directory URL scheme `{other}`"
            ))),
        }
    }
}

impl fmt::Debug for DirectorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySettings")
            .field("url", &self.url)
            .field("base_dn", &self.base_dn)
            .field("bind_name", &self.bind_name)
            .field("bind_password", &"[REDACTED]")
            .field("principal_suffix", &self.principal_suffix)
            .field("users_container", &self.users_container)
            .field("tls_verify", &self.tls_verify)
            .field("tls_ca_cert", &self.tls_ca_cert)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .finish_non_exhaustive()
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::ConfigError(format!(
            "{key} must be a boolean, got `{raw}`"
        ))),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("{key} must be a number of seconds, got `{raw}`")))
}
