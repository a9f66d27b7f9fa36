//! Runtime configuration for the directory session and verifier.

use crate::{dn::DistinguishedName, Result};
use dirgate_core::config::DEFAULT_INITIAL_PASSWORD;
use dirgate_core::{DirectorySettings, Error, ServiceIdentity};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Directory endpoint and behaviour settings. Immutable once built.
#[derive(Debug)]
pub struct DirectoryConfig {
    url: String,
    identity: ServiceIdentity,
    base_dn: DistinguishedName,
    users_container: DistinguishedName,
    principal_suffix: Option<String>,
    default_initial_password: SecretString,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
    connection_timeout_secs: u64,
    operation_timeout_secs: u64,
}

impl DirectoryConfig {
    /// Creates a configuration for the given endpoint.
    ///
    /// New users default to the `CN=Users` container under `base_dn`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(
        url: impl Into<String>,
        identity: ServiceIdentity,
        base_dn: DistinguishedName,
    ) -> Result<Self> {
        let url_string = url.into();
        Url::parse(&url_string)?;

        Ok(Self {
            url: url_string,
            identity,
            users_container: DistinguishedName::child(&base_dn, "CN", "Users"),
            base_dn,
            principal_suffix: None,
            default_initial_password: SecretString::from(DEFAULT_INITIAL_PASSWORD.to_string()),
            tls_verify: true,
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        })
    }

    /// Directory URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Privileged service identity.
    #[must_use]
    pub const fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Base DN for searches.
    #[must_use]
    pub const fn base_dn(&self) -> &DistinguishedName {
        &self.base_dn
    }

    /// Container new users are created in.
    #[must_use]
    pub const fn users_container(&self) -> &DistinguishedName {
        &self.users_container
    }

    /// Realm suffix appended to bare logon names, if any.
    #[must_use]
    pub fn principal_suffix(&self) -> Option<&str> {
        self.principal_suffix.as_deref()
    }

    /// Placeholder password for accounts created without one.
    #[must_use]
    pub fn default_initial_password(&self) -> &str {
        self.default_initial_password.expose_secret()
    }

    /// Whether TLS certificates are verified.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Per-operation timeout.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Overrides the users container.
    #[must_use]
    pub fn with_users_container(mut self, dn: DistinguishedName) -> Self {
        self.users_container = dn;
        self
    }

    /// Sets the realm suffix, e.g. `@corp.example.com`. A missing leading `@` is added.
    #[must_use]
    pub fn with_principal_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.principal_suffix = Some(if suffix.starts_with('@') {
            suffix
        } else {
            format!("@{suffix}")
        });
        self
    }

    /// Overrides the placeholder password for new accounts.
    #[must_use]
    pub fn with_default_initial_password(mut self, password: impl Into<String>) -> Self {
        self.default_initial_password = SecretString::from(password.into());
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}

impl TryFrom<DirectorySettings> for DirectoryConfig {
    type Error = Error;

    fn try_from(settings: DirectorySettings) -> Result<Self> {
        settings.parse_url()?;
        let base_dn = DistinguishedName::parse(&settings.base_dn)?;
        let identity = ServiceIdentity::new(settings.bind_name, settings.bind_password);

        let mut config = Self::new(settings.url, identity, base_dn)?
            .with_default_initial_password(settings.default_initial_password)
            .with_tls_verification(settings.tls_verify)
            .with_connection_timeout_secs(settings.connection_timeout_secs)
            .with_operation_timeout_secs(settings.operation_timeout_secs);

        if let Some(container) = settings.users_container {
            config = config.with_users_container(DistinguishedName::parse(container)?);
        }
        if let Some(suffix) = settings.principal_suffix {
            config = config.with_principal_suffix(suffix);
        }
        if let Some(path) = settings.tls_ca_cert {
            config = config.with_tls_ca_cert(path);
        }

        Ok(config)
    }
}
