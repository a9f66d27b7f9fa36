//! `ldap3`-backed implementation of the backend traits.

use crate::backend::{DirectoryConnection, DirectoryConnector};
use crate::config::DirectoryConfig;
use crate::entry::{AttributeChange, AttributeSet, DirectoryEntry};
use crate::Result;
use async_trait::async_trait;
use dirgate_core::Error;
use ldap3::{LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};
use native_tls::{Certificate, TlsConnector};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

// RFC 4511 result codes the gateway distinguishes.
const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
const RC_UNDEFINED_ATTRIBUTE_TYPE: u32 = 17;
const RC_CONSTRAINT_VIOLATION: u32 = 19;
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const RC_INVALID_ATTRIBUTE_SYNTAX: u32 = 21;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_DN_SYNTAX: u32 = 34;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_INSUFFICIENT_ACCESS_RIGHTS: u32 = 50;
const RC_BUSY: u32 = 51;
const RC_UNAVAILABLE: u32 = 52;
const RC_UNWILLING_TO_PERFORM: u32 = 53;
const RC_NAMING_VIOLATION: u32 = 64;
const RC_OBJECT_CLASS_VIOLATION: u32 = 65;
const RC_NOT_ALLOWED_ON_NON_LEAF: u32 = 66;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

/// Connector that opens real LDAP connections.
pub struct LdapConnector {
    config: Arc<DirectoryConfig>,
}

impl LdapConnector {
    /// Creates a connector for the configured endpoint.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(|err| classify_error("connect", err))?;
        ldap3::drive!(conn);
        Ok(Box::new(LdapConnection {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct LdapConnection {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

impl LdapConnection {
    async fn run<F, T>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, LdapError>>,
    {
        timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| Error::DirectoryUnreachable(format!("{operation} timed out")))?
            .map_err(|err| classify_error(operation, err))
    }
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn simple_bind(&mut self, name: &str, password: &str) -> Result<()> {
        let mut ldap = self.inner.clone();
        let result = self.run("bind", ldap.simple_bind(name, password)).await?;
        result
            .success()
            .map_err(|err| classify_error("bind", err))?;
        Ok(())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<DirectoryEntry>> {
        let mut ldap = self.inner.clone();
        let result = self
            .run(
                "search",
                ldap.search(base_dn, Scope::Subtree, filter, attributes.to_vec()),
            )
            .await?;
        let (entries, _) = result
            .success()
            .map_err(|err| classify_error("search", err))?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(project_entry)
            .collect())
    }

    async fn modify(&mut self, change: &AttributeChange) -> Result<()> {
        let mods = vec![Mod::Replace(
            change.attribute.as_bytes().to_vec(),
            HashSet::from([change.value.as_bytes().to_vec()]),
        )];
        let mut ldap = self.inner.clone();
        let result = self.run("modify", ldap.modify(&change.dn, mods)).await?;
        result
            .success()
            .map_err(|err| classify_error("modify", err))?;
        Ok(())
    }

    async fn add(&mut self, dn: &str, attributes: &AttributeSet) -> Result<()> {
        let attrs = attributes
            .iter()
            .map(|(name, values)| {
                (
                    name.as_bytes().to_vec(),
                    values
                        .iter()
                        .map(|value| value.as_bytes().to_vec())
                        .collect::<HashSet<_>>(),
                )
            })
            .collect::<Vec<_>>();
        let mut ldap = self.inner.clone();
        let result = self.run("add", ldap.add(dn, attrs)).await?;
        result.success().map_err(|err| classify_error("add", err))?;
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let mut ldap = self.inner.clone();
        let result = self.run("delete", ldap.delete(dn)).await?;
        result
            .success()
            .map_err(|err| classify_error("delete", err))?;
        Ok(())
    }

    async fn rename(&mut self, dn: &str, new_rdn: &str, new_superior: &str) -> Result<()> {
        let mut ldap = self.inner.clone();
        let result = self
            .run(
                "rename",
                ldap.modifydn(dn, new_rdn, true, Some(new_superior)),
            )
            .await?;
        result
            .success()
            .map_err(|err| classify_error("rename", err))?;
        Ok(())
    }

    async fn unbind(&mut self) -> Result<()> {
        let mut ldap = self.inner.clone();
        self.run("unbind", ldap.unbind()).await
    }

    fn is_closed(&mut self) -> bool {
        self.inner.is_closed()
    }
}

/// Values that are not valid UTF-8 (`objectSid`, `objectGUID`, photos) arrive in `bin_attrs`.
fn project_entry(entry: SearchEntry) -> DirectoryEntry {
    DirectoryEntry {
        dn: entry.dn,
        attributes: entry.attrs,
        binary_attributes: entry.bin_attrs,
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read directory CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem).map_err(|err| {
            Error::ConfigError(format!("invalid directory CA certificate: {err}"))
        })?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to load directory CA certificate: {err}"))
            })?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

/// Translates an `ldap3` failure into the gateway taxonomy.
fn classify_error(operation: &str, err: LdapError) -> Error {
    match err {
        LdapError::LdapResult { result } => classify_result_code(operation, result.rc, &result.text),
        other => Error::DirectoryUnreachable(format!("{operation} failed: {other}")),
    }
}

pub(crate) fn classify_result_code(operation: &str, rc: u32, text: &str) -> Error {
    let message = if text.is_empty() {
        format!("{operation} failed with result code {rc}")
    } else {
        format!("{operation} failed with result code {rc}: {text}")
    };

    match rc {
        RC_NO_SUCH_OBJECT => Error::NotFound(message),
        RC_ENTRY_ALREADY_EXISTS if operation == "rename" => Error::TargetConflict(message),
        RC_ENTRY_ALREADY_EXISTS => Error::AlreadyExists(message),
        RC_UNDEFINED_ATTRIBUTE_TYPE
        | RC_INVALID_ATTRIBUTE_SYNTAX
        | RC_INVALID_DN_SYNTAX
        | RC_NAMING_VIOLATION
        | RC_OBJECT_CLASS_VIOLATION => Error::SchemaViolation(message),
        RC_INVALID_CREDENTIALS | RC_BUSY | RC_UNAVAILABLE => Error::DirectoryUnreachable(message),
        RC_NO_SUCH_ATTRIBUTE
        | RC_CONSTRAINT_VIOLATION
        | RC_ATTRIBUTE_OR_VALUE_EXISTS
        | RC_INSUFFICIENT_ACCESS_RIGHTS
        | RC_UNWILLING_TO_PERFORM
        | RC_NOT_ALLOWED_ON_NON_LEAF => Error::DirectoryRejected(message),
        _ => Error::DirectoryRejected(message),
    }
}
