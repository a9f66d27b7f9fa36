//! Privileged directory session.
//!
//! A single connection bound with the service identity, shared by all operational callers.
//! Requests are serialized through an async mutex, so at most one request/response pair is in
//! flight on the connection. Binding happens under the same mutex: concurrent callers that find
//! the session unbound wait for the first caller's bind and then reuse its connection.

use crate::backend::{DirectoryConnection, DirectoryConnector};
use crate::config::DirectoryConfig;
use crate::dn::DistinguishedName;
use crate::entry::{AttributeChange, AttributeSet, AttributeValue, DirectoryEntry};
use crate::Result;
use dirgate_core::Error;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Attributes requested on every search.
const ALL_ATTRIBUTES: &[&str] = &["*"];

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection has been established yet.
    Unbound,
    /// A connection is bound with the service identity.
    Bound,
    /// The last request failed at the transport level; the next request rebinds.
    Broken,
}

enum Connection {
    Unbound,
    Bound(Box<dyn DirectoryConnection>),
    Broken,
}

impl Connection {
    fn state(&self) -> SessionState {
        match self {
            Self::Unbound => SessionState::Unbound,
            Self::Bound(_) => SessionState::Bound,
            Self::Broken => SessionState::Broken,
        }
    }
}

/// Long-lived privileged session.
pub struct DirectorySession {
    config: Arc<DirectoryConfig>,
    connector: Arc<dyn DirectoryConnector>,
    connection: Mutex<Connection>,
}

impl DirectorySession {
    /// Creates an unbound session. Nothing is opened until the first request or [`bind`].
    ///
    /// [`bind`]: DirectorySession::bind
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self {
            config,
            connector,
            connection: Mutex::new(Connection::Unbound),
        }
    }

    /// Configuration the session was built with.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Current connection state.
    pub async fn state(&self) -> SessionState {
        self.connection.lock().await.state()
    }

    /// Establishes the privileged connection, or does nothing if it is already bound.
    ///
    /// A broken connection, or one the server has closed while idle, is dropped and replaced.
    /// Safe to call before every operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryUnreachable`] if the directory cannot be reached or rejects the
    /// service identity.
    pub async fn bind(&self) -> Result<()> {
        self.lock_bound().await.map(drop)
    }

    /// Subtree search under `base_dn`, or under the configured base DN when `None`.
    ///
    /// Returns an empty vector when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the search base itself does not exist, or
    /// [`Error::DirectoryUnreachable`] on transport failure.
    pub async fn search(
        &self,
        filter: &str,
        base_dn: Option<&DistinguishedName>,
    ) -> Result<Vec<DirectoryEntry>> {
        let base = base_dn.unwrap_or_else(|| self.config.base_dn()).as_str();
        let mut guard = self.lock_bound().await?;
        let mut connection = Self::checkout(&mut guard)?;
        let result = self
            .with_timeout("search", connection.search(base, filter, ALL_ATTRIBUTES))
            .await;
        Self::checkin(&mut guard, connection, "search", &result);
        let entries = result?;
        debug!(filter, base, matches = entries.len(), "directory search");
        Ok(entries)
    }

    /// First entry matching `filter`.
    ///
    /// When several entries match, the first one returned by the server wins; callers that
    /// need uniqueness must use a filter selective enough to guarantee it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when nothing matches.
    pub async fn search_unique(
        &self,
        filter: &str,
        base_dn: Option<&DistinguishedName>,
    ) -> Result<DirectoryEntry> {
        let entries = self.search(filter, base_dn).await?;
        if entries.len() > 1 {
            debug!(filter, matches = entries.len(), "ambiguous lookup, using first match");
        }
        entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no directory entry matches `{filter}`")))
    }

    /// Replaces `attribute` on the entry with a single value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist and
    /// [`Error::DirectoryRejected`] if the server refuses the value.
    pub async fn modify(
        &self,
        dn: &str,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<()> {
        let change = AttributeChange::replace(dn, attribute, value);
        let mut guard = self.lock_bound().await?;
        let mut connection = Self::checkout(&mut guard)?;
        let result = self
            .with_timeout("modify", connection.modify(&change))
            .await;
        Self::checkin(&mut guard, connection, "modify", &result);
        result?;
        info!(dn, attribute, "directory entry modified");
        Ok(())
    }

    /// Creates an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if the attribute set has no `objectClass` or carries
    /// valueless attributes (checked before contacting the server) or the server reports a
    /// schema problem, and [`Error::AlreadyExists`] if the DN is taken.
    pub async fn add(&self, dn: &DistinguishedName, attributes: &AttributeSet) -> Result<()> {
        if attributes.get("objectClass").map_or(true, <[_]>::is_empty) {
            return Err(Error::SchemaViolation(format!(
                "entry `{dn}` has no objectClass"
            )));
        }
        if let Some(name) = attributes.empty_attributes().next() {
            return Err(Error::SchemaViolation(format!(
                "attribute `{name}` of `{dn}` has no value"
            )));
        }

        let mut guard = self.lock_bound().await?;
        let mut connection = Self::checkout(&mut guard)?;
        let result = self
            .with_timeout("add", connection.add(dn.as_str(), attributes))
            .await;
        Self::checkin(&mut guard, connection, "add", &result);
        result?;
        info!(dn = dn.as_str(), "directory entry created");
        Ok(())
    }

    /// Deletes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist.
    pub async fn delete(&self, dn: &str) -> Result<()> {
        let mut guard = self.lock_bound().await?;
        let mut connection = Self::checkout(&mut guard)?;
        let result = self.with_timeout("delete", connection.delete(dn)).await;
        Self::checkin(&mut guard, connection, "delete", &result);
        result?;
        info!(dn, "directory entry deleted");
        Ok(())
    }

    /// Moves or renames an entry to `new_dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist, [`Error::TargetConflict`] if
    /// `new_dn` is occupied and [`Error::InvalidRequest`] if `new_dn` has no parent.
    pub async fn rename(&self, dn: &DistinguishedName, new_dn: &DistinguishedName) -> Result<()> {
        let new_superior = new_dn.parent().ok_or_else(|| {
            Error::InvalidRequest(format!("`{new_dn}` has no parent to move under"))
        })?;
        let new_rdn = new_dn.leading_rdn();

        let mut guard = self.lock_bound().await?;
        let mut connection = Self::checkout(&mut guard)?;
        let result = self
            .with_timeout(
                "rename",
                connection.rename(dn.as_str(), &new_rdn, new_superior.as_str()),
            )
            .await;
        Self::checkin(&mut guard, connection, "rename", &result);
        result.map_err(|err| match err {
            Error::AlreadyExists(message) => Error::TargetConflict(message),
            other => other,
        })?;
        info!(from = dn.as_str(), to = new_dn.as_str(), "directory entry moved");
        Ok(())
    }

    /// Locks the connection, binding first if necessary. A bound connection the server has
    /// since closed is replaced before it is handed out.
    async fn lock_bound(&self) -> Result<MutexGuard<'_, Connection>> {
        let mut guard = self.connection.lock().await;
        if let Connection::Bound(connection) = &mut *guard {
            if connection.is_closed() {
                warn!("privileged directory connection closed by the server, rebinding");
                *guard = Connection::Unbound;
            }
        }
        if !matches!(*guard, Connection::Bound(_)) {
            if matches!(*guard, Connection::Broken) {
                warn!("privileged directory connection broken, rebinding");
            }
            *guard = Connection::Bound(self.establish().await?);
            info!(url = self.config.url(), "privileged directory session bound");
        }
        Ok(guard)
    }

    /// Connect runs under the connection timeout, the service bind under the operation timeout.
    async fn establish(&self) -> Result<Box<dyn DirectoryConnection>> {
        let identity = self.config.identity();
        let mut connection = timeout(self.config.connection_timeout(), self.connector.connect())
            .await
            .map_err(|_| Error::DirectoryUnreachable("connect timed out".to_string()))??;
        self.with_timeout(
            "bind",
            connection.simple_bind(identity.bind_name(), identity.bind_password()),
        )
        .await
        .map_err(|err| {
            if err.is_connection_failure() {
                err
            } else {
                Error::DirectoryUnreachable(format!("service bind failed: {err}"))
            }
        })?;
        Ok(connection)
    }

    /// Takes the bound connection out of the session for one request. Until it is checked back
    /// in the session reads as broken, so a request abandoned mid-flight forces a rebind.
    fn checkout(guard: &mut MutexGuard<'_, Connection>) -> Result<Box<dyn DirectoryConnection>> {
        match std::mem::replace(&mut **guard, Connection::Broken) {
            Connection::Bound(connection) => Ok(connection),
            other => {
                **guard = other;
                Err(Error::InternalError(
                    "directory session used before bind".to_string(),
                ))
            }
        }
    }

    /// Returns the connection unless the request failed at the transport level.
    fn checkin<T>(
        guard: &mut MutexGuard<'_, Connection>,
        connection: Box<dyn DirectoryConnection>,
        operation: &'static str,
        result: &Result<T>,
    ) {
        match result {
            Err(err) if err.is_connection_failure() => {
                warn!(operation, error = %err, "privileged directory connection lost");
            }
            _ => **guard = Connection::Bound(connection),
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        timeout(self.config.operation_timeout(), fut)
            .await
            .map_err(|_| Error::DirectoryUnreachable(format!("{operation} timed out")))?
    }
}
